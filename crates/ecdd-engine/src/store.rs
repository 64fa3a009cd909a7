//! In-memory session store with write-through persistence
//!
//! Each session lives behind its own async mutex inside a concurrent map, so
//! operations on different sessions never contend and a multi-step pipeline
//! on one session holds its lock across every step. Reads hand out snapshot
//! clones; mutation goes through [`SessionStore::update`] or a held handle.
//!
//! Persistence is optional and write-behind: mutations mark a session dirty,
//! and [`SessionStore::checkpoint`] or [`SessionStore::flush`] push dirty
//! sessions through the repository. Persistence failures are logged and
//! absorbed; the in-memory state stays authoritative.

use crate::error::EngineError;
use crate::persist::SessionRepository;
use dashmap::DashMap;
use ecdd_model::{
    Assessment, Session, SessionId, SessionStatus, SessionSummary, SubjectProfile,
    TransitionError,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Concurrent session registry.
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
    repository: Option<Arc<dyn SessionRepository>>,
    dirty: DashMap<SessionId, ()>,
}

impl SessionStore {
    /// Store without durable persistence
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            repository: None,
            dirty: DashMap::new(),
        }
    }

    /// Store writing through the given repository
    #[must_use]
    pub fn with_repository(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            sessions: DashMap::new(),
            repository: Some(repository),
            dirty: DashMap::new(),
        }
    }

    /// Number of sessions held in memory
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no sessions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Register a new session and persist it immediately
    pub async fn insert(&self, session: Session) -> SessionId {
        let session_id = session.session_id;
        self.persist(&session).await;
        self.sessions
            .insert(session_id, Arc::new(Mutex::new(session)));
        tracing::info!(session = %session_id, "session registered");
        session_id
    }

    /// Snapshot of a session, loading through the repository on a miss
    pub async fn get(&self, session_id: SessionId) -> Option<Session> {
        let known = self.sessions.get(&session_id).map(|e| e.value().clone());
        if let Some(handle) = known {
            return Some(handle.lock().await.clone());
        }
        let loaded = self.load_through(session_id).await?;
        let snapshot = loaded.clone();
        self.sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(loaded)));
        Some(snapshot)
    }

    /// Lock handle for a session, for multi-step operations that must hold
    /// the session across awaits
    pub async fn session_handle(
        &self,
        session_id: SessionId,
    ) -> Result<Arc<Mutex<Session>>, EngineError> {
        if let Some(handle) = self.sessions.get(&session_id).map(|e| e.value().clone()) {
            return Ok(handle);
        }
        let loaded = self
            .load_through(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;
        Ok(self
            .sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(loaded)))
            .value()
            .clone())
    }

    /// Apply a mutation under the session's lock, returning the new snapshot
    pub async fn update<F>(&self, session_id: SessionId, f: F) -> Result<Session, EngineError>
    where
        F: FnOnce(&mut Session) -> Result<(), TransitionError>,
    {
        let handle = self.session_handle(session_id).await?;
        let mut session = handle.lock().await;
        f(&mut session)?;
        session.touch();
        self.dirty.insert(session_id, ());
        Ok(session.clone())
    }

    /// Transition a session's lifecycle state
    pub async fn transition(
        &self,
        session_id: SessionId,
        to: SessionStatus,
    ) -> Result<Session, EngineError> {
        self.update(session_id, |session| session.transition(to))
            .await
    }

    /// Most recently updated sessions, newest first
    pub async fn list(&self, limit: usize) -> Vec<SessionSummary> {
        let mut summaries = self.snapshot_summaries().await;
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        summaries
    }

    /// Sessions waiting on a stakeholder decision
    pub async fn pending_reviews(&self) -> Vec<SessionSummary> {
        let mut summaries = self.snapshot_summaries().await;
        summaries.retain(|s| {
            matches!(
                s.status,
                SessionStatus::ReportsGenerated | SessionStatus::PendingReview
            )
        });
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// All sessions for a subject, newest first
    pub async fn subject_history(
        &self,
        subject_id: &str,
        include_followups: bool,
    ) -> Vec<Session> {
        let mut sessions = Vec::new();
        for handle in self.handles() {
            let session = handle.lock().await.clone();
            if session.subject_id == subject_id && (include_followups || !session.is_followup) {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Latest assessed session for a subject, with its profile snapshot.
    /// Only sessions that completed report generation count.
    pub async fn latest_assessment_for(
        &self,
        subject_id: &str,
    ) -> Option<(Assessment, SubjectProfile)> {
        self.subject_history(subject_id, true)
            .await
            .into_iter()
            .find(|s| {
                s.assessment.is_some()
                    && matches!(
                        s.status,
                        SessionStatus::ReportsGenerated
                            | SessionStatus::PendingReview
                            | SessionStatus::Approved
                            | SessionStatus::Escalated
                    )
            })
            .and_then(|s| {
                let profile = s.profile_snapshot.clone();
                s.assessment.map(|a| (a, profile))
            })
    }

    /// The full follow-up chain containing `session_id`: the root ancestor
    /// plus every descendant, oldest first.
    pub async fn session_chain(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Session>, EngineError> {
        // Walk up to the root
        let mut root = self
            .get(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;
        while let Some(parent_id) = root.parent_session_id {
            match self.get(parent_id).await {
                Some(parent) => root = parent,
                None => break,
            }
        }

        // Collect the root's descendants by parent back-reference
        let mut snapshots = Vec::new();
        for handle in self.handles() {
            snapshots.push(handle.lock().await.clone());
        }
        let mut chain = vec![root.clone()];
        let mut frontier = vec![root.session_id];
        while let Some(current) = frontier.pop() {
            for session in &snapshots {
                if session.parent_session_id == Some(current) {
                    frontier.push(session.session_id);
                    chain.push(session.clone());
                }
            }
        }

        chain.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(chain)
    }

    /// Persist a session now and clear its dirty mark
    pub async fn checkpoint(&self, session_id: SessionId) -> Result<(), EngineError> {
        let handle = self.session_handle(session_id).await?;
        let snapshot = handle.lock().await.clone();
        self.persist(&snapshot).await;
        self.dirty.remove(&session_id);
        Ok(())
    }

    /// Persist every dirty session
    pub async fn flush(&self) {
        let dirty_ids: Vec<SessionId> = self.dirty.iter().map(|e| *e.key()).collect();
        for session_id in dirty_ids {
            if let Err(err) = self.checkpoint(session_id).await {
                tracing::warn!(session = %session_id, error = %err, "flush skipped session");
            }
        }
    }

    pub(crate) fn mark_dirty(&self, session_id: SessionId) {
        self.dirty.insert(session_id, ());
    }

    async fn persist(&self, session: &Session) {
        let Some(repository) = &self.repository else {
            return;
        };
        if let Err(err) = repository.save(session).await {
            tracing::warn!(session = %session.session_id, error = %err, "session persistence failed");
        }
    }

    async fn load_through(&self, session_id: SessionId) -> Option<Session> {
        let repository = self.repository.as_ref()?;
        match repository.load(session_id).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "session load failed");
                None
            }
        }
    }

    async fn snapshot_summaries(&self) -> Vec<SessionSummary> {
        let handles = self.handles();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.lock().await.summary());
        }
        summaries
    }

    /// Session handles without holding any map guard across an await
    fn handles(&self) -> Vec<Arc<Mutex<Session>>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
