//! Case coordinator
//!
//! The single entry point tying the pipeline together: session creation,
//! response submission, review, follow-ups, queries, and output export. All
//! multi-step work on one session happens under that session's lock, so a
//! concurrent caller sees either the state before the pipeline step or after
//! it, never the middle.
//!
//! Back-end concurrency is bounded by a semaphore shared across both
//! coordinators; sessions beyond the limit queue rather than fail.

use crate::assessment::AssessmentCoordinator;
use crate::backend::GenerativeBackend;
use crate::compare::{self, AssessmentComparison};
use crate::error::EngineError;
use crate::followup::FollowupEngine;
use crate::persist::SessionRepository;
use crate::questionnaire::QuestionnaireCoordinator;
use crate::runner::{OperationRunner, RunnerConfig};
use crate::store::SessionStore;
use ecdd_model::{
    Assessment, CaseOutput, DocumentChecklist, Questionnaire, Responses, ReviewDecision,
    Session, SessionId, SessionStatus, SessionSummary, SubjectProfile,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Coordinator tunables.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Concurrent back-end pipelines allowed
    pub max_concurrent_backend_calls: usize,
    pub runner: RunnerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_backend_calls: 4,
            runner: RunnerConfig::default(),
        }
    }
}

/// Top-level orchestrator for due-diligence cases.
pub struct CaseCoordinator {
    questionnaires: Arc<QuestionnaireCoordinator>,
    assessments: Arc<AssessmentCoordinator>,
    store: Arc<SessionStore>,
    followups: FollowupEngine,
    backend_permits: Arc<Semaphore>,
}

impl CaseCoordinator {
    /// Coordinator without durable persistence
    #[must_use]
    pub fn new(
        question_backend: Arc<dyn GenerativeBackend>,
        report_backend: Arc<dyn GenerativeBackend>,
        config: CoordinatorConfig,
    ) -> Self {
        Self::build(question_backend, report_backend, config, None)
    }

    /// Coordinator writing sessions through the given repository
    #[must_use]
    pub fn with_repository(
        question_backend: Arc<dyn GenerativeBackend>,
        report_backend: Arc<dyn GenerativeBackend>,
        config: CoordinatorConfig,
        repository: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::build(question_backend, report_backend, config, Some(repository))
    }

    fn build(
        question_backend: Arc<dyn GenerativeBackend>,
        report_backend: Arc<dyn GenerativeBackend>,
        config: CoordinatorConfig,
        repository: Option<Arc<dyn SessionRepository>>,
    ) -> Self {
        let runner = OperationRunner::new(config.runner);
        let questionnaires = Arc::new(QuestionnaireCoordinator::new(question_backend, runner));
        let assessments = Arc::new(AssessmentCoordinator::new(report_backend, runner));
        let store = Arc::new(match repository {
            Some(repository) => SessionStore::with_repository(repository),
            None => SessionStore::new(),
        });
        let followups = FollowupEngine::new(
            store.clone(),
            questionnaires.clone(),
            assessments.clone(),
        );
        Self {
            questionnaires,
            assessments,
            store,
            followups,
            backend_permits: Arc::new(Semaphore::new(config.max_concurrent_backend_calls)),
        }
    }

    /// Open a new case: generate the questionnaire and register the session
    /// at `QuestionnaireGenerated`.
    pub async fn create_session(
        &self,
        profile: SubjectProfile,
    ) -> Result<(SessionId, Questionnaire), EngineError> {
        let _permit = self.acquire_permit().await?;

        let questionnaire = self.questionnaires.generate(&profile).await;
        let mut session = Session::new(profile);
        session.questionnaire = Some(questionnaire.clone());
        session.transition(SessionStatus::QuestionnaireGenerated)?;

        // insert persists immediately, no separate checkpoint needed
        let session_id = self.store.insert(session).await;
        tracing::info!(session = %session_id, questions = questionnaire.total_questions(), "case opened");
        Ok((session_id, questionnaire))
    }

    /// Submit questionnaire responses and run the assessment pipeline. The
    /// session lock is held across the whole step.
    pub async fn submit_responses(
        &self,
        session_id: SessionId,
        responses: Responses,
    ) -> Result<(Assessment, DocumentChecklist), EngineError> {
        let _permit = self.acquire_permit().await?;
        let handle = self.store.session_handle(session_id).await?;
        let mut session = handle.lock().await;

        // Validate the edge before touching responses so a rejected
        // submission leaves the session unchanged
        session.transition(SessionStatus::ResponsesSubmitted)?;
        session.responses = responses;
        self.store.mark_dirty(session_id);

        let (assessment, checklist) = self
            .assessments
            .assess(&session.profile_snapshot, &session.responses, session_id)
            .await;

        session.assessment = Some(assessment.clone());
        session.checklist = Some(checklist.clone());
        session.transition(SessionStatus::ReportsGenerated)?;
        self.store.mark_dirty(session_id);
        drop(session);

        self.store.checkpoint(session_id).await?;
        Ok((assessment, checklist))
    }

    /// Move an assessed session to the explicit review queue
    pub async fn open_review(&self, session_id: SessionId) -> Result<Session, EngineError> {
        let session = self
            .store
            .transition(session_id, SessionStatus::PendingReview)
            .await?;
        self.store.checkpoint(session_id).await?;
        Ok(session)
    }

    /// Record the stakeholder decision and close the session
    pub async fn complete_review(
        &self,
        session_id: SessionId,
        decision: ReviewDecision,
        notes: Option<String>,
        reviewer: Option<String>,
    ) -> Result<Session, EngineError> {
        let session = self
            .store
            .update(session_id, |session| {
                session.record_review(decision, notes, reviewer)
            })
            .await?;
        self.store.checkpoint(session_id).await?;
        tracing::info!(session = %session_id, ?decision, "review recorded");
        Ok(session)
    }

    /// Answer a stakeholder question about an assessed session
    pub async fn answer_query(
        &self,
        session_id: SessionId,
        question: &str,
    ) -> Result<String, EngineError> {
        let _permit = self.acquire_permit().await?;
        let session = self
            .store
            .get(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let assessment = session
            .assessment
            .as_ref()
            .ok_or(EngineError::MissingAssessment(session_id))?;

        Ok(self
            .assessments
            .answer_query(session_id, question, &session.profile_snapshot, assessment)
            .await)
    }

    /// Branch a follow-up session off an assessed parent
    pub async fn request_followup(
        &self,
        parent_id: SessionId,
        feedback: &str,
    ) -> Result<(SessionId, Questionnaire), EngineError> {
        let _permit = self.acquire_permit().await?;
        self.followups.branch(parent_id, feedback).await
    }

    /// Submit follow-up answers: merge over the parent's and reassess
    pub async fn submit_followup_responses(
        &self,
        child_id: SessionId,
        responses: Responses,
    ) -> Result<(Assessment, DocumentChecklist), EngineError> {
        let _permit = self.acquire_permit().await?;
        let result = self.followups.merge_and_assess(child_id, responses).await?;
        self.store.checkpoint(child_id).await?;
        Ok(result)
    }

    /// Diff a follow-up's assessment against its parent's
    pub async fn compare_with_parent(
        &self,
        child_id: SessionId,
    ) -> Result<AssessmentComparison, EngineError> {
        let child = self
            .store
            .get(child_id)
            .await
            .ok_or(EngineError::SessionNotFound(child_id))?;
        let parent_id = child
            .parent_session_id
            .ok_or(EngineError::NotAFollowup(child_id))?;
        let parent = self
            .store
            .get(parent_id)
            .await
            .ok_or(EngineError::SessionNotFound(parent_id))?;
        compare::compare_sessions(&child, &parent)
    }

    /// Structured output record for a completed case
    pub async fn case_output(&self, session_id: SessionId) -> Result<CaseOutput, EngineError> {
        let session = self
            .store
            .get(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;
        CaseOutput::from_session(&session).ok_or(EngineError::MissingAssessment(session_id))
    }

    /// Snapshot of a session
    pub async fn session(&self, session_id: SessionId) -> Option<Session> {
        self.store.get(session_id).await
    }

    /// Most recently updated sessions
    pub async fn list_sessions(&self, limit: usize) -> Vec<SessionSummary> {
        self.store.list(limit).await
    }

    /// Sessions waiting on a stakeholder decision
    pub async fn pending_reviews(&self) -> Vec<SessionSummary> {
        self.store.pending_reviews().await
    }

    /// All sessions for a subject, newest first
    pub async fn subject_history(
        &self,
        subject_id: &str,
        include_followups: bool,
    ) -> Vec<Session> {
        self.store.subject_history(subject_id, include_followups).await
    }

    /// Latest assessed session for a subject, with its profile snapshot
    pub async fn latest_assessment_for(
        &self,
        subject_id: &str,
    ) -> Option<(Assessment, SubjectProfile)> {
        self.store.latest_assessment_for(subject_id).await
    }

    /// The follow-up chain containing a session, oldest first
    pub async fn session_chain(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Session>, EngineError> {
        self.store.session_chain(session_id).await
    }

    /// Persist every dirty session
    pub async fn flush(&self) {
        self.store.flush().await;
    }

    async fn acquire_permit(&self) -> Result<tokio::sync::OwnedSemaphorePermit, EngineError> {
        self.backend_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::OperationFailed("concurrency limiter closed".to_string()))
    }
}
