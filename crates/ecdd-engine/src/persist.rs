//! Session persistence
//!
//! The store keeps sessions in memory and writes them through a repository at
//! checkpoints. The JSON-file implementation here stores one pretty-printed
//! document per session under a root directory; sessions are small, so whole-
//! file rewrites are fine.

use crate::error::EngineError;
use async_trait::async_trait;
use ecdd_model::{Session, SessionId, SessionSummary};
use std::path::{Path, PathBuf};

/// Durable storage for sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a session, replacing any prior version
    async fn save(&self, session: &Session) -> Result<(), EngineError>;

    /// Load a session by id. Absent is `Ok(None)`; corrupt is an error.
    async fn load(&self, session_id: SessionId) -> Result<Option<Session>, EngineError>;

    /// Summaries of stored sessions, most recently written first
    async fn list(&self, limit: usize) -> Result<Vec<SessionSummary>, EngineError>;
}

/// One JSON document per session under a root directory.
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    /// Repository rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl SessionRepository for JsonFileRepository {
    async fn save(&self, session: &Session) -> Result<(), EngineError> {
        let path = self.path_for(session.session_id);
        let encoded = serde_json::to_vec_pretty(session)?;
        std::fs::write(&path, encoded)?;
        tracing::debug!(session = %session.session_id, path = %path.display(), "session saved");
        Ok(())
    }

    async fn load(&self, session_id: SessionId) -> Result<Option<Session>, EngineError> {
        let path = self.path_for(session_id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn list(&self, limit: usize) -> Result<Vec<SessionSummary>, EngineError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match read_summary(&path) {
                Ok(summary) => entries.push(summary),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable session file");
                }
            }
        }
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

fn read_summary(path: &Path) -> Result<SessionSummary, EngineError> {
    let raw = std::fs::read(path)?;
    let session: Session = serde_json::from_slice(&raw)?;
    Ok(session.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecdd_model::{SessionStatus, SubjectProfile};

    fn session(name: &str) -> Session {
        Session::new(SubjectProfile::new("C-1", name))
    }

    #[tokio::test]
    async fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path()).unwrap();

        let mut s = session("Ada Example");
        s.transition(SessionStatus::QuestionnaireGenerated).unwrap();
        repo.save(&s).await.unwrap();

        let loaded = repo.load(s.session_id).await.unwrap().unwrap();
        assert_eq!(loaded, s);
    }

    #[tokio::test]
    async fn absent_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path()).unwrap();

        assert!(repo.load(SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path()).unwrap();

        let id = SessionId::new();
        std::fs::write(dir.path().join(format!("{id}.json")), b"not json").unwrap();

        let err = repo.load(id).await.unwrap_err();
        assert!(matches!(err, EngineError::Encoding(_)));
    }

    #[tokio::test]
    async fn list_orders_by_recency_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path()).unwrap();

        let older = session("Older Case");
        repo.save(&older).await.unwrap();

        let mut newer = session("Newer Case");
        newer.updated_at = older.updated_at + chrono::Duration::seconds(10);
        repo.save(&newer).await.unwrap();

        let all = repo.list(10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].subject_name, "Newer Case");

        let one = repo.list(1).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].subject_name, "Newer Case");
    }

    #[tokio::test]
    async fn list_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path()).unwrap();

        repo.save(&session("Good Case")).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{oops").unwrap();

        let all = repo.list(10).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
