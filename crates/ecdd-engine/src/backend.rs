//! Generative back-end contract
//!
//! Two instances of this interface exist in a deployment: the
//! question-generation service and the report-generation service. Both are
//! long-running: `submit` returns an operation handle that is polled to a
//! terminal state by the [`OperationRunner`](crate::runner::OperationRunner).
//!
//! Conversation handles are opaque and reusable across calls within one
//! session's lifetime, so the report service keeps context between the
//! initial assessment and later stakeholder queries.

use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Remote operation state. Queued, Running, and RequiresAction are
/// non-terminal; polling continues through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Queued,
    Running,
    /// Remote side is waiting on an internal action; treated as still running
    RequiresAction,
    Succeeded,
    Failed,
}

impl OperationState {
    /// Whether polling stops at this state
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }
}

/// One poll observation of a remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub state: OperationState,
    /// Textual output, present on success
    pub output: Option<String>,
    /// Remote-reported failure reason, present on failure
    pub error_reason: Option<String>,
}

impl PollResult {
    /// Non-terminal observation
    #[inline]
    #[must_use]
    pub fn pending(state: OperationState) -> Self {
        Self {
            state,
            output: None,
            error_reason: None,
        }
    }

    /// Terminal success with output text
    #[inline]
    #[must_use]
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            state: OperationState::Succeeded,
            output: Some(output.into()),
            error_reason: None,
        }
    }

    /// Terminal failure with a remote-reported reason
    #[inline]
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: OperationState::Failed,
            output: None,
            error_reason: Some(reason.into()),
        }
    }
}

/// Opaque handle to a long-running remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque conversation handle, reusable across submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract for a generative back-end service.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Open a fresh conversation for context continuity across submissions
    async fn open_conversation(&self) -> Result<ConversationId, EngineError>;

    /// Submit a unit of work, optionally within an existing conversation
    async fn submit(
        &self,
        prompt: &str,
        conversation: Option<&ConversationId>,
    ) -> Result<OperationHandle, EngineError>;

    /// Observe the current state of an in-flight operation
    async fn poll(&self, handle: &OperationHandle) -> Result<PollResult, EngineError>;
}

/// In-process back-end that replays a fixed poll script; the test double for
/// everything above the transport.
///
/// Polls walk the script in order and clamp at the last entry, so a script
/// ending in a non-terminal state models an operation that never finishes.
pub struct ScriptedBackend {
    script: Vec<PollResult>,
    cursor: AtomicUsize,
    polls: AtomicUsize,
    submissions: AtomicUsize,
    conversations: AtomicUsize,
}

impl ScriptedBackend {
    /// Back-end replaying the given poll sequence
    #[must_use]
    pub fn new(script: Vec<PollResult>) -> Self {
        assert!(!script.is_empty(), "script must hold at least one entry");
        Self {
            script,
            cursor: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            conversations: AtomicUsize::new(0),
        }
    }

    /// Back-end that succeeds on the first poll with the given output
    #[must_use]
    pub fn succeeding(output: impl Into<String>) -> Self {
        Self::new(vec![PollResult::succeeded(output)])
    }

    /// Back-end whose every operation fails with the given reason
    #[must_use]
    pub fn always_failing(reason: impl Into<String>) -> Self {
        Self::new(vec![PollResult::failed(reason)])
    }

    /// Back-end whose operations never reach a terminal state
    #[must_use]
    pub fn never_finishing() -> Self {
        Self::new(vec![PollResult::pending(OperationState::Running)])
    }

    /// Number of polls observed so far
    #[inline]
    #[must_use]
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Number of submissions observed so far
    #[inline]
    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of conversations opened so far
    #[inline]
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.conversations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn open_conversation(&self) -> Result<ConversationId, EngineError> {
        let n = self.conversations.fetch_add(1, Ordering::SeqCst);
        Ok(ConversationId(format!("conv-{n}")))
    }

    async fn submit(
        &self,
        _prompt: &str,
        _conversation: Option<&ConversationId>,
    ) -> Result<OperationHandle, EngineError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(OperationHandle(format!("op-{n}")))
    }

    async fn poll(&self, _handle: &OperationHandle) -> Result<PollResult, EngineError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let idx = self.cursor.load(Ordering::SeqCst);
        let result = self.script[idx.min(self.script.len() - 1)].clone();
        if idx + 1 < self.script.len() {
            self.cursor.store(idx + 1, Ordering::SeqCst);
        }
        Ok(result)
    }
}
