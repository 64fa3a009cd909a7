//! Long-running operation runner
//!
//! Submits a unit of work to a generative back-end and polls it to a terminal
//! state with bounded exponential backoff and an overall deadline. This is
//! the only point where an in-flight operation suspends; it mutates no shared
//! session state, so it is testable with a paused clock and a scripted
//! status sequence.
//!
//! A deadline hit yields [`EngineError::OperationTimeout`] and performs no
//! further polls. The runner never retries on its own: the caller decides,
//! and must treat a timeout as "unknown outcome" since the remote side may
//! still complete after we stop watching.

use crate::backend::{ConversationId, GenerativeBackend, OperationState};
use crate::error::EngineError;
use std::time::Duration;

/// Polling schedule for remote operations.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Delay before the second poll
    pub initial_interval: Duration,
    /// Multiplier applied to the interval after every poll
    pub backoff_factor: f64,
    /// Interval ceiling
    pub max_interval: Duration,
    /// Total wait budget across all polls
    pub deadline: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            backoff_factor: 1.5,
            max_interval: Duration::from_secs(5),
            deadline: Duration::from_secs(120),
        }
    }
}

impl RunnerConfig {
    /// With a different overall deadline
    #[inline]
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Polls remote operations to completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationRunner {
    config: RunnerConfig,
}

impl OperationRunner {
    /// Runner with the given schedule
    #[inline]
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Polling schedule in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Submit `prompt` and poll the resulting operation to completion.
    ///
    /// # Errors
    /// - `OperationFailed` with the remote-reported reason on terminal failure
    /// - `OperationTimeout` once the accumulated wait reaches the deadline
    pub async fn run(
        &self,
        backend: &dyn GenerativeBackend,
        prompt: &str,
        conversation: Option<&ConversationId>,
    ) -> Result<String, EngineError> {
        let handle = backend.submit(prompt, conversation).await?;
        tracing::debug!(operation = %handle, "submitted remote operation");

        let mut interval = self.config.initial_interval;
        let mut waited = Duration::ZERO;

        loop {
            let observed = backend.poll(&handle).await?;
            match observed.state {
                OperationState::Succeeded => {
                    tracing::debug!(operation = %handle, waited = ?waited, "operation succeeded");
                    return Ok(observed.output.unwrap_or_default());
                }
                OperationState::Failed => {
                    let reason = observed
                        .error_reason
                        .unwrap_or_else(|| "unspecified remote failure".to_string());
                    tracing::warn!(operation = %handle, %reason, "operation failed");
                    return Err(EngineError::OperationFailed(reason));
                }
                OperationState::Queued | OperationState::Running | OperationState::RequiresAction => {
                    if waited >= self.config.deadline {
                        tracing::warn!(operation = %handle, waited = ?waited, "operation timed out");
                        return Err(EngineError::OperationTimeout { waited });
                    }
                    tokio::time::sleep(interval).await;
                    waited += interval;
                    interval = next_interval(interval, self.config.backoff_factor)
                        .min(self.config.max_interval);
                }
            }
        }
    }
}

fn next_interval(current: Duration, factor: f64) -> Duration {
    current.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PollResult, ScriptedBackend};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn backoff_schedule_to_success() {
        let backend = ScriptedBackend::new(vec![
            PollResult::pending(OperationState::Running),
            PollResult::pending(OperationState::Running),
            PollResult::pending(OperationState::Running),
            PollResult::succeeded("final output"),
        ]);
        let runner = OperationRunner::default();

        let start = Instant::now();
        let output = runner.run(&backend, "prompt", None).await.unwrap();

        assert_eq!(output, "final output");
        assert_eq!(backend.poll_count(), 4);
        // Three backoff sleeps: 0.5s, 0.75s, 1.125s
        assert!(start.elapsed() >= Duration::from_millis(500 + 750 + 1125));
    }

    #[test]
    fn interval_caps_at_max() {
        let mut interval = Duration::from_millis(500);
        for _ in 0..10 {
            interval = next_interval(interval, 1.5).min(Duration::from_secs(5));
        }
        assert_eq!(interval, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_timeout_and_stops_polling() {
        let backend = ScriptedBackend::never_finishing();
        let runner = OperationRunner::default();

        let err = runner.run(&backend, "prompt", None).await.unwrap_err();
        match err {
            EngineError::OperationTimeout { waited } => {
                assert!(waited >= Duration::from_secs(120));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        // No polls happen once the deadline fires
        let polls = backend.poll_count();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.poll_count(), polls);
    }

    #[tokio::test]
    async fn remote_failure_carries_reason() {
        let backend = ScriptedBackend::always_failing("model unavailable");
        let runner = OperationRunner::default();

        let err = runner.run(&backend, "prompt", None).await.unwrap_err();
        match err {
            EngineError::OperationFailed(reason) => assert_eq!(reason, "model unavailable"),
            other => panic!("expected failure, got {other:?}"),
        }
        // Terminal failure on the first poll: no retry, one submission
        assert_eq!(backend.submission_count(), 1);
        assert_eq!(backend.poll_count(), 1);
    }

    #[tokio::test]
    async fn success_without_output_is_empty_string() {
        let backend = ScriptedBackend::new(vec![PollResult {
            state: OperationState::Succeeded,
            output: None,
            error_reason: None,
        }]);
        let runner = OperationRunner::default();

        let output = runner.run(&backend, "prompt", None).await.unwrap();
        assert!(output.is_empty());
    }
}
