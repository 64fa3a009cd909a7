//! ECDD orchestration engine
//!
//! Drives due-diligence sessions through their lifecycle: questionnaire
//! generation, response collection, risk assessment and checklist
//! production, stakeholder review, and follow-up branches. Generative
//! back-ends sit behind [`GenerativeBackend`]; remote failures degrade to
//! deterministic fallbacks rather than stalling a case.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod assessment;
pub mod backend;
pub mod compare;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod followup;
pub mod persist;
pub mod questionnaire;
pub mod runner;
pub mod store;

pub use assessment::AssessmentCoordinator;
pub use backend::{
    ConversationId, GenerativeBackend, OperationHandle, OperationState, PollResult,
    ScriptedBackend,
};
pub use compare::{compare, compare_sessions, AssessmentComparison};
pub use coordinator::{CaseCoordinator, CoordinatorConfig};
pub use error::EngineError;
pub use followup::FollowupEngine;
pub use persist::{JsonFileRepository, SessionRepository};
pub use questionnaire::QuestionnaireCoordinator;
pub use runner::{OperationRunner, RunnerConfig};
pub use store::SessionStore;

/// Engine crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
