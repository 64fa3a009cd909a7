//! ECDD Model - data types for Enhanced Client Due Diligence
//!
//! Pure data layer shared by the orchestration engine:
//! - Subject profiles with screening results (PEP, sanctions, adverse media)
//! - Dynamically generated questionnaires
//! - Assessments with compliance flags and risk factors
//! - Document checklists
//! - Session records and the session lifecycle state machine
//!
//! No I/O lives here; everything is serde-serializable so sessions can be
//! persisted as JSON documents and final outputs written as nested records.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod assessment;
pub mod checklist;
pub mod profile;
pub mod questionnaire;
pub mod session;

pub use assessment::{Assessment, ComplianceFlags, RiskFactor, RiskRating};
pub use checklist::{DocumentChecklist, DocumentItem, DocumentPriority};
pub use profile::{
    Account, AdverseMediaItem, IdentityRecord, PepHit, RelatedParty, SanctionHit, SubjectProfile,
};
pub use questionnaire::{Question, QuestionType, Questionnaire, Section, FOLLOWUP_PREFIX};
pub use session::{
    CaseOutput, Responses, ReviewDecision, Session, SessionId, SessionStatus, SessionSummary,
    TransitionError,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
