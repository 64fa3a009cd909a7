//! Session records and the lifecycle state machine
//!
//! A session is one due-diligence case instance. It exclusively owns its
//! questionnaire, assessment, and checklist (deep copies, no aliasing across
//! sessions); parent and follow-up sessions relate by back-reference only.
//!
//! Lifecycle transitions are validated here: an attempt to leave a terminal
//! state, or to skip a pipeline stage, is rejected with [`TransitionError`]
//! rather than warn-and-ignore.

use crate::assessment::{Assessment, ComplianceFlags};
use crate::checklist::DocumentChecklist;
use crate::profile::SubjectProfile;
use crate::questionnaire::Questionnaire;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Question-id to answer mapping. Insertion order is irrelevant; a sorted map
/// keeps serialized sessions diffable.
pub type Responses = BTreeMap<String, Value>;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    QuestionnaireGenerated,
    ResponsesSubmitted,
    ReportsGenerated,
    /// Optional hop; callers may go straight from `ReportsGenerated` to a
    /// terminal review state.
    PendingReview,
    Approved,
    Escalated,
    Rejected,
    Error,
}

/// Legal transitions out of a state.
pub fn allowed_transitions(from: SessionStatus) -> Vec<SessionStatus> {
    use SessionStatus::*;
    match from {
        Pending => vec![QuestionnaireGenerated, Error],
        QuestionnaireGenerated => vec![ResponsesSubmitted, Error],
        ResponsesSubmitted => vec![ReportsGenerated, Error],
        ReportsGenerated => vec![PendingReview, Approved, Escalated, Rejected, Error],
        PendingReview => vec![Approved, Escalated, Rejected, Error],
        Approved | Escalated | Rejected | Error => vec![],
    }
}

impl SessionStatus {
    /// Whether this state has no outgoing edges
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        allowed_transitions(*self).is_empty()
    }

    /// Whether the edge `self -> to` is legal
    #[inline]
    #[must_use]
    pub fn can_transition_to(&self, to: SessionStatus) -> bool {
        allowed_transitions(*self).contains(&to)
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// Stakeholder review outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    Escalated,
}

impl ReviewDecision {
    /// Terminal lifecycle state this decision maps to
    #[inline]
    #[must_use]
    pub fn terminal_status(&self) -> SessionStatus {
        match self {
            ReviewDecision::Approved => SessionStatus::Approved,
            ReviewDecision::Rejected => SessionStatus::Rejected,
            ReviewDecision::Escalated => SessionStatus::Escalated,
        }
    }
}

/// One due-diligence case moving through the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub subject_id: String,
    pub subject_name: String,
    pub status: SessionStatus,

    /// Immutable copy of the subject profile at session creation
    pub profile_snapshot: SubjectProfile,
    #[serde(default)]
    pub questionnaire: Option<Questionnaire>,
    #[serde(default)]
    pub responses: Responses,
    #[serde(default)]
    pub assessment: Option<Assessment>,
    #[serde(default)]
    pub checklist: Option<DocumentChecklist>,

    // Review
    #[serde(default)]
    pub decision: Option<ReviewDecision>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,

    // Follow-up linkage
    #[serde(default)]
    pub is_followup: bool,
    #[serde(default)]
    pub parent_session_id: Option<SessionId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new pending session snapshotting the given profile
    #[must_use]
    pub fn new(profile: SubjectProfile) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            subject_id: profile.subject_id.clone(),
            subject_name: profile.subject_name.clone(),
            status: SessionStatus::Pending,
            profile_snapshot: profile,
            questionnaire: None,
            responses: Responses::new(),
            assessment: None,
            checklist: None,
            decision: None,
            notes: None,
            reviewer: None,
            reviewed_at: None,
            is_followup: false,
            parent_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a follow-up child session linked to `parent`.
    ///
    /// The child takes a copy of the parent's profile snapshot, not a live
    /// reference, and starts at `QuestionnaireGenerated` with the follow-up
    /// questionnaire attached.
    #[must_use]
    pub fn new_followup(parent: &Session, questionnaire: Questionnaire) -> Self {
        let mut child = Session::new(parent.profile_snapshot.clone());
        child.status = SessionStatus::QuestionnaireGenerated;
        child.questionnaire = Some(questionnaire);
        child.is_followup = true;
        child.parent_session_id = Some(parent.session_id);
        child
    }

    /// Bump `updated_at`
    #[inline]
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Apply a lifecycle transition, rejecting illegal edges.
    pub fn transition(&mut self, to: SessionStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    /// Record the stakeholder review and move to the matching terminal state.
    pub fn record_review(
        &mut self,
        decision: ReviewDecision,
        notes: Option<String>,
        reviewer: Option<String>,
    ) -> Result<(), TransitionError> {
        self.transition(decision.terminal_status())?;
        self.decision = Some(decision);
        self.notes = notes;
        self.reviewer = reviewer;
        self.reviewed_at = Some(Utc::now());
        Ok(())
    }

    /// Listing summary for this session
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            subject_id: self.subject_id.clone(),
            subject_name: self.subject_name.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight session listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub subject_id: String,
    pub subject_name: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Final structured output of a completed case, ready for the audit sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutput {
    pub session_id: SessionId,
    pub subject_id: String,
    pub subject_name: String,
    pub compliance_flags: ComplianceFlags,
    pub assessment: Assessment,
    pub checklist: DocumentChecklist,
    pub responses: Responses,
    pub status: SessionStatus,
    #[serde(default)]
    pub decision: Option<ReviewDecision>,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaseOutput {
    /// Build the output record from a session, if its reports exist
    #[must_use]
    pub fn from_session(session: &Session) -> Option<Self> {
        let assessment = session.assessment.clone()?;
        let checklist = session.checklist.clone()?;
        Some(Self {
            session_id: session.session_id,
            subject_id: session.subject_id.clone(),
            subject_name: session.subject_name.clone(),
            compliance_flags: assessment.compliance_flags.clone(),
            assessment,
            checklist,
            responses: session.responses.clone(),
            status: session.status,
            decision: session.decision,
            reviewer: session.reviewer.clone(),
            reviewed_at: session.reviewed_at,
            created_at: session.created_at,
            updated_at: session.updated_at,
        })
    }

    /// Flatten into a field map for the warehouse sink: scalar columns plus
    /// nested structures serialized as JSON strings.
    pub fn to_record(&self) -> serde_json::Result<BTreeMap<String, Value>> {
        let mut record = BTreeMap::new();
        record.insert(
            "session_id".to_string(),
            Value::String(self.session_id.to_string()),
        );
        record.insert(
            "subject_id".to_string(),
            Value::String(self.subject_id.clone()),
        );
        record.insert(
            "subject_name".to_string(),
            Value::String(self.subject_name.clone()),
        );
        record.insert(
            "compliance_flags".to_string(),
            Value::String(serde_json::to_string(&self.compliance_flags)?),
        );
        record.insert(
            "assessment".to_string(),
            Value::String(serde_json::to_string(&self.assessment)?),
        );
        record.insert(
            "checklist".to_string(),
            Value::String(serde_json::to_string(&self.checklist)?),
        );
        record.insert(
            "responses".to_string(),
            Value::String(serde_json::to_string(&self.responses)?),
        );
        record.insert("status".to_string(), serde_json::to_value(self.status)?);
        record.insert("decision".to_string(), serde_json::to_value(self.decision)?);
        record.insert(
            "reviewer".to_string(),
            serde_json::to_value(&self.reviewer)?,
        );
        record.insert(
            "reviewed_at".to_string(),
            serde_json::to_value(self.reviewed_at)?,
        );
        record.insert(
            "created_at".to_string(),
            serde_json::to_value(self.created_at)?,
        );
        record.insert(
            "updated_at".to_string(),
            serde_json::to_value(self.updated_at)?,
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SubjectProfile::new("C-1", "Ada Example"))
    }

    #[test]
    fn pipeline_edges_are_legal() {
        let mut s = session();
        s.transition(SessionStatus::QuestionnaireGenerated).unwrap();
        s.transition(SessionStatus::ResponsesSubmitted).unwrap();
        s.transition(SessionStatus::ReportsGenerated).unwrap();
        s.transition(SessionStatus::PendingReview).unwrap();
        s.transition(SessionStatus::Approved).unwrap();
        assert!(s.status.is_terminal());
    }

    #[test]
    fn review_may_skip_pending_review() {
        let mut s = session();
        s.transition(SessionStatus::QuestionnaireGenerated).unwrap();
        s.transition(SessionStatus::ResponsesSubmitted).unwrap();
        s.transition(SessionStatus::ReportsGenerated).unwrap();
        s.transition(SessionStatus::Rejected).unwrap();
    }

    #[test]
    fn terminal_states_reject_reentry() {
        let mut s = session();
        s.transition(SessionStatus::QuestionnaireGenerated).unwrap();
        s.transition(SessionStatus::ResponsesSubmitted).unwrap();
        s.transition(SessionStatus::ReportsGenerated).unwrap();
        s.transition(SessionStatus::Approved).unwrap();

        let err = s
            .transition(SessionStatus::QuestionnaireGenerated)
            .unwrap_err();
        assert_eq!(err.from, SessionStatus::Approved);
        assert_eq!(err.to, SessionStatus::QuestionnaireGenerated);
        assert_eq!(s.status, SessionStatus::Approved);
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut s = session();
        assert!(s.transition(SessionStatus::ReportsGenerated).is_err());
        assert_eq!(s.status, SessionStatus::Pending);
    }

    #[test]
    fn error_is_reachable_from_any_non_terminal_state() {
        for from in [
            SessionStatus::Pending,
            SessionStatus::QuestionnaireGenerated,
            SessionStatus::ResponsesSubmitted,
            SessionStatus::ReportsGenerated,
            SessionStatus::PendingReview,
        ] {
            assert!(from.can_transition_to(SessionStatus::Error), "{from:?}");
        }
        assert!(!SessionStatus::Error.can_transition_to(SessionStatus::Pending));
    }

    #[test]
    fn transition_bumps_updated_at() {
        let mut s = session();
        let before = s.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        s.transition(SessionStatus::QuestionnaireGenerated).unwrap();
        assert!(s.updated_at > before);
    }

    #[test]
    fn record_review_sets_fields() {
        let mut s = session();
        s.transition(SessionStatus::QuestionnaireGenerated).unwrap();
        s.transition(SessionStatus::ResponsesSubmitted).unwrap();
        s.transition(SessionStatus::ReportsGenerated).unwrap();

        s.record_review(
            ReviewDecision::Escalated,
            Some("needs senior sign-off".to_string()),
            Some("rev-7".to_string()),
        )
        .unwrap();

        assert_eq!(s.status, SessionStatus::Escalated);
        assert_eq!(s.decision, Some(ReviewDecision::Escalated));
        assert!(s.reviewed_at.is_some());
    }

    #[test]
    fn followup_carries_parent_linkage() {
        let parent = session();
        let q = Questionnaire::new("q-1", "C-1", "Ada Example");
        let child = Session::new_followup(&parent, q);

        assert!(child.is_followup);
        assert_eq!(child.parent_session_id, Some(parent.session_id));
        assert_eq!(child.status, SessionStatus::QuestionnaireGenerated);
        assert_eq!(child.profile_snapshot, parent.profile_snapshot);
        assert_ne!(child.session_id, parent.session_id);
    }

    #[test]
    fn case_output_requires_reports() {
        let s = session();
        assert!(CaseOutput::from_session(&s).is_none());

        let mut done = session();
        done.assessment = Some(Assessment::default());
        done.checklist = Some(DocumentChecklist::default());
        let output = CaseOutput::from_session(&done).unwrap();

        let record = output.to_record().unwrap();
        assert_eq!(
            record["session_id"],
            Value::String(done.session_id.to_string())
        );
        // Nested structures are stored as serialized JSON strings
        assert!(record["compliance_flags"].is_string());
        assert!(record["assessment"].is_string());
    }
}
