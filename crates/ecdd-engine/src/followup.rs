//! Follow-up session orchestration
//!
//! A follow-up is a child session branched from an assessed parent when the
//! reviewer needs more information. The child starts with a targeted
//! questionnaire, and on submission its answers are merged over the parent's
//! before reassessment, so the new assessment sees the complete picture with
//! the child's answers winning any overlap.

use crate::assessment::AssessmentCoordinator;
use crate::error::EngineError;
use crate::questionnaire::QuestionnaireCoordinator;
use crate::store::SessionStore;
use ecdd_model::{
    Assessment, DocumentChecklist, Questionnaire, Responses, Session, SessionId, SessionStatus,
};
use std::sync::Arc;

/// Branches and resolves follow-up sessions.
pub struct FollowupEngine {
    store: Arc<SessionStore>,
    questionnaires: Arc<QuestionnaireCoordinator>,
    assessments: Arc<AssessmentCoordinator>,
}

impl FollowupEngine {
    /// Engine over the shared store and coordinators
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        questionnaires: Arc<QuestionnaireCoordinator>,
        assessments: Arc<AssessmentCoordinator>,
    ) -> Self {
        Self {
            store,
            questionnaires,
            assessments,
        }
    }

    /// Branch a follow-up child session off `parent_id` using reviewer
    /// feedback. The child is registered and starts at
    /// `QuestionnaireGenerated` with the follow-up questionnaire attached.
    pub async fn branch(
        &self,
        parent_id: SessionId,
        feedback: &str,
    ) -> Result<(SessionId, Questionnaire), EngineError> {
        let parent = self
            .store
            .get(parent_id)
            .await
            .ok_or(EngineError::SessionNotFound(parent_id))?;

        let questionnaire = self
            .questionnaires
            .generate_followup(&parent.profile_snapshot, feedback, &parent.responses)
            .await;

        let child = Session::new_followup(&parent, questionnaire.clone());
        let child_id = self.store.insert(child).await;
        tracing::info!(parent = %parent_id, child = %child_id, "follow-up session branched");

        Ok((child_id, questionnaire))
    }

    /// Submit follow-up answers: merge them over the parent's responses
    /// (child wins on overlap), reassess the combined set, and attach the new
    /// reports to the child session.
    pub async fn merge_and_assess(
        &self,
        child_id: SessionId,
        child_responses: Responses,
    ) -> Result<(Assessment, DocumentChecklist), EngineError> {
        let handle = self.store.session_handle(child_id).await?;
        let mut child = handle.lock().await;

        let parent_id = match (child.is_followup, child.parent_session_id) {
            (true, Some(parent_id)) => parent_id,
            _ => return Err(EngineError::NotAFollowup(child_id)),
        };
        // Distinct ids, so taking the parent snapshot here cannot deadlock
        let parent = self
            .store
            .get(parent_id)
            .await
            .ok_or(EngineError::SessionNotFound(parent_id))?;

        // Validate the edge before touching responses so a rejected
        // submission leaves the child unchanged
        child.transition(SessionStatus::ResponsesSubmitted)?;
        let mut combined = parent.responses.clone();
        combined.extend(child_responses);
        child.responses = combined.clone();
        self.store.mark_dirty(child_id);

        let (assessment, checklist) = self
            .assessments
            .assess(&child.profile_snapshot, &combined, child_id)
            .await;

        child.assessment = Some(assessment.clone());
        child.checklist = Some(checklist.clone());
        child.transition(SessionStatus::ReportsGenerated)?;
        self.store.mark_dirty(child_id);

        Ok((assessment, checklist))
    }
}
