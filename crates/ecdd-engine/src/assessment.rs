//! Assessment coordination
//!
//! Drives the report-generation back-end to produce a risk assessment and a
//! document checklist from the profile and submitted responses. Like the
//! questionnaire side, remote failures are absorbed into deterministic
//! profile-derived fallbacks; `assess` never fails.
//!
//! The report service keeps one conversation per session so that later
//! stakeholder queries carry the context of the original assessment.

use crate::backend::{ConversationId, GenerativeBackend};
use crate::error::EngineError;
use crate::extract;
use crate::runner::OperationRunner;
use dashmap::DashMap;
use ecdd_model::{
    Assessment, ComplianceFlags, DocumentChecklist, DocumentItem, Responses, RiskFactor,
    RiskRating, SessionId, SubjectProfile,
};
use serde_json::Value;
use std::sync::Arc;

/// Coordinates risk assessment and checklist generation.
pub struct AssessmentCoordinator {
    backend: Arc<dyn GenerativeBackend>,
    runner: OperationRunner,
    /// One report-service conversation per session, reused across queries
    conversations: DashMap<SessionId, ConversationId>,
}

impl AssessmentCoordinator {
    /// Coordinator over the given report-generation back-end
    #[must_use]
    pub fn new(backend: Arc<dyn GenerativeBackend>, runner: OperationRunner) -> Self {
        Self {
            backend,
            runner,
            conversations: DashMap::new(),
        }
    }

    /// The session's report conversation, opening one on first use
    async fn conversation_for(
        &self,
        session_id: SessionId,
    ) -> Result<ConversationId, EngineError> {
        if let Some(existing) = self.conversations.get(&session_id) {
            return Ok(existing.clone());
        }
        let opened = self.backend.open_conversation().await?;
        self.conversations.insert(session_id, opened.clone());
        Ok(opened)
    }

    /// Produce the assessment and checklist for a session.
    ///
    /// Screening facts already in the profile always win: flags are
    /// back-filled from the profile when the remote response raises none, and
    /// a profile PEP hit forces the PEP flag regardless of the response.
    pub async fn assess(
        &self,
        profile: &SubjectProfile,
        responses: &Responses,
        session_id: SessionId,
    ) -> (Assessment, DocumentChecklist) {
        let request = assessment_request(profile, responses);

        let output = match self.run_in_conversation(session_id, &request).await {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(
                    session = %session_id,
                    error = %err,
                    "report generation failed, using fallback assessment"
                );
                return (fallback_assessment(profile), minimal_checklist());
            }
        };

        let objects = extract::extract_objects(&output);
        let reports = extract::classify_reports(&objects);

        let mut assessment = match reports.assessment {
            Some(raw) => map_assessment(&raw, &output),
            None => {
                tracing::warn!(session = %session_id, "no assessment object in report output");
                let mut fallback = fallback_assessment(profile);
                fallback.narrative = output.clone();
                fallback
            }
        };
        backfill_flags(&mut assessment.compliance_flags, profile);

        let checklist = match reports.checklist {
            Some(raw) => map_checklist(&raw),
            None => {
                tracing::warn!(session = %session_id, "no checklist object in report output");
                minimal_checklist()
            }
        };

        (assessment, checklist)
    }

    /// Answer a free-text stakeholder question about an assessed session,
    /// reusing the session's report conversation.
    pub async fn answer_query(
        &self,
        session_id: SessionId,
        question: &str,
        profile: &SubjectProfile,
        assessment: &Assessment,
    ) -> String {
        let request = format!(
            "A stakeholder reviewing this case asks:\n{question}\n\n{}\n\nCurrent rating: {} (score {:.2})\nAnswer concisely based on the assessment already produced.",
            profile.agent_summary(),
            assessment.overall_rating,
            assessment.score,
        );

        match self.run_in_conversation(session_id, &request).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "stakeholder query failed");
                "Unable to answer this question right now; please consult the written assessment."
                    .to_string()
            }
        }
    }

    async fn run_in_conversation(
        &self,
        session_id: SessionId,
        request: &str,
    ) -> Result<String, EngineError> {
        let conversation = self.conversation_for(session_id).await?;
        self.runner
            .run(self.backend.as_ref(), request, Some(&conversation))
            .await
    }
}

fn assessment_request(profile: &SubjectProfile, responses: &Responses) -> String {
    let mut request = format!(
        "Produce a risk assessment and a document checklist for this due-diligence case.\n\n{}\n",
        profile.agent_summary()
    );
    request.push_str(&format!(
        "\nScreening: {} PEP hit(s), {} sanctions hit(s), {} adverse media item(s), {} related party(ies)\n",
        profile.pep_hits.iter().filter(|p| p.is_pep).count(),
        profile.sanction_hits.len(),
        profile.adverse_media.len(),
        profile.related_parties.len(),
    ));
    if responses.is_empty() {
        request.push_str("\nNo questionnaire responses were provided.\n");
    } else {
        request.push_str("\nQuestionnaire responses:\n");
        for (question_id, answer) in responses {
            request.push_str(&format!("- {question_id}: {answer}\n"));
        }
    }
    request
}

/// Map a raw assessment object into the model. Field-level tolerance: an
/// unreadable rating defaults to Medium, an unreadable score to 0.5, and the
/// narrative keeps the full raw output for document export.
fn map_assessment(raw: &Value, raw_text: &str) -> Assessment {
    let mut assessment = Assessment {
        subject_type: str_field(raw, &["subject_type", "client_type"]),
        subject_category: str_field(raw, &["subject_category", "client_category"]),
        overall_rating: raw
            .get("overall_rating")
            .or_else(|| raw.get("overall_risk_rating"))
            .cloned()
            .and_then(|v| serde_json::from_value::<RiskRating>(v).ok())
            .unwrap_or_default(),
        score: raw
            .get("score")
            .or_else(|| raw.get("risk_score"))
            .and_then(Value::as_f64)
            .unwrap_or(0.5),
        narrative: raw_text.to_string(),
        ..Assessment::default()
    };

    if let Some(flags) = raw.get("compliance_flags") {
        assessment.compliance_flags =
            serde_json::from_value(flags.clone()).unwrap_or_default();
    }
    if let Some(factors) = raw.get("factors").or_else(|| raw.get("risk_factors")) {
        assessment.factors = serde_json::from_value(factors.clone()).unwrap_or_default();
    }
    if let Some(recommendations) = raw.get("recommendations") {
        assessment.recommendations =
            serde_json::from_value(recommendations.clone()).unwrap_or_default();
    }
    if let Some(actions) = raw.get("required_actions") {
        assessment.required_actions =
            serde_json::from_value(actions.clone()).unwrap_or_default();
    }

    assessment
}

fn map_checklist(raw: &Value) -> DocumentChecklist {
    serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "checklist object did not map, using minimal checklist");
        minimal_checklist()
    })
}

fn str_field(raw: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Back-fill compliance flags from profile screening facts.
///
/// If the remote response raised no flags at all, derive the full set from
/// the profile. A profile PEP hit forces the PEP flag either way.
fn backfill_flags(flags: &mut ComplianceFlags, profile: &SubjectProfile) {
    if !flags.any_set() {
        flags.pep = profile.has_pep_hit();
        flags.sanctions = profile.has_sanction_hit();
        flags.adverse_media = profile.has_adverse_media();
        flags.watchlist_hit = !profile.watchlist_hits.is_empty();
    }
    if profile.has_pep_hit() {
        flags.pep = true;
    }
}

/// Profile-derived assessment used when the back-end cannot produce one.
/// Base rating Medium, raised to High on a PEP hit and Critical on any
/// sanctions hit.
#[must_use]
pub fn fallback_assessment(profile: &SubjectProfile) -> Assessment {
    let mut assessment = Assessment {
        overall_rating: RiskRating::Medium,
        score: 0.5,
        narrative: format!(
            "Automatically derived assessment for {} based on screening records; \
             report generation was unavailable.",
            profile.subject_name
        ),
        ..Assessment::default()
    };

    if profile.has_pep_hit() {
        assessment.overall_rating = RiskRating::High;
        assessment.score = 0.8;
        assessment.factors.push(RiskFactor::new(
            "PEP Status",
            RiskRating::High,
            0.8,
            "subject identified as a politically exposed person",
        ));
    }
    if profile.has_sanction_hit() {
        assessment.overall_rating = RiskRating::Critical;
        assessment.score = 0.95;
        assessment.factors.push(RiskFactor::new(
            "Sanctions Exposure",
            RiskRating::Critical,
            0.95,
            format!(
                "sanctions screening returned {} hit(s)",
                profile.sanction_hits.len()
            ),
        ));
    }
    if profile.has_adverse_media() {
        if assessment.overall_rating == RiskRating::Medium {
            assessment.overall_rating = RiskRating::High;
            assessment.score = 0.7;
        }
        assessment.factors.push(RiskFactor::new(
            "Adverse Media",
            RiskRating::High,
            0.7,
            format!(
                "adverse media screening returned {} item(s)",
                profile.adverse_media.len()
            ),
        ));
    }

    backfill_flags(&mut assessment.compliance_flags, profile);
    assessment
}

/// Minimal checklist covering the three baseline document asks.
#[must_use]
pub fn minimal_checklist() -> DocumentChecklist {
    DocumentChecklist {
        identity_documents: vec![DocumentItem::required(
            "Government-issued photo ID",
            "identity",
        )],
        source_of_wealth_documents: vec![DocumentItem::required(
            "Evidence of source of wealth",
            "sow",
        )],
        source_of_funds_documents: vec![DocumentItem::required(
            "Bank statements (3 months)",
            "sof",
        )],
        ..DocumentChecklist::default()
    }
}
