//! Questionnaire coordination
//!
//! Drives the question-generation back-end and maps its free-form output into
//! the structured [`Questionnaire`] model. Remote failures never surface from
//! `generate`: a timeout, a terminal failure, or unparsable output is logged
//! and replaced with the deterministic fallback questionnaire, so the session
//! pipeline always moves forward.

use crate::backend::GenerativeBackend;
use crate::error::EngineError;
use crate::extract;
use crate::runner::OperationRunner;
use ecdd_model::{
    Question, QuestionType, Questionnaire, Responses, Section, SubjectProfile,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Coordinates questionnaire generation for a subject.
pub struct QuestionnaireCoordinator {
    backend: Arc<dyn GenerativeBackend>,
    runner: OperationRunner,
}

impl QuestionnaireCoordinator {
    /// Coordinator over the given question-generation back-end
    #[must_use]
    pub fn new(backend: Arc<dyn GenerativeBackend>, runner: OperationRunner) -> Self {
        Self { backend, runner }
    }

    /// Generate the initial questionnaire for a subject.
    ///
    /// Remote failures are absorbed: the result is the fallback questionnaire
    /// and a warning, never an error.
    pub async fn generate(&self, profile: &SubjectProfile) -> Questionnaire {
        match self.try_generate(profile, &initial_request(profile)).await {
            Ok(questionnaire) => questionnaire,
            Err(err) if err.is_absorbed() => {
                tracing::warn!(
                    subject = %profile.subject_id,
                    error = %err,
                    "questionnaire generation failed, using fallback"
                );
                fallback_questionnaire(profile)
            }
            Err(err) => {
                tracing::error!(subject = %profile.subject_id, error = %err, "questionnaire generation failed");
                fallback_questionnaire(profile)
            }
        }
    }

    /// Generate a follow-up questionnaire from reviewer feedback and the
    /// answers already on file. The result always carries the follow-up
    /// identifier prefix, fallback included.
    pub async fn generate_followup(
        &self,
        profile: &SubjectProfile,
        feedback: &str,
        prior_responses: &Responses,
    ) -> Questionnaire {
        let request = followup_request(profile, feedback, prior_responses);
        let mut questionnaire = match self.try_generate(profile, &request).await {
            Ok(questionnaire) => questionnaire,
            Err(err) => {
                tracing::warn!(
                    subject = %profile.subject_id,
                    error = %err,
                    "follow-up generation failed, using fallback"
                );
                fallback_questionnaire(profile)
            }
        };
        questionnaire.mark_followup();
        questionnaire
    }

    async fn try_generate(
        &self,
        profile: &SubjectProfile,
        request: &str,
    ) -> Result<Questionnaire, EngineError> {
        let output = self.runner.run(self.backend.as_ref(), request, None).await?;
        let objects = extract::extract_objects(&output);
        let raw = extract::find_questionnaire(&objects).ok_or_else(|| {
            EngineError::ParseFailure("no questionnaire object in response".to_string())
        })?;
        Ok(map_questionnaire(raw, profile))
    }
}

fn initial_request(profile: &SubjectProfile) -> String {
    let mut request = format!(
        "Generate a due-diligence questionnaire for the following subject.\n\n{}\n",
        profile.agent_summary()
    );
    let known = profile.known_facts();
    if !known.is_empty() {
        request.push_str("\nAlready on record (do not re-ask):\n");
        for fact in known {
            request.push_str("- ");
            request.push_str(&fact);
            request.push('\n');
        }
    }
    request
}

fn followup_request(profile: &SubjectProfile, feedback: &str, prior: &Responses) -> String {
    let mut request = format!(
        "Generate a targeted follow-up questionnaire addressing the reviewer's concerns.\n\n{}\n\nReviewer feedback:\n{feedback}\n",
        profile.agent_summary()
    );
    if !prior.is_empty() {
        request.push_str("\nAnswers already collected:\n");
        for (question_id, answer) in prior {
            request.push_str(&format!("- {question_id}: {answer}\n"));
        }
    }
    request
}

/// Map a raw questionnaire object into the model, tolerating the key aliases
/// remote services use interchangeably.
fn map_questionnaire(raw: &Value, profile: &SubjectProfile) -> Questionnaire {
    let mut questionnaire = Questionnaire::new(
        short_id(),
        profile.subject_id.clone(),
        profile.subject_name.clone(),
    );
    questionnaire.subject_type = str_field(raw, &["subject_type", "client_type"]);

    if let Some(sections) = raw.get("sections").and_then(Value::as_array) {
        for (index, raw_section) in sections.iter().enumerate() {
            questionnaire
                .sections
                .push(map_section(raw_section, index as u32 + 1));
        }
    }

    questionnaire
}

fn map_section(raw: &Value, default_order: u32) -> Section {
    let title = str_field(raw, &["title", "section_title"]);
    let order = raw
        .get("order")
        .and_then(Value::as_u64)
        .map_or(default_order, |n| n as u32);

    let mut section = Section::new(id_field(raw, &["section_id"]), title, order)
        .with_description(str_field(raw, &["description", "section_description"]));

    if let Some(questions) = raw.get("questions").and_then(Value::as_array) {
        section.questions = questions.iter().map(map_question).collect();
    }
    section
}

fn map_question(raw: &Value) -> Question {
    let text = str_field(raw, &["text", "question_text"]);
    let question_type = raw
        .get("question_type")
        .or_else(|| raw.get("field_type"))
        .cloned()
        .and_then(|v| serde_json::from_value::<QuestionType>(v).ok())
        .unwrap_or(QuestionType::Unknown);

    let mut question = Question::new(id_field(raw, &["question_id", "field_id"]), text, question_type);
    question.required = raw.get("required").and_then(Value::as_bool).unwrap_or(true);
    question.help_text = str_field(raw, &["help_text", "hint"]);
    question.category = str_field(raw, &["category"]);
    question.risk_relevant = raw
        .get("risk_relevant")
        .or_else(|| raw.get("aml_relevant"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if let Some(options) = raw.get("options").and_then(Value::as_array) {
        question.options = options
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    question
}

fn str_field(raw: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Remote-provided identifier, or a fresh one when absent or blank.
/// Keeping remote ids matters: prior responses are keyed by them, and
/// follow-up requests list those keys back to the service.
fn id_field(raw: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map_or_else(short_id, str::to_string)
}

/// Fresh 8-character identifier for generated artifacts
fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Deterministic three-section questionnaire used when the back-end cannot
/// produce one: identity verification, source of wealth, source of funds.
#[must_use]
pub fn fallback_questionnaire(profile: &SubjectProfile) -> Questionnaire {
    let mut questionnaire = Questionnaire::new(
        short_id(),
        profile.subject_id.clone(),
        profile.subject_name.clone(),
    );

    questionnaire.sections.push(
        Section::new(short_id(), "Identity Verification", 1)
            .with_description("Confirm the subject's identity records")
            .with_questions(vec![Question::new(
                "id_verified",
                "Has the subject's identity been verified against an original government-issued document?",
                QuestionType::YesNo,
            )
            .with_category("identity")
            .risk_relevant()]),
    );

    questionnaire.sections.push(
        Section::new(short_id(), "Source of Wealth", 2)
            .with_description("Establish how the subject accumulated their wealth")
            .with_questions(vec![
                Question::new(
                    "primary_sow",
                    "What is the subject's primary source of wealth?",
                    QuestionType::SingleSelect,
                )
                .with_options(vec![
                    "Employment".to_string(),
                    "Business Ownership".to_string(),
                    "Inheritance".to_string(),
                    "Investments".to_string(),
                    "Sale of Property".to_string(),
                    "Other".to_string(),
                ])
                .with_category("sow")
                .risk_relevant(),
                Question::new(
                    "sow_documentation",
                    "Describe the documentation available to evidence the source of wealth.",
                    QuestionType::TextArea,
                )
                .with_category("sow")
                .risk_relevant(),
            ]),
    );

    questionnaire.sections.push(
        Section::new(short_id(), "Source of Funds", 3)
            .with_description("Establish the origin of funds for the relationship")
            .with_questions(vec![Question::new(
                "expected_activity",
                "What is the expected annual transaction volume?",
                QuestionType::SingleSelect,
            )
            .with_options(vec![
                "Under 100k".to_string(),
                "100k - 500k".to_string(),
                "500k - 1M".to_string(),
                "Over 1M".to_string(),
            ])
            .with_category("sof")
            .risk_relevant()]),
    );

    questionnaire
}
