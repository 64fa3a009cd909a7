//! Dynamically generated questionnaires
//!
//! A questionnaire is an ordered list of sections, each an ordered list of
//! questions. Generated once per session by the questionnaire coordinator and
//! immutable afterwards, except for the identifier prefix applied when a
//! questionnaire is reused as a follow-up artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier prefix marking follow-up questionnaires.
pub const FOLLOWUP_PREFIX: &str = "followup-";

/// Input type for a question, validated at the boundary.
///
/// Remote services hand these back as string tags; anything outside the
/// closed set lands on [`QuestionType::Unknown`] rather than silently
/// defaulting to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    #[serde(rename = "textarea")]
    TextArea,
    /// Single choice from a fixed option list (remote tag: `dropdown`)
    #[serde(rename = "dropdown")]
    SingleSelect,
    /// Multiple choices from a fixed option list (remote tag: `multiple_choice`)
    #[serde(rename = "multiple_choice")]
    MultiSelect,
    Checkbox,
    Date,
    Number,
    Currency,
    YesNo,
    /// Unrecognized remote tag
    #[serde(other)]
    Unknown,
}

impl Default for QuestionType {
    fn default() -> Self {
        QuestionType::Text
    }
}

impl QuestionType {
    /// Whether answers come from a fixed option list
    #[inline]
    #[must_use]
    pub fn uses_options(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleSelect | QuestionType::MultiSelect | QuestionType::Checkbox
        )
    }
}

/// A single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub help_text: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// identity, sow, sof, business, financial, compliance
    #[serde(default)]
    pub category: String,
    /// Whether the answer feeds AML risk analysis
    #[serde(default)]
    pub risk_relevant: bool,
}

fn default_true() -> bool {
    true
}

impl Question {
    /// Create a required question with no options
    #[inline]
    #[must_use]
    pub fn new(
        question_id: impl Into<String>,
        text: impl Into<String>,
        question_type: QuestionType,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            text: text.into(),
            question_type,
            required: true,
            help_text: String::new(),
            options: Vec::new(),
            category: String::new(),
            risk_relevant: false,
        }
    }

    /// With option list
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// With category tag
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Mark as AML-relevant
    #[inline]
    #[must_use]
    pub fn risk_relevant(mut self) -> Self {
        self.risk_relevant = true;
        self
    }
}

/// An ordered section of related questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Section {
    /// Create an empty section
    #[inline]
    #[must_use]
    pub fn new(section_id: impl Into<String>, title: impl Into<String>, order: u32) -> Self {
        Self {
            section_id: section_id.into(),
            title: title.into(),
            description: String::new(),
            order,
            questions: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With questions
    #[inline]
    #[must_use]
    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = questions;
        self
    }
}

/// Complete generated questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub questionnaire_id: String,
    pub subject_id: String,
    pub subject_name: String,
    /// Inferred archetype (Business Owner, Employee, ...)
    #[serde(default)]
    pub subject_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Questionnaire {
    /// Create an empty questionnaire for a subject
    #[must_use]
    pub fn new(
        questionnaire_id: impl Into<String>,
        subject_id: impl Into<String>,
        subject_name: impl Into<String>,
    ) -> Self {
        Self {
            questionnaire_id: questionnaire_id.into(),
            subject_id: subject_id.into(),
            subject_name: subject_name.into(),
            subject_type: String::new(),
            created_at: Utc::now(),
            sections: Vec::new(),
        }
    }

    /// Total question count across sections
    #[inline]
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// Whether the identifier carries the follow-up prefix
    #[inline]
    #[must_use]
    pub fn is_followup(&self) -> bool {
        self.questionnaire_id.starts_with(FOLLOWUP_PREFIX)
    }

    /// Re-prefix the identifier to mark this as a follow-up artifact.
    /// Idempotent: an already-prefixed identifier is left alone.
    pub fn mark_followup(&mut self) {
        if !self.is_followup() {
            self.questionnaire_id = format!("{FOLLOWUP_PREFIX}{}", self.questionnaire_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_tags_roundtrip() {
        let parsed: QuestionType = serde_json::from_str("\"dropdown\"").unwrap();
        assert_eq!(parsed, QuestionType::SingleSelect);

        let parsed: QuestionType = serde_json::from_str("\"multiple_choice\"").unwrap();
        assert_eq!(parsed, QuestionType::MultiSelect);

        let parsed: QuestionType = serde_json::from_str("\"yes_no\"").unwrap();
        assert_eq!(parsed, QuestionType::YesNo);
    }

    #[test]
    fn unrecognized_tag_is_unknown_not_text() {
        let parsed: QuestionType = serde_json::from_str("\"slider\"").unwrap();
        assert_eq!(parsed, QuestionType::Unknown);
    }

    #[test]
    fn total_questions_spans_sections() {
        let mut q = Questionnaire::new("q-1", "C-1", "Ada");
        q.sections.push(
            Section::new("s1", "Identity", 1)
                .with_questions(vec![Question::new("f1", "Name?", QuestionType::Text)]),
        );
        q.sections.push(Section::new("s2", "Wealth", 2).with_questions(vec![
            Question::new("f2", "Source?", QuestionType::SingleSelect),
            Question::new("f3", "Evidence?", QuestionType::TextArea),
        ]));

        assert_eq!(q.total_questions(), 3);
    }

    #[test]
    fn followup_prefix_is_idempotent() {
        let mut q = Questionnaire::new("q-9", "C-1", "Ada");
        assert!(!q.is_followup());

        q.mark_followup();
        assert_eq!(q.questionnaire_id, "followup-q-9");

        q.mark_followup();
        assert_eq!(q.questionnaire_id, "followup-q-9");
    }
}
