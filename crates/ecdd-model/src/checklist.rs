//! Document checklists
//!
//! Five fixed categories, each an ordered list of document items. Produced
//! alongside the assessment and attached to the session.

use serde::{Deserialize, Serialize};

/// Document requirement priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentPriority {
    Required,
    Recommended,
    Optional,
}

impl Default for DocumentPriority {
    fn default() -> Self {
        DocumentPriority::Required
    }
}

/// Individual document in the checklist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentItem {
    pub name: String,
    #[serde(default)]
    pub priority: DocumentPriority,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub special_instructions: String,
}

impl DocumentItem {
    /// Create a required document
    #[inline]
    #[must_use]
    pub fn required(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: DocumentPriority::Required,
            category: category.into(),
            special_instructions: String::new(),
        }
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: DocumentPriority) -> Self {
        self.priority = priority;
        self
    }

    /// With special instructions
    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = instructions.into();
        self
    }
}

/// Structured document checklist with the five fixed categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentChecklist {
    #[serde(default)]
    pub identity_documents: Vec<DocumentItem>,
    #[serde(default)]
    pub source_of_wealth_documents: Vec<DocumentItem>,
    #[serde(default)]
    pub source_of_funds_documents: Vec<DocumentItem>,
    #[serde(default)]
    pub compliance_documents: Vec<DocumentItem>,
    #[serde(default)]
    pub additional_documents: Vec<DocumentItem>,
}

impl DocumentChecklist {
    /// All items across categories, in category order
    pub fn all_documents(&self) -> impl Iterator<Item = &DocumentItem> {
        self.identity_documents
            .iter()
            .chain(&self.source_of_wealth_documents)
            .chain(&self.source_of_funds_documents)
            .chain(&self.compliance_documents)
            .chain(&self.additional_documents)
    }

    /// All required documents across categories
    #[must_use]
    pub fn required_documents(&self) -> Vec<&DocumentItem> {
        self.all_documents()
            .filter(|d| d.priority == DocumentPriority::Required)
            .collect()
    }

    /// Whether every category is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all_documents().next().is_none()
    }
}
