//! Subject profiles and screening records
//!
//! Upstream case systems disagree on field names and shapes, so every record
//! keeps its known fields optional and captures anything unrecognized in an
//! `extra` overflow map instead of dropping it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Core identity details for a subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub known_aliases: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub residence_country: Option<String>,
    #[serde(default)]
    pub id_type: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub risk_segment: Option<String>,
    /// Whether the subject is already a customer of the institution
    #[serde(default)]
    pub existing_customer: Option<bool>,
    /// Unrecognized upstream keys, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Politically Exposed Person screening result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PepHit {
    #[serde(default)]
    pub is_pep: bool,
    #[serde(default)]
    pub pep_type: Option<String>,
    #[serde(default)]
    pub position_title: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// direct, family, or associate
    #[serde(default)]
    pub relationship_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Sanctions screening result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SanctionHit {
    /// OFAC, UN, EU, etc.
    #[serde(default)]
    pub list_name: Option<String>,
    #[serde(default)]
    pub match_type: Option<String>,
    #[serde(default)]
    pub match_confidence: Option<f64>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Adverse media screening result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdverseMediaItem {
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// fraud, corruption, crime, etc.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A related party connected to the subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedParty {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub relationship_type: Option<String>,
    #[serde(default)]
    pub connected_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Account held by the subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub opened_date: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Complete subject profile, snapshotted into each session at creation.
///
/// The screening lists here are the ground truth for compliance facts the
/// institution already knows: the assessment coordinator back-fills flags
/// from them regardless of what a remote service reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub subject_id: String,
    pub subject_name: String,
    #[serde(default)]
    pub identity: IdentityRecord,
    #[serde(default)]
    pub pep_hits: Vec<PepHit>,
    #[serde(default)]
    pub sanction_hits: Vec<SanctionHit>,
    #[serde(default)]
    pub adverse_media: Vec<AdverseMediaItem>,
    #[serde(default)]
    pub watchlist_hits: Vec<Value>,
    #[serde(default)]
    pub related_parties: Vec<RelatedParty>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SubjectProfile {
    /// Create a minimal profile with just identity keys
    #[inline]
    #[must_use]
    pub fn new(subject_id: impl Into<String>, subject_name: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            subject_name: subject_name.into(),
            ..Self::default()
        }
    }

    /// Whether any screening record marks the subject as a PEP
    #[inline]
    #[must_use]
    pub fn has_pep_hit(&self) -> bool {
        self.pep_hits.iter().any(|p| p.is_pep)
    }

    /// Whether sanctions screening produced any hit
    #[inline]
    #[must_use]
    pub fn has_sanction_hit(&self) -> bool {
        !self.sanction_hits.is_empty()
    }

    /// Whether adverse media screening produced any item
    #[inline]
    #[must_use]
    pub fn has_adverse_media(&self) -> bool {
        !self.adverse_media.is_empty()
    }

    /// Compact text summary sent to the generative back-ends
    #[must_use]
    pub fn agent_summary(&self) -> String {
        let mut lines = vec![
            format!("Subject: {} (ID: {})", self.subject_name, self.subject_id),
            format!(
                "Nationality: {}",
                self.identity.nationality.as_deref().unwrap_or("Unknown")
            ),
            format!(
                "Residence: {}",
                self.identity
                    .residence_country
                    .as_deref()
                    .unwrap_or("Unknown")
            ),
            format!(
                "Risk Segment: {}",
                self.identity.risk_segment.as_deref().unwrap_or("Unknown")
            ),
            format!(
                "Existing Customer: {}",
                match self.identity.existing_customer {
                    Some(true) => "Yes",
                    Some(false) => "No",
                    None => "Unknown",
                }
            ),
        ];

        if let Some(pep) = self.pep_hits.first() {
            let mut line = format!("PEP Status: {}", if pep.is_pep { "Yes" } else { "No" });
            if let Some(kind) = &pep.pep_type {
                line.push_str(" - ");
                line.push_str(kind);
            }
            lines.push(line);
        }
        if !self.sanction_hits.is_empty() {
            lines.push(format!("Sanctions Hits: {}", self.sanction_hits.len()));
        }
        if !self.adverse_media.is_empty() {
            lines.push(format!("Adverse Media Items: {}", self.adverse_media.len()));
        }
        if !self.related_parties.is_empty() {
            lines.push(format!("Related Parties: {}", self.related_parties.len()));
        }

        lines.join("\n")
    }

    /// Facts already on record, so the question generator does not re-ask
    #[must_use]
    pub fn known_facts(&self) -> Vec<String> {
        let mut known = Vec::new();

        if let Some(name) = &self.identity.full_name {
            known.push(format!("Full Name: {name}"));
        }
        if let Some(nationality) = &self.identity.nationality {
            known.push(format!("Nationality: {nationality}"));
        }
        if let Some(residence) = &self.identity.residence_country {
            known.push(format!("Residence Country: {residence}"));
        }
        if let Some(dob) = &self.identity.dob {
            known.push(format!("Date of Birth: {dob}"));
        }
        if let (Some(id_type), Some(_)) = (&self.identity.id_type, &self.identity.id_number) {
            known.push(format!("ID Verified: {id_type}"));
        }
        if let Some(pep) = self.pep_hits.first() {
            known.push(format!(
                "PEP Status: {}",
                if pep.is_pep { "Yes" } else { "No" }
            ));
        }
        if !self.sanction_hits.is_empty() {
            known.push(format!(
                "Sanctions screening completed ({} results)",
                self.sanction_hits.len()
            ));
        }
        if !self.adverse_media.is_empty() {
            known.push(format!(
                "Adverse media screening completed ({} items)",
                self.adverse_media.len()
            ));
        }

        known
    }
}
