//! Assessments, compliance flags, and risk factors
//!
//! An assessment is produced once per pipeline run by the assessment
//! coordinator; re-running replaces it. Compliance flags are a fixed set of
//! booleans that downstream consumers (comparator, warehouse sink) iterate by
//! name, with an overflow map for flags a remote service invents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Overall risk classification, ordered Low < Medium < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskRating {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for RiskRating {
    fn default() -> Self {
        RiskRating::Medium
    }
}

impl std::fmt::Display for RiskRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskRating::Low => "low",
            RiskRating::Medium => "medium",
            RiskRating::High => "high",
            RiskRating::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Fixed set of boolean screening outcomes.
///
/// The field set is closed for iteration purposes ([`ComplianceFlags::entries`])
/// but open for extension: unknown keys from a remote response are captured in
/// `extra` rather than silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFlags {
    #[serde(default)]
    pub pep: bool,
    #[serde(default)]
    pub sanctions: bool,
    #[serde(default)]
    pub adverse_media: bool,
    #[serde(default)]
    pub high_risk_jurisdiction: bool,
    #[serde(default)]
    pub watchlist_hit: bool,
    #[serde(default)]
    pub source_of_wealth_concerns: bool,
    #[serde(default)]
    pub source_of_funds_concerns: bool,
    #[serde(default)]
    pub complex_ownership: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ComplianceFlags {
    /// The fixed flag set as (name, value) pairs, in declaration order
    #[must_use]
    pub fn entries(&self) -> [(&'static str, bool); 8] {
        [
            ("pep", self.pep),
            ("sanctions", self.sanctions),
            ("adverse_media", self.adverse_media),
            ("high_risk_jurisdiction", self.high_risk_jurisdiction),
            ("watchlist_hit", self.watchlist_hit),
            ("source_of_wealth_concerns", self.source_of_wealth_concerns),
            ("source_of_funds_concerns", self.source_of_funds_concerns),
            ("complex_ownership", self.complex_ownership),
        ]
    }

    /// Whether any fixed flag is raised
    #[inline]
    #[must_use]
    pub fn any_set(&self) -> bool {
        self.entries().iter().any(|(_, v)| *v)
    }
}

/// Individual risk factor within an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    #[serde(default)]
    pub rating: RiskRating,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub justification: String,
}

impl RiskFactor {
    /// Create a risk factor
    #[inline]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        rating: RiskRating,
        score: f64,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rating,
            score,
            justification: justification.into(),
        }
    }
}

/// Structured assessment produced by the assessment coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// High Net Worth Individual, Corporate, Trust, ...
    #[serde(default)]
    pub subject_type: String,
    /// Individual, Corporate, Trust, ...
    #[serde(default)]
    pub subject_category: String,
    #[serde(default)]
    pub overall_rating: RiskRating,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub factors: Vec<RiskFactor>,
    #[serde(default)]
    pub compliance_flags: ComplianceFlags,
    /// Free-text report narrative, kept for document export
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub required_actions: Vec<String>,
    pub assessed_at: DateTime<Utc>,
}

impl Default for Assessment {
    fn default() -> Self {
        Self {
            subject_type: String::new(),
            subject_category: String::new(),
            overall_rating: RiskRating::default(),
            score: 0.0,
            factors: Vec::new(),
            compliance_flags: ComplianceFlags::default(),
            narrative: String::new(),
            recommendations: Vec::new(),
            required_actions: Vec::new(),
            assessed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_are_ordered() {
        assert!(RiskRating::Low < RiskRating::Medium);
        assert!(RiskRating::Medium < RiskRating::High);
        assert!(RiskRating::High < RiskRating::Critical);
        assert_eq!(RiskRating::High.max(RiskRating::Medium), RiskRating::High);
    }

    #[test]
    fn rating_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RiskRating::Critical).unwrap(),
            "\"critical\""
        );
    }

    #[test]
    fn entries_cover_fixed_set() {
        let flags = ComplianceFlags {
            pep: true,
            source_of_funds_concerns: true,
            ..ComplianceFlags::default()
        };

        let entries = flags.entries();
        assert_eq!(entries.len(), 8);
        assert!(entries.contains(&("pep", true)));
        assert!(entries.contains(&("sanctions", false)));
        assert!(entries.contains(&("source_of_funds_concerns", true)));
        assert!(flags.any_set());
        assert!(!ComplianceFlags::default().any_set());
    }

    #[test]
    fn unknown_flags_are_preserved() {
        let raw = r#"{"pep": true, "crypto_exposure": true}"#;
        let flags: ComplianceFlags = serde_json::from_str(raw).unwrap();

        assert!(flags.pep);
        assert_eq!(flags.extra.get("crypto_exposure"), Some(&Value::Bool(true)));
    }
}
