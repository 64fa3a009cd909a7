//! Assessment comparison
//!
//! Pure diff of two assessments, used to show how a follow-up changed the
//! picture. Flag transitions are reported by name: false to true is a new
//! concern, true to false a resolved one. Flags in the overflow map are not
//! compared; only the fixed set participates.

use crate::error::EngineError;
use ecdd_model::{Assessment, RiskRating, Session};
use serde::Serialize;

/// Difference between a current and a previous assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentComparison {
    pub rating_changed: bool,
    pub previous_rating: RiskRating,
    pub current_rating: RiskRating,
    /// Current score minus previous score
    pub score_delta: f64,
    /// Flags newly raised in the current assessment
    pub new_concerns: Vec<String>,
    /// Flags cleared since the previous assessment
    pub resolved_concerns: Vec<String>,
}

/// Compare `current` against `previous`.
#[must_use]
pub fn compare(current: &Assessment, previous: &Assessment) -> AssessmentComparison {
    let mut new_concerns = Vec::new();
    let mut resolved_concerns = Vec::new();

    for ((name, now), (_, before)) in current
        .compliance_flags
        .entries()
        .into_iter()
        .zip(previous.compliance_flags.entries())
    {
        match (before, now) {
            (false, true) => new_concerns.push(name.to_string()),
            (true, false) => resolved_concerns.push(name.to_string()),
            _ => {}
        }
    }

    AssessmentComparison {
        rating_changed: current.overall_rating != previous.overall_rating,
        previous_rating: previous.overall_rating,
        current_rating: current.overall_rating,
        score_delta: current.score - previous.score,
        new_concerns,
        resolved_concerns,
    }
}

/// Compare two sessions' assessments, requiring both to be assessed.
pub fn compare_sessions(
    current: &Session,
    previous: &Session,
) -> Result<AssessmentComparison, EngineError> {
    let current_assessment = current
        .assessment
        .as_ref()
        .ok_or(EngineError::MissingAssessment(current.session_id))?;
    let previous_assessment = previous
        .assessment
        .as_ref()
        .ok_or(EngineError::MissingAssessment(previous.session_id))?;
    Ok(compare(current_assessment, previous_assessment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecdd_model::{ComplianceFlags, SubjectProfile};

    fn assessment(rating: RiskRating, score: f64, flags: ComplianceFlags) -> Assessment {
        Assessment {
            overall_rating: rating,
            score,
            compliance_flags: flags,
            ..Assessment::default()
        }
    }

    #[test]
    fn flag_transitions_by_name() {
        let previous = assessment(
            RiskRating::Medium,
            0.5,
            ComplianceFlags {
                adverse_media: true,
                ..ComplianceFlags::default()
            },
        );
        let current = assessment(
            RiskRating::High,
            0.8,
            ComplianceFlags {
                pep: true,
                ..ComplianceFlags::default()
            },
        );

        let diff = compare(&current, &previous);
        assert!(diff.rating_changed);
        assert_eq!(diff.previous_rating, RiskRating::Medium);
        assert_eq!(diff.current_rating, RiskRating::High);
        assert!((diff.score_delta - 0.3).abs() < 1e-9);
        assert_eq!(diff.new_concerns, vec!["pep"]);
        assert_eq!(diff.resolved_concerns, vec!["adverse_media"]);
    }

    #[test]
    fn swapping_sides_swaps_concern_direction() {
        let a = assessment(
            RiskRating::Medium,
            0.5,
            ComplianceFlags {
                sanctions: true,
                ..ComplianceFlags::default()
            },
        );
        let b = assessment(RiskRating::Medium, 0.5, ComplianceFlags::default());

        let forward = compare(&a, &b);
        let backward = compare(&b, &a);
        assert_eq!(forward.new_concerns, backward.resolved_concerns);
        assert_eq!(forward.resolved_concerns, backward.new_concerns);
    }

    #[test]
    fn identical_assessments_diff_empty() {
        let a = assessment(RiskRating::Low, 0.2, ComplianceFlags::default());
        let diff = compare(&a, &a.clone());

        assert!(!diff.rating_changed);
        assert_eq!(diff.score_delta, 0.0);
        assert!(diff.new_concerns.is_empty());
        assert!(diff.resolved_concerns.is_empty());
    }

    #[test]
    fn unassessed_session_is_an_error() {
        let assessed = {
            let mut s = ecdd_model::Session::new(SubjectProfile::new("C-1", "Ada"));
            s.assessment = Some(Assessment::default());
            s
        };
        let bare = ecdd_model::Session::new(SubjectProfile::new("C-1", "Ada"));

        let err = compare_sessions(&assessed, &bare).unwrap_err();
        assert!(matches!(err, EngineError::MissingAssessment(id) if id == bare.session_id));
    }
}
