//! Confidence and validation gate.
//!
//! Pure decision logic over an extraction result. `can_confirm` is the
//! single authority consulted before the pipeline proceeds; no screen or
//! caller may bypass it.

use shared_types::{
    ConfidenceBand, Corrections, ExtractionResult, PipelineError, Severity,
    CONFIDENCE_GREEN_FROM, CONFIDENCE_RED_BELOW,
};

/// Whether a human must review this extraction before the pipeline may
/// continue. `user_confirmed == true` overrides unconditionally, even when
/// `requires_user_confirmation` is still set in stored data.
pub fn requires_review(extraction: &ExtractionResult) -> bool {
    if extraction.quality.user_confirmed {
        return false;
    }
    if extraction.quality.requires_user_confirmation {
        return true;
    }
    extraction
        .missing_fields
        .iter()
        .any(|m| m.severity == Severity::Required)
}

/// Count of open issues: assumptions not yet confirmed plus required
/// missing fields not resolved by a correction on the same structural path.
pub fn remaining_issues(extraction: &ExtractionResult, corrections: &Corrections) -> usize {
    let unconfirmed_assumptions = extraction
        .assumptions
        .iter()
        .filter(|a| !corrections.confirms(&a.field))
        .count();

    let unresolved_required = extraction
        .missing_fields
        .iter()
        .filter(|m| m.severity == Severity::Required && !corrections.resolves(&m.field))
        .count();

    unconfirmed_assumptions + unresolved_required
}

/// Fail-closed check before confirmation or any downstream hand-off.
///
/// Rejects when `overall_confidence` is absent (never defaulted) or when
/// required missing fields remain unresolved, naming the specific fields.
pub fn can_confirm(
    extraction: &ExtractionResult,
    corrections: &Corrections,
) -> Result<(), PipelineError> {
    if extraction.quality.overall_confidence.is_none() {
        return Err(PipelineError::MissingConfidence);
    }

    let unresolved: Vec<String> = extraction
        .missing_fields
        .iter()
        .filter(|m| m.severity == Severity::Required && !corrections.resolves(&m.field))
        .map(|m| m.field.clone())
        .collect();

    if !unresolved.is_empty() {
        return Err(PipelineError::Inconsistent { fields: unresolved });
    }

    Ok(())
}

/// Fixed display/decision bands used uniformly by the gate and any UI
pub fn confidence_band(confidence: f64) -> ConfidenceBand {
    if confidence < CONFIDENCE_RED_BELOW {
        ConfidenceBand::Red
    } else if confidence < CONFIDENCE_GREEN_FROM {
        ConfidenceBand::Amber
    } else {
        ConfidenceBand::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Assumption, MissingField, Quality};

    fn extraction_with(quality: Quality) -> ExtractionResult {
        ExtractionResult {
            job: shared_types::JobDetails {
                title: Some("Fence".to_string()),
                ..Default::default()
            },
            quality,
            ..Default::default()
        }
    }

    fn required_missing(field: &str) -> MissingField {
        MissingField {
            field: field.to_string(),
            reason: Some("not mentioned".to_string()),
            severity: Severity::Required,
        }
    }

    #[test]
    fn test_requires_review_when_confirmation_requested() {
        let e = extraction_with(Quality {
            overall_confidence: Some(0.55),
            requires_user_confirmation: true,
            ..Default::default()
        });
        assert!(requires_review(&e));
    }

    #[test]
    fn test_requires_review_on_required_missing_field() {
        let mut e = extraction_with(Quality {
            overall_confidence: Some(0.9),
            ..Default::default()
        });
        e.missing_fields.push(required_missing("time.labour_entries[0].hours"));
        assert!(requires_review(&e));
    }

    #[test]
    fn test_user_confirmed_overrides_unconditionally() {
        let mut e = extraction_with(Quality {
            overall_confidence: Some(0.2),
            requires_user_confirmation: true,
            user_confirmed: true,
            ..Default::default()
        });
        e.missing_fields.push(required_missing("fees.travel.hours"));
        assert!(!requires_review(&e));
    }

    #[test]
    fn test_warning_severity_does_not_gate() {
        let mut e = extraction_with(Quality {
            overall_confidence: Some(0.9),
            ..Default::default()
        });
        e.missing_fields.push(MissingField {
            field: "customer.email".to_string(),
            reason: None,
            severity: Severity::Warning,
        });
        assert!(!requires_review(&e));
        assert!(can_confirm(&e, &Corrections::default()).is_ok());
    }

    #[test]
    fn test_can_confirm_fails_closed_without_confidence() {
        let e = extraction_with(Quality::default());
        assert!(matches!(
            can_confirm(&e, &Corrections::default()),
            Err(PipelineError::MissingConfidence)
        ));
    }

    #[test]
    fn test_correction_resolves_missing_field() {
        let mut e = extraction_with(Quality {
            overall_confidence: Some(0.8),
            ..Default::default()
        });
        e.missing_fields.push(required_missing("time.labour_entries[0].hours"));

        let none = Corrections::default();
        assert!(matches!(
            can_confirm(&e, &none),
            Err(PipelineError::Inconsistent { ref fields })
                if fields == &vec!["time.labour_entries[0].hours".to_string()]
        ));
        assert_eq!(remaining_issues(&e, &none), 1);

        let corrections: Corrections =
            serde_json::from_str(r#"{"labour_0_hours": 4}"#).unwrap();
        assert!(can_confirm(&e, &corrections).is_ok());
        assert_eq!(remaining_issues(&e, &corrections), 0);
    }

    #[test]
    fn test_remaining_issues_counts_unconfirmed_assumptions() {
        let mut e = extraction_with(Quality {
            overall_confidence: Some(0.8),
            ..Default::default()
        });
        e.assumptions.push(Assumption {
            field: "job.estimated_days_max".to_string(),
            assumption: "2 days based on typical fence replacement".to_string(),
            confidence: 0.6,
            source: Some("default".to_string()),
        });

        assert_eq!(remaining_issues(&e, &Corrections::default()), 1);

        let confirmed: Corrections = serde_json::from_str(
            r#"{"confirmed_assumptions": ["job.estimated_days_max"]}"#,
        )
        .unwrap();
        assert_eq!(remaining_issues(&e, &confirmed), 0);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence_band(0.69), ConfidenceBand::Red);
        assert_eq!(confidence_band(0.70), ConfidenceBand::Amber);
        assert_eq!(confidence_band(0.84), ConfidenceBand::Amber);
        assert_eq!(confidence_band(0.85), ConfidenceBand::Green);
        assert_eq!(confidence_band(1.0), ConfidenceBand::Green);
    }
}
