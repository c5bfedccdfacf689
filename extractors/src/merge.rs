//! Fail-closed merge of user corrections into an extraction result.
//!
//! The original extraction is never mutated; the caller keeps it for
//! audit alongside the raw corrections blob.

use chrono::{DateTime, Utc};
use shared_types::{
    ConfidenceScored, CorrectionPatch, Corrections, ExtractionResult, FieldPath, PipelineError,
};

use crate::gate;

/// Apply user corrections to a clone of the extraction.
///
/// Each patch overwrites the target value with confidence forced to 1.0,
/// stamps the quality block user-confirmed, then re-runs the gate. If
/// required fields are still unresolved the merge is rejected with the
/// specific field list; a quote must never be built from data known to be
/// incomplete.
pub fn apply_corrections(
    extraction: &ExtractionResult,
    corrections: &Corrections,
    confirmed_at: DateTime<Utc>,
) -> Result<ExtractionResult, PipelineError> {
    let patches = corrections.patches()?;

    let mut corrected = extraction.clone();
    for patch in &patches {
        set_field(&mut corrected, patch)?;
    }

    corrected.quality.user_confirmed = true;
    corrected.quality.user_confirmed_at = Some(confirmed_at.to_rfc3339());
    corrected.quality.requires_user_confirmation = false;

    gate::can_confirm(&corrected, corrections)?;

    Ok(corrected)
}

/// Generic path-setter over the typed result. A patch addressing an entry
/// that does not exist is an inconsistency, not a silent no-op.
fn set_field(
    extraction: &mut ExtractionResult,
    patch: &CorrectionPatch,
) -> Result<(), PipelineError> {
    let out_of_range = || PipelineError::Inconsistent {
        fields: vec![patch.path.structural_path()],
    };

    let slot: &mut Option<ConfidenceScored> = match patch.path {
        FieldPath::LabourHours(i) => {
            &mut extraction.time.labour_entries.get_mut(i).ok_or_else(out_of_range)?.hours
        }
        FieldPath::LabourDays(i) => {
            &mut extraction.time.labour_entries.get_mut(i).ok_or_else(out_of_range)?.days
        }
        FieldPath::LabourPeople(i) => {
            &mut extraction.time.labour_entries.get_mut(i).ok_or_else(out_of_range)?.people
        }
        FieldPath::MaterialQuantity(i) => {
            &mut extraction.materials.items.get_mut(i).ok_or_else(out_of_range)?.quantity
        }
        FieldPath::TravelHours => {
            &mut extraction.fees.travel.get_or_insert_with(Default::default).hours
        }
    };

    match slot {
        Some(field) => field.apply_user_value(patch.value),
        None => {
            *slot = Some(ConfidenceScored::Scored {
                value: Some(patch.value),
                confidence: 1.0,
                source: Some("user".to_string()),
            })
        }
    }

    Ok(())
}
