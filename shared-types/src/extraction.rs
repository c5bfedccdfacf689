use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Below this a field is red / needs review
pub const CONFIDENCE_RED_BELOW: f64 = 0.70;
/// At or above this a field is green
pub const CONFIDENCE_GREEN_FROM: f64 = 0.85;
/// Confidence assigned to bare legacy numbers that carry no triple
pub const LEGACY_BARE_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Red,
    Amber,
    Green,
}

/// A numeric leaf paired with the model's confidence in it.
///
/// Serialized either as a `{value, confidence, source}` triple or as a bare
/// legacy number; a bare number deserializes with confidence 0.9.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum ConfidenceScored {
    Scored {
        value: Option<f64>,
        confidence: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Bare(f64),
}

impl ConfidenceScored {
    pub fn scored(value: f64, confidence: f64, source: &str) -> Self {
        ConfidenceScored::Scored {
            value: Some(value),
            confidence,
            source: Some(source.to_string()),
        }
    }

    /// The uniform accessor: every call site gets (value, confidence)
    /// without caring which shape the field arrived in.
    pub fn unwrap(&self) -> (Option<f64>, f64) {
        match self {
            ConfidenceScored::Scored {
                value, confidence, ..
            } => (*value, *confidence),
            ConfidenceScored::Bare(v) => (Some(*v), LEGACY_BARE_CONFIDENCE),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.unwrap().0
    }

    pub fn confidence(&self) -> f64 {
        self.unwrap().1
    }

    /// Overwrite the value with a user correction, forcing confidence to
    /// 1.0 and leaving any existing source untouched. A bare legacy number
    /// is upgraded to a triple sourced from the user.
    pub fn apply_user_value(&mut self, new_value: f64) {
        match self {
            ConfidenceScored::Scored {
                value, confidence, ..
            } => {
                *value = Some(new_value);
                *confidence = 1.0;
            }
            ConfidenceScored::Bare(_) => {
                *self = ConfidenceScored::Scored {
                    value: Some(new_value),
                    confidence: 1.0,
                    source: Some("user".to_string()),
                };
            }
        }
    }
}

/// Structured result the extraction engine produces from a transcript
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ExtractionResult {
    pub customer: Option<Customer>,
    pub job: JobDetails,
    pub time: TimeSection,
    pub materials: MaterialsSection,
    pub fees: Fees,
    /// Defaults the engine applied without explicit user input, ordered
    #[serde(default)]
    pub assumptions: Vec<Assumption>,
    #[serde(default)]
    pub missing_fields: Vec<MissingField>,
    pub quality: Quality,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct Customer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct JobDetails {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub site_address: Option<String>,
    pub timeline: Option<String>,
    pub estimated_days_min: Option<f64>,
    /// Downstream estimates use the max of a spoken range
    pub estimated_days_max: Option<f64>,
    #[serde(default)]
    pub scope_of_work: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct TimeSection {
    #[serde(default)]
    pub labour_entries: Vec<LabourEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct LabourEntry {
    pub description: Option<String>,
    pub hours: Option<ConfidenceScored>,
    pub days: Option<ConfidenceScored>,
    pub people: Option<ConfidenceScored>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct MaterialsSection {
    #[serde(default)]
    pub items: Vec<MaterialItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct MaterialItem {
    pub description: Option<String>,
    pub quantity: Option<ConfidenceScored>,
    pub unit: Option<String>,
    pub notes: Option<String>,
    pub catalog_item_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct Fees {
    pub travel: Option<TravelFee>,
    pub materials_pickup: Option<ConfidenceScored>,
    pub callout: Option<ConfidenceScored>,
}

/// Travel is either time-based or a flat charge
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct TravelFee {
    pub hours: Option<ConfidenceScored>,
    pub flat_amount: Option<ConfidenceScored>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Assumption {
    pub field: String,
    pub assumption: String,
    pub confidence: f64,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MissingField {
    /// Structural path, e.g. `time.labour_entries[0].hours`
    pub field: String,
    pub reason: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Required,
    Warning,
}

/// The quality block is the single source of truth for confidence.
/// `overall_confidence` is never recomputed downstream; its absence is a
/// hard failure, not a default to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct Quality {
    pub overall_confidence: Option<f64>,
    #[serde(default)]
    pub ambiguous_fields: Vec<String>,
    #[serde(default)]
    pub critical_fields_below_threshold: Vec<String>,
    #[serde(default)]
    pub user_confirmed: bool,
    pub user_confirmed_at: Option<String>,
    #[serde(default)]
    pub requires_user_confirmation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_number_unwraps_with_legacy_confidence() {
        let field: ConfidenceScored = serde_json::from_str("4.5").unwrap();
        assert_eq!(field.unwrap(), (Some(4.5), LEGACY_BARE_CONFIDENCE));
    }

    #[test]
    fn test_triple_round_trip() {
        let json = r#"{"value": 2.0, "confidence": 0.8, "source": "transcript"}"#;
        let field: ConfidenceScored = serde_json::from_str(json).unwrap();
        assert_eq!(field.unwrap(), (Some(2.0), 0.8));

        let back = serde_json::to_value(&field).unwrap();
        assert_eq!(back["value"], 2.0);
        assert_eq!(back["confidence"], 0.8);
    }

    #[test]
    fn test_null_value_is_unknown_not_zero() {
        let json = r#"{"value": null, "confidence": 0.3}"#;
        let field: ConfidenceScored = serde_json::from_str(json).unwrap();
        assert_eq!(field.value(), None);
    }

    #[test]
    fn test_apply_user_value_forces_full_confidence() {
        let mut field = ConfidenceScored::scored(3.0, 0.6, "transcript");
        field.apply_user_value(4.0);
        assert_eq!(field.unwrap(), (Some(4.0), 1.0));
        match field {
            ConfidenceScored::Scored { source, .. } => {
                assert_eq!(source.as_deref(), Some("transcript"));
            }
            _ => panic!("expected triple"),
        }

        let mut bare = ConfidenceScored::Bare(2.0);
        bare.apply_user_value(5.0);
        assert_eq!(bare.unwrap(), (Some(5.0), 1.0));
    }
}
