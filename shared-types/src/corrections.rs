use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// User-entered overrides from the review screen.
///
/// The wire contract is flat keys (`labour_0_hours`, `material_2_quantity`,
/// `travel_hours`) plus `confirmed_assumptions`; keys are parsed once into
/// typed [`FieldPath`] patches rather than re-split at every call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corrections {
    #[serde(default)]
    pub confirmed_assumptions: Vec<String>,
    #[serde(flatten)]
    pub values: BTreeMap<String, serde_json::Value>,
}

impl Corrections {
    pub fn is_empty(&self) -> bool {
        self.confirmed_assumptions.is_empty() && self.values.is_empty()
    }

    /// Parse every correction key into a typed patch. Unknown keys and
    /// non-numeric values are rejected wholesale: a correction the engine
    /// cannot place must never be silently dropped.
    pub fn patches(&self) -> Result<Vec<CorrectionPatch>, PipelineError> {
        let mut patches = Vec::new();
        let mut bad_keys = Vec::new();

        for (key, value) in &self.values {
            match (FieldPath::parse(key), value.as_f64()) {
                (Some(path), Some(value)) if value.is_finite() => {
                    patches.push(CorrectionPatch { path, value });
                }
                _ => bad_keys.push(key.clone()),
            }
        }

        if !bad_keys.is_empty() {
            return Err(PipelineError::Inconsistent { fields: bad_keys });
        }
        Ok(patches)
    }

    /// Whether an assumption on `field` has been explicitly confirmed
    pub fn confirms(&self, field: &str) -> bool {
        self.confirmed_assumptions.iter().any(|f| f == field)
    }

    /// Whether some correction resolves the given structural path
    /// (e.g. `time.labour_entries[0].hours` ⇐ key `labour_0_hours`)
    pub fn resolves(&self, structural_path: &str) -> bool {
        self.values
            .keys()
            .filter_map(|k| FieldPath::parse(k))
            .any(|p| p.structural_path() == structural_path)
    }
}

/// Typed location of a correctable numeric field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPath {
    LabourHours(usize),
    LabourDays(usize),
    LabourPeople(usize),
    MaterialQuantity(usize),
    TravelHours,
}

impl FieldPath {
    pub fn parse(key: &str) -> Option<FieldPath> {
        if key == "travel_hours" {
            return Some(FieldPath::TravelHours);
        }
        if let Some(rest) = key.strip_prefix("labour_") {
            let (index, field) = rest.split_once('_')?;
            let index: usize = index.parse().ok()?;
            return match field {
                "hours" => Some(FieldPath::LabourHours(index)),
                "days" => Some(FieldPath::LabourDays(index)),
                "people" => Some(FieldPath::LabourPeople(index)),
                _ => None,
            };
        }
        if let Some(rest) = key.strip_prefix("material_") {
            let index = rest.strip_suffix("_quantity")?;
            let index: usize = index.parse().ok()?;
            return Some(FieldPath::MaterialQuantity(index));
        }
        None
    }

    /// The structural path missing-field entries are keyed by
    pub fn structural_path(&self) -> String {
        match self {
            FieldPath::LabourHours(i) => format!("time.labour_entries[{i}].hours"),
            FieldPath::LabourDays(i) => format!("time.labour_entries[{i}].days"),
            FieldPath::LabourPeople(i) => format!("time.labour_entries[{i}].people"),
            FieldPath::MaterialQuantity(i) => format!("materials.items[{i}].quantity"),
            FieldPath::TravelHours => "fees.travel.hours".to_string(),
        }
    }
}

/// One `(path, new value)` operation applied during the correction merge
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionPatch {
    pub path: FieldPath,
    pub value: f64,
}
