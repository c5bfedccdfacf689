//! Strict schema parse of the inference response.
//!
//! The model is instructed to return `{value, confidence, source}` triples
//! for numeric leaves, but responses drift: bare numbers and spoken
//! phrases ("a couple hours") show up in practice. Those are normalized on
//! the way in; anything else is a hard failure, never a partial success.

use serde_json::Value;
use shared_types::{ExtractionResult, PipelineError};

use crate::normalize::{canonical_unit, parse_numeric_phrase, sanitize_number, ParsedNumber};

/// Confidence attached to values recovered from a vague phrase
const NORMALIZED_PHRASE_CONFIDENCE: f64 = 0.75;

/// Parse a raw model response into a validated [`ExtractionResult`].
///
/// Hard failures: non-object response, malformed numeric leaves, a missing
/// `quality.overall_confidence` (fail closed, never default to zero), and
/// empty extractions with no title, customer, materials or labour.
pub fn parse_extraction(raw: &Value) -> Result<ExtractionResult, PipelineError> {
    let mut doc = raw.clone();

    let obj = doc
        .as_object_mut()
        .ok_or_else(|| PipelineError::MalformedResponse("response is not a JSON object".into()))?;

    if !obj.contains_key("quality") {
        return Err(PipelineError::MissingConfidence);
    }

    if let Some(time) = obj.get_mut("time") {
        if let Some(entries) = time.get_mut("labour_entries").and_then(Value::as_array_mut) {
            for (i, entry) in entries.iter_mut().enumerate() {
                for key in ["hours", "days", "people"] {
                    normalize_leaf(entry, key, &format!("time.labour_entries[{i}].{key}"))?;
                }
            }
        }
    }

    if let Some(materials) = obj.get_mut("materials") {
        if let Some(items) = materials.get_mut("items").and_then(Value::as_array_mut) {
            for (i, item) in items.iter_mut().enumerate() {
                normalize_leaf(item, "quantity", &format!("materials.items[{i}].quantity"))?;
                if let Some(unit) = item.get("unit").and_then(Value::as_str) {
                    let canonical = canonical_unit(unit);
                    item["unit"] = Value::String(canonical);
                }
            }
        }
    }

    if let Some(fees) = obj.get_mut("fees") {
        if let Some(travel) = fees.get_mut("travel") {
            if travel.is_object() {
                normalize_leaf(travel, "hours", "fees.travel.hours")?;
                normalize_leaf(travel, "flat_amount", "fees.travel.flat_amount")?;
            }
        }
        normalize_leaf(fees, "materials_pickup", "fees.materials_pickup")?;
        normalize_leaf(fees, "callout", "fees.callout")?;
    }

    if let Some(job) = obj.get_mut("job") {
        normalize_job_days(job)?;
    }

    let result: ExtractionResult = serde_json::from_value(doc)
        .map_err(|e| PipelineError::MalformedResponse(e.to_string()))?;

    match result.quality.overall_confidence {
        None => return Err(PipelineError::MissingConfidence),
        Some(c) if !(0.0..=1.0).contains(&c) => {
            return Err(PipelineError::MalformedResponse(format!(
                "overall_confidence {c} outside 0..1"
            )))
        }
        Some(_) => {}
    }

    if is_empty_extraction(&result) {
        return Err(PipelineError::EmptyExtraction);
    }

    Ok(result)
}

/// An extraction with no title, customer name, materials or labour is
/// useless and must not be persisted as a success.
fn is_empty_extraction(result: &ExtractionResult) -> bool {
    let has_title = result.job.title.as_deref().is_some_and(|t| !t.trim().is_empty());
    let has_customer = result
        .customer
        .as_ref()
        .and_then(|c| c.name.as_deref())
        .is_some_and(|n| !n.trim().is_empty());
    let has_materials = !result.materials.items.is_empty();
    let has_labour = !result.time.labour_entries.is_empty();

    !(has_title || has_customer || has_materials || has_labour)
}

/// Normalize one numeric leaf in place to the triple shape (or null).
///
/// Accepted inputs: null/absent, a bare number (kept bare, legacy
/// confidence applies on read), a spoken phrase string, or a triple whose
/// value may itself be a phrase. A range collapses to its max here; the
/// min/max split only exists on `job.estimated_days_*`.
fn normalize_leaf(parent: &mut Value, key: &str, path: &str) -> Result<(), PipelineError> {
    let Some(leaf) = parent.get_mut(key) else {
        return Ok(());
    };

    match leaf {
        Value::Null => Ok(()),
        Value::Number(n) => n
            .as_f64()
            .and_then(sanitize_number)
            .map(|_| ())
            .ok_or_else(|| PipelineError::MalformedResponse(format!("{path}: bad number"))),
        Value::String(s) => {
            *leaf = match parse_numeric_phrase(s) {
                Some(parsed) => triple(parsed.max(), NORMALIZED_PHRASE_CONFIDENCE, "normalized"),
                // an unparseable phrase is unknown, not zero
                None => Value::Null,
            };
            Ok(())
        }
        Value::Object(map) => {
            map.get("confidence")
                .and_then(Value::as_f64)
                .and_then(sanitize_number)
                .ok_or_else(|| {
                    PipelineError::MalformedResponse(format!("{path}: triple without confidence"))
                })?;

            match map.get("value") {
                None | Some(Value::Null) => {
                    map.insert("value".into(), Value::Null);
                }
                Some(Value::Number(n)) => {
                    if n.as_f64().and_then(sanitize_number).is_none() {
                        return Err(PipelineError::MalformedResponse(format!(
                            "{path}: bad number in triple"
                        )));
                    }
                }
                Some(Value::String(s)) => {
                    let replacement = match parse_numeric_phrase(s) {
                        Some(parsed) => json_number(parsed.max()),
                        None => Value::Null,
                    };
                    map.insert("value".into(), replacement);
                }
                Some(_) => {
                    return Err(PipelineError::MalformedResponse(format!(
                        "{path}: triple value is not numeric"
                    )))
                }
            }
            Ok(())
        }
        _ => Err(PipelineError::MalformedResponse(format!(
            "{path}: expected number, phrase or triple"
        ))),
    }
}

/// Spoken day estimates arrive in several shapes: explicit min/max, a
/// single `estimated_days`, or a range phrase. Ranges keep both ends;
/// downstream estimates use the max.
fn normalize_job_days(job: &mut Value) -> Result<(), PipelineError> {
    let Some(map) = job.as_object_mut() else {
        return Ok(());
    };

    if let Some(combined) = map.remove("estimated_days") {
        let parsed = match &combined {
            Value::Null => None,
            Value::Number(n) => n.as_f64().and_then(sanitize_number).map(ParsedNumber::Single),
            Value::String(s) => parse_numeric_phrase(s),
            _ => {
                return Err(PipelineError::MalformedResponse(
                    "job.estimated_days: expected number or phrase".into(),
                ))
            }
        };
        if let Some(parsed) = parsed {
            let (min, max) = match parsed {
                ParsedNumber::Single(v) => (v, v),
                ParsedNumber::Range { min, max } => (min, max),
            };
            map.entry("estimated_days_min").or_insert(json_number(min));
            map.entry("estimated_days_max").or_insert(json_number(max));
        }
    }

    for key in ["estimated_days_min", "estimated_days_max"] {
        if let Some(Value::String(s)) = map.get(key) {
            let replacement = match parse_numeric_phrase(s) {
                Some(parsed) => json_number(parsed.max()),
                None => Value::Null,
            };
            map.insert(key.into(), replacement);
        }
    }

    Ok(())
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn triple(value: f64, confidence: f64, source: &str) -> Value {
    serde_json::json!({
        "value": value,
        "confidence": confidence,
        "source": source,
    })
}
