use shared_types::Corrections;

pub fn build_system_prompt() -> String {
    r#"You are a quoting assistant for tradespeople. You turn a dictated job
description into structured quote data. Respond with a single JSON object
and nothing else - no prose, no markdown fence.

## Output Schema

{
  "customer": {"name": string|null, "email": string|null, "phone": string|null} | null,
  "job": {
    "title": string|null,
    "summary": string|null,
    "site_address": string|null,
    "timeline": string|null,
    "estimated_days_min": number|null,
    "estimated_days_max": number|null,
    "scope_of_work": [string, ...]
  },
  "time": {
    "labour_entries": [
      {
        "description": string|null,
        "hours": {"value": number|null, "confidence": number, "source": string},
        "days": {"value": number|null, "confidence": number, "source": string},
        "people": {"value": number|null, "confidence": number, "source": string},
        "note": string|null
      }
    ]
  },
  "materials": {
    "items": [
      {
        "description": string|null,
        "quantity": {"value": number|null, "confidence": number, "source": string},
        "unit": string|null,
        "notes": string|null
      }
    ]
  },
  "fees": {
    "travel": {"hours": {...}|null, "flat_amount": {...}|null} | null,
    "materials_pickup": {...}|null,
    "callout": {...}|null
  },
  "assumptions": [
    {"field": string, "assumption": string, "confidence": number, "source": string}
  ],
  "missing_fields": [
    {"field": string, "reason": string, "severity": "required"|"warning"}
  ],
  "quality": {
    "overall_confidence": number,
    "ambiguous_fields": [string, ...],
    "critical_fields_below_threshold": [string, ...],
    "user_confirmed": false,
    "requires_user_confirmation": boolean
  }
}

## Rules

1. Every numeric quantity carries a {value, confidence, source} triple.
   confidence is 0..1; source is "transcript" when spoken explicitly,
   "assumed" when you supplied a default.
2. Vague durations are fixed: "a couple hours" = 2 hours, "a few days" =
   3 days. Vague quantities: "a couple" = 2, "a few" = 3, "some" = 5.
3. Spoken ranges keep both ends: "three or four days" means
   estimated_days_min = 3 and estimated_days_max = 4.
4. Unknown numbers are null, never 0. Never emit NaN or Infinity.
5. Use metric short units: "m", "sqm", "mm", "l", "kg", "ea", "hr".
6. Every default you apply without the speaker saying it goes into
   "assumptions" with its field path (e.g. "time.labour_entries[0].hours").
7. Anything required for pricing that the speaker did not mention goes
   into "missing_fields" with severity "required"; nice-to-have gaps get
   "warning". Field paths use the same convention as assumptions.
8. quality.overall_confidence is your calibrated confidence in the whole
   extraction. Set requires_user_confirmation to true whenever
   overall_confidence is below 0.85 or any required field is missing.
9. missing_fields and assumptions are ordered by importance.
"#
    .to_string()
}

/// Transcript plus, on a re-extraction, the user's prior corrections as
/// additional context. Corrections are never silently discarded before a
/// re-run.
pub fn build_user_content(transcript: &str, prior_corrections: Option<&Corrections>) -> String {
    let mut content = format!("## Transcript\n\n{transcript}\n");

    if let Some(corrections) = prior_corrections.filter(|c| !c.is_empty()) {
        content.push_str("\n## Corrections the user already made (treat as ground truth)\n\n");
        for (key, value) in &corrections.values {
            content.push_str(&format!("- {key} = {value}\n"));
        }
        for field in &corrections.confirmed_assumptions {
            content.push_str(&format!("- confirmed assumption: {field}\n"));
        }
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_content_includes_prior_corrections() {
        let corrections: Corrections =
            serde_json::from_str(r#"{"labour_0_hours": 4, "confirmed_assumptions": ["job.title"]}"#)
                .unwrap();
        let content = build_user_content("replace the fence", Some(&corrections));
        assert!(content.contains("replace the fence"));
        assert!(content.contains("labour_0_hours = 4"));
        assert!(content.contains("confirmed assumption: job.title"));
    }

    #[test]
    fn test_user_content_without_corrections() {
        let content = build_user_content("replace the fence", None);
        assert!(!content.contains("Corrections"));
    }
}
