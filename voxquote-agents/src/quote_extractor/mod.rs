pub mod system_prompt;

use serde_json::Value;
use shared_types::PipelineError;

/// Parse the model's reply as strict JSON.
///
/// A markdown code fence around the payload is tolerated (models add them
/// despite instructions); anything that is not a single JSON document is a
/// hard failure, never a partial success.
pub fn parse_response_json(content: &str) -> Result<Value, PipelineError> {
    let trimmed = content.trim();

    let payload = if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.split("```")
            .next()
            .unwrap_or_default()
            .trim()
    } else {
        trimmed
    };

    serde_json::from_str(payload)
        .map_err(|e| PipelineError::MalformedResponse(format!("invalid JSON: {e}")))
}
