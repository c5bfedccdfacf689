use uuid::Uuid;

/// Pipeline error taxonomy.
///
/// `Transient` is the only class the caller-level retry policy is allowed
/// to retry; everything else fails immediately.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Intake not found: {0}")]
    IntakeNotFound(Uuid),

    #[error("Inference backend temporarily unavailable: {0}")]
    Transient(String),

    #[error("Inference backend error: {0}")]
    Backend(String),

    #[error("Extraction response violates the quote schema: {0}")]
    MalformedResponse(String),

    #[error("Extraction produced no usable fields")]
    EmptyExtraction,

    #[error("Extraction quality block has no overall_confidence")]
    MissingConfidence,

    #[error("Record cannot be confirmed, unresolved fields: {}", fields.join(", "))]
    Inconsistent { fields: Vec<String> },

    #[error("Review loop detected: downstream requested review after user confirmation")]
    ReviewLoop,

    #[error("Illegal stage transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Pipeline stalled before any output appeared")]
    Stalled,
}

impl PipelineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }
}
