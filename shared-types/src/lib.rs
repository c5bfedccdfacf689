use serde::{Deserialize, Serialize};

pub mod corrections;
pub mod error;
pub mod extraction;
pub mod generation_job;
pub mod intake;

pub use corrections::{CorrectionPatch, Corrections, FieldPath};
pub use error::PipelineError;
pub use extraction::{
    Assumption, ConfidenceBand, ConfidenceScored, Customer, ExtractionResult, Fees, JobDetails,
    LabourEntry, MaterialItem, MaterialsSection, MissingField, Quality, Severity, TimeSection,
    TravelFee, CONFIDENCE_GREEN_FROM, CONFIDENCE_RED_BELOW, LEGACY_BARE_CONFIDENCE,
};
pub use generation_job::{
    GenerationJob, GenerationJobListResponse, GenerationJobStatus, EXTRACTION_STEPS,
};
pub use intake::{
    CreateIntakeRequest, Intake, IntakeListResponse, IntakeStage, IntakeStatus,
};

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
