pub mod drafts;
pub mod extraction;
pub mod intakes;
pub mod review;

use shared_types::PipelineError;

/// Map database/pipeline errors onto HTTP statuses. Anything without a
/// specific mapping is a 500.
pub(crate) fn map_pipeline_error(e: anyhow::Error) -> actix_web::Error {
    match e.downcast_ref::<PipelineError>() {
        Some(PipelineError::IntakeNotFound(_)) => {
            actix_web::error::ErrorNotFound(e.to_string())
        }
        Some(PipelineError::IllegalTransition { .. }) | Some(PipelineError::ReviewLoop) => {
            actix_web::error::ErrorConflict(e.to_string())
        }
        Some(PipelineError::Inconsistent { .. }) | Some(PipelineError::MissingConfidence) => {
            actix_web::error::ErrorUnprocessableEntity(e.to_string())
        }
        _ => actix_web::error::ErrorInternalServerError(e.to_string()),
    }
}
