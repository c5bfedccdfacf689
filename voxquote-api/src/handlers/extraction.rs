use actix_web::{web, HttpResponse, Result as ActixResult};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{generation_jobs, intakes, Database};
use crate::handlers::map_pipeline_error;
use crate::jobs::extraction_manager::ExtractionManager;
use crate::sync::{ChangeFeed, ObserverConfig, PipelineObserver, PipelineOutcome};

/// Kick off extraction in the background. Calling this twice is safe:
/// the manager collapses concurrent starts and replays completed jobs.
pub async fn start_extraction(
    database: web::Data<Arc<Database>>,
    manager: web::Data<Arc<ExtractionManager>>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();

    intakes::get_intake(database.async_connection.clone(), intake_id)
        .await
        .map_err(map_pipeline_error)?;

    let manager = manager.get_ref().clone();
    tokio::spawn(async move {
        if let Err(e) = manager.run_extraction_with_retry(intake_id).await {
            tracing::error!(%intake_id, error = %e, "Extraction run failed");
        }
    });

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "started" })))
}

pub async fn get_generation_job(
    database: web::Data<Arc<Database>>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();

    let job = generation_jobs::get_job_by_intake(database.async_connection.clone(), intake_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| {
            actix_web::error::ErrorNotFound(format!("No generation job for intake {intake_id}"))
        })?;

    Ok(HttpResponse::Ok().json(job))
}

/// Long-poll until the extraction pipeline settles for this intake,
/// then report the outcome.
pub async fn watch_intake(
    database: web::Data<Arc<Database>>,
    feed: web::Data<ChangeFeed>,
    observer_config: web::Data<ObserverConfig>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();

    let observer = PipelineObserver::new(
        database.async_connection.clone(),
        observer_config.get_ref().clone(),
    );

    let outcome = observer
        .observe(intake_id, feed.subscribe())
        .await
        .map_err(map_pipeline_error)?;

    let body = match outcome {
        PipelineOutcome::Ready => serde_json::json!({ "outcome": "ready" }),
        PipelineOutcome::NeedsReview => serde_json::json!({ "outcome": "needs_review" }),
        PipelineOutcome::Failed { message } => {
            serde_json::json!({ "outcome": "failed", "error": message })
        }
        PipelineOutcome::Stalled { has_partial_output } => serde_json::json!({
            "outcome": "stalled",
            "has_partial_output": has_partial_output
        }),
        PipelineOutcome::ExhaustedPolling => {
            serde_json::json!({ "outcome": "exhausted_polling" })
        }
    };

    Ok(HttpResponse::Ok().json(body))
}
