use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use shared_types::{IntakeStage, PipelineError};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{generation_jobs, intakes, Database};
use crate::handlers::map_pipeline_error;
use crate::sync::{ChangeFeed, ChangeKind};

#[derive(Debug, Deserialize)]
pub struct DraftCompleteRequest {
    /// Whether the drafting stage wants the extraction reviewed again
    #[serde(default)]
    pub requires_review: bool,
}

pub async fn draft_started(
    database: web::Data<Arc<Database>>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();

    let intake = intakes::update_stage(
        database.async_connection.clone(),
        intake_id,
        IntakeStage::DraftStarted,
    )
    .await
    .map_err(map_pipeline_error)?;

    feed.publish(intake_id, ChangeKind::IntakeUpdated);

    Ok(HttpResponse::Ok().json(intake))
}

/// Drafting finished. A post-confirmation request for another review is
/// a review loop and is refused outright; the quote the user signed off
/// on is never reopened by a machine. A pre-confirmation request is also
/// refused (there is no edge from drafting back into review), but the
/// intake is marked failed so `reopen_for_retry` can re-run extraction
/// instead of leaving the record parked at `draft_started`.
pub async fn draft_complete(
    database: web::Data<Arc<Database>>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<Uuid>,
    request: web::Json<DraftCompleteRequest>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();

    let intake = intakes::get_intake(database.async_connection.clone(), intake_id)
        .await
        .map_err(map_pipeline_error)?;

    if request.requires_review {
        if intake.is_user_confirmed() {
            return Err(map_pipeline_error(PipelineError::ReviewLoop.into()));
        }

        let message = "draft builder sent the extraction back; retry extraction";
        intakes::mark_failed(database.async_connection.clone(), intake_id, message)
            .await
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
        if let Some(job) =
            generation_jobs::get_job_by_intake(database.async_connection.clone(), intake_id)
                .await
                .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        {
            generation_jobs::mark_failed(database.async_connection.clone(), job.id, message)
                .await
                .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
            feed.publish(intake_id, ChangeKind::JobUpdated);
        }
        feed.publish(intake_id, ChangeKind::IntakeUpdated);

        return Err(actix_web::error::ErrorConflict(format!(
            "Intake {intake_id} cannot re-enter review from {}; marked failed for retry",
            intake.stage.as_str()
        )));
    }

    let updated = intakes::update_stage(
        database.async_connection.clone(),
        intake_id,
        IntakeStage::DraftDone,
    )
    .await
    .map_err(map_pipeline_error)?;

    // The draft-builder owns job completion; extraction leaves it running
    if let Some(job) = generation_jobs::get_job_by_intake(database.async_connection.clone(), intake_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
    {
        generation_jobs::mark_complete(database.async_connection.clone(), job.id)
            .await
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
        feed.publish(intake_id, ChangeKind::JobUpdated);
    }

    feed.publish(intake_id, ChangeKind::IntakeUpdated);

    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{generation_jobs, intakes, Database};
    use crate::sync::ChangeFeed;
    use actix_web::{http::StatusCode, test, App};
    use shared_types::{ExtractionResult, GenerationJobStatus};
    use tempfile::TempDir;

    async fn drafting_intake(confirmed: bool) -> (TempDir, std::sync::Arc<Database>, Uuid) {
        let dir = TempDir::new().unwrap();
        let db = std::sync::Arc::new(Database::new(&dir.path().join("t.sqlite3")).unwrap());
        let conn = db.async_connection.clone();

        let intake = intakes::insert_intake(conn.clone(), "fence job").await.unwrap();
        intakes::update_stage(conn.clone(), intake.id, IntakeStage::Extracting)
            .await
            .unwrap();
        generation_jobs::get_or_create_job(conn.clone(), intake.id)
            .await
            .unwrap();

        let mut extraction = ExtractionResult::default();
        extraction.job.title = Some("Fence".to_string());
        extraction.quality.overall_confidence = Some(0.9);
        extraction.quality.user_confirmed = confirmed;
        intakes::set_extraction(conn.clone(), intake.id, &extraction, IntakeStage::ExtractDone)
            .await
            .unwrap();
        intakes::update_stage(conn, intake.id, IntakeStage::DraftStarted)
            .await
            .unwrap();

        (dir, db, intake.id)
    }

    #[actix_web::test]
    async fn review_loop_after_confirmation_is_refused() {
        let (_dir, db, id) = drafting_intake(true).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .app_data(web::Data::new(ChangeFeed::default()))
                .route(
                    "/api/intakes/{id}/draft/complete",
                    web::post().to(draft_complete),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/intakes/{id}/draft/complete"))
            .set_json(serde_json::json!({ "requires_review": true }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // no stage change, job not completed
        let intake = intakes::get_intake(db.async_connection.clone(), id)
            .await
            .unwrap();
        assert_eq!(intake.stage, IntakeStage::DraftStarted);
    }

    #[actix_web::test]
    async fn pre_confirmation_review_request_fails_the_intake_for_retry() {
        let (_dir, db, id) = drafting_intake(false).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .app_data(web::Data::new(ChangeFeed::default()))
                .route(
                    "/api/intakes/{id}/draft/complete",
                    web::post().to(draft_complete),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/intakes/{id}/draft/complete"))
            .set_json(serde_json::json!({ "requires_review": true }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // Parked at failed, not stranded at draft_started
        let intake = intakes::get_intake(db.async_connection.clone(), id)
            .await
            .unwrap();
        assert_eq!(intake.stage, IntakeStage::Failed);
        assert!(intake.error_message.is_some());

        let job = generation_jobs::get_job_by_intake(db.async_connection.clone(), id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.status, GenerationJobStatus::Failed);

        // reopen_for_retry is the legal continuation
        let reopened = intakes::reopen_for_retry(db.async_connection.clone(), id)
            .await
            .unwrap();
        assert_eq!(reopened.stage, IntakeStage::Extracting);
    }

    #[actix_web::test]
    async fn draft_complete_marks_job_complete_and_stage_draft_done() {
        let (_dir, db, id) = drafting_intake(true).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .app_data(web::Data::new(ChangeFeed::default()))
                .route(
                    "/api/intakes/{id}/draft/complete",
                    web::post().to(draft_complete),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/intakes/{id}/draft/complete"))
            .set_json(serde_json::json!({ "requires_review": false }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let intake = intakes::get_intake(db.async_connection.clone(), id)
            .await
            .unwrap();
        assert_eq!(intake.stage, IntakeStage::DraftDone);

        let job = generation_jobs::get_job_by_intake(db.async_connection.clone(), id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.status, GenerationJobStatus::Complete);
    }
}
