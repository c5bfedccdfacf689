use actix_web::{web, HttpResponse, Result as ActixResult};
use extractors::{apply_corrections, confidence_band, remaining_issues};
use shared_types::{Corrections, IntakeStage, PipelineError};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{intakes, Database};
use crate::handlers::map_pipeline_error;
use crate::sync::{ChangeFeed, ChangeKind};

/// Current review state: the extraction, its confidence band and how
/// many issues stand between the user and confirmation.
pub async fn get_review(
    database: web::Data<Arc<Database>>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();

    let intake = intakes::get_intake(database.async_connection.clone(), intake_id)
        .await
        .map_err(map_pipeline_error)?;

    if intake.is_user_confirmed() {
        return Err(actix_web::error::ErrorConflict(format!(
            "Intake {intake_id} is already confirmed"
        )));
    }

    if intake.stage != IntakeStage::NeedsUserReview {
        return Err(actix_web::error::ErrorConflict(format!(
            "Intake {intake_id} is not awaiting review (stage {})",
            intake.stage.as_str()
        )));
    }

    let extraction = intake.extraction_json.as_ref().ok_or_else(|| {
        actix_web::error::ErrorConflict(format!("Intake {intake_id} has no extraction yet"))
    })?;

    let corrections: Corrections = intake
        .user_corrections_json
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    // Fail closed: an extraction with no overall confidence can never be
    // confirmed, so don't serve it as reviewable either
    let band = match extraction.quality.overall_confidence {
        Some(confidence) => confidence_band(confidence),
        None => return Err(map_pipeline_error(PipelineError::MissingConfidence.into())),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "intake_id": intake.id,
        "stage": intake.stage,
        "extraction": extraction,
        "confidence_band": band,
        "issues_remaining": remaining_issues(extraction, &corrections),
    })))
}

/// Submit corrections and attempt confirmation.
///
/// The raw corrections are persisted before the merge is attempted, so a
/// rejected confirmation never loses the user's typing. The merge itself
/// is fail-closed: unresolved required fields come back as a 422 and the
/// intake stays in review.
pub async fn submit_review(
    database: web::Data<Arc<Database>>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<Uuid>,
    request: web::Json<Corrections>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();
    let corrections = request.into_inner();

    let intake = intakes::get_intake(database.async_connection.clone(), intake_id)
        .await
        .map_err(map_pipeline_error)?;

    if intake.is_user_confirmed() {
        return Err(actix_web::error::ErrorConflict(format!(
            "Intake {intake_id} is already confirmed"
        )));
    }

    if intake.stage != IntakeStage::NeedsUserReview {
        return Err(map_pipeline_error(
            PipelineError::IllegalTransition {
                from: intake.stage.as_str().to_string(),
                to: IntakeStage::ExtractDone.as_str().to_string(),
            }
            .into(),
        ));
    }

    let raw = serde_json::to_value(&corrections)
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    // Persist first: partial corrections survive a rejected merge
    intakes::save_corrections(database.async_connection.clone(), intake_id, &raw)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let extraction = intake.extraction_json.as_ref().ok_or_else(|| {
        actix_web::error::ErrorConflict(format!("Intake {intake_id} has no extraction yet"))
    })?;

    let corrected = apply_corrections(extraction, &corrections, chrono::Utc::now())
        .map_err(|e| map_pipeline_error(e.into()))?;

    let updated = intakes::set_corrected_extraction(
        database.async_connection.clone(),
        intake_id,
        &corrected,
        &raw,
    )
    .await
    .map_err(map_pipeline_error)?;

    feed.publish(intake_id, ChangeKind::IntakeUpdated);

    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{intakes, Database};
    use actix_web::{http::StatusCode, test, App};
    use shared_types::ExtractionResult;
    use tempfile::TempDir;

    async fn review_intake(
        overall_confidence: Option<f64>,
    ) -> (TempDir, std::sync::Arc<Database>, Uuid) {
        let dir = TempDir::new().unwrap();
        let db = std::sync::Arc::new(Database::new(&dir.path().join("t.sqlite3")).unwrap());
        let conn = db.async_connection.clone();

        let intake = intakes::insert_intake(conn.clone(), "deck repair").await.unwrap();
        intakes::update_stage(conn.clone(), intake.id, IntakeStage::Extracting)
            .await
            .unwrap();

        let mut extraction = ExtractionResult::default();
        extraction.job.title = Some("Deck".to_string());
        extraction.quality.overall_confidence = overall_confidence;
        extraction.quality.requires_user_confirmation = true;
        intakes::set_extraction(conn, intake.id, &extraction, IntakeStage::NeedsUserReview)
            .await
            .unwrap();

        (dir, db, intake.id)
    }

    #[actix_web::test]
    async fn review_without_overall_confidence_is_unprocessable() {
        let (_dir, db, id) = review_intake(None).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .route("/api/intakes/{id}/review", web::get().to(get_review)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/intakes/{id}/review"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn review_serves_band_and_remaining_issues() {
        let (_dir, db, id) = review_intake(Some(0.72)).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .route("/api/intakes/{id}/review", web::get().to(get_review)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/intakes/{id}/review"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["confidence_band"], "amber");
    }
}
