use actix_web::{web, HttpResponse, Result as ActixResult};
use shared_types::{CreateIntakeRequest, IntakeListResponse};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::intakes as db;
use crate::database::Database;
use crate::handlers::map_pipeline_error;
use crate::sync::{ChangeFeed, ChangeKind};

pub async fn create_intake(
    database: web::Data<Arc<Database>>,
    feed: web::Data<ChangeFeed>,
    request: web::Json<CreateIntakeRequest>,
) -> ActixResult<HttpResponse> {
    let intake = db::insert_intake(database.async_connection.clone(), &request.transcript_text)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    feed.publish(intake.id, ChangeKind::IntakeUpdated);

    Ok(HttpResponse::Created().json(intake))
}

pub async fn list_intakes(database: web::Data<Arc<Database>>) -> ActixResult<HttpResponse> {
    let intakes = db::list_intakes(database.async_connection.clone(), 100)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(IntakeListResponse { intakes }))
}

pub async fn get_intake(
    database: web::Data<Arc<Database>>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let intake_id = path.into_inner();

    let intake = db::get_intake(database.async_connection.clone(), intake_id)
        .await
        .map_err(map_pipeline_error)?;

    Ok(HttpResponse::Ok().json(intake))
}
