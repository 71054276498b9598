use std::sync::Arc;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    CreateStudyRequest, StudyListQuery, StudyResultsQuery, StudyStateQuery, UpdateStudyRequest,
};
use crate::services::StudyService;

#[axum::debug_handler]
pub async fn list_studies(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Query(query): Query<StudyListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = StudyService::new(&config);

    let studies = service.list_studies(query).await?;

    Ok(Json(json!(studies)))
}

#[axum::debug_handler]
pub async fn get_study(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(study_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = StudyService::new(&config);

    let study = service.get_study(&study_id).await?;

    Ok(Json(json!(study)))
}

#[axum::debug_handler]
pub async fn create_study(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Json(request): Json<CreateStudyRequest>,
) -> Result<Json<Value>, AppError> {
    let service = StudyService::new(&config);

    let study = service.create_study(request).await?;

    Ok(Json(json!(study)))
}

#[axum::debug_handler]
pub async fn update_study(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(study_id): Path<String>,
    Json(request): Json<UpdateStudyRequest>,
) -> Result<Json<Value>, AppError> {
    let service = StudyService::new(&config);

    let study = service.update_study(&study_id, request).await?;

    Ok(Json(json!(study)))
}

#[axum::debug_handler]
pub async fn update_study_state(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(study_id): Path<String>,
    Query(query): Query<StudyStateQuery>,
) -> Result<Json<Value>, AppError> {
    let service = StudyService::new(&config);

    let study = service.update_state(&study_id, &query.estado).await?;

    Ok(Json(json!(study)))
}

#[axum::debug_handler]
pub async fn add_study_results(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(study_id): Path<String>,
    Query(query): Query<StudyResultsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = StudyService::new(&config);

    let study = service.add_results(&study_id, &query.resultados).await?;

    Ok(Json(json!(study)))
}

#[axum::debug_handler]
pub async fn delete_study(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(study_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = StudyService::new(&config);

    service.delete_study(&study_id).await?;

    Ok(Json(json!({
        "message": "Estudio marcado como cancelado correctamente"
    })))
}
