use std::sync::Arc;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, PatientListQuery, UpdatePatientRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patients = service.list_patients(query).await?;

    Ok(Json(json!(patients)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service.get_patient(&patient_id).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service.create_patient(request).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service.update_patient(&patient_id, request).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    service.delete_patient(&patient_id).await?;

    Ok(Json(json!({
        "message": "Paciente marcado como inactivo correctamente"
    })))
}

#[axum::debug_handler]
pub async fn get_patient_studies(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let (patient, studies) = service.get_patient_studies(&patient_id).await?;

    Ok(Json(json!({
        "paciente": patient,
        "estudios": studies,
    })))
}
