use std::sync::Arc;
use axum::{
    extract::{Extension, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::services::DicomService;

const UPLOAD_ROLES: [UserRole; 3] = [UserRole::Admin, UserRole::Tecnico, UserRole::Radiologo];
const VIEW_ROLES: [UserRole; 4] = [
    UserRole::Admin,
    UserRole::Tecnico,
    UserRole::Radiologo,
    UserRole::Paciente,
];

#[axum::debug_handler]
pub async fn upload_dicom_files(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(estudio_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &UPLOAD_ROLES)?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Carga multipart inválida: {}", e)))?
    {
        let original_name = field
            .file_name()
            .unwrap_or("archivo.dcm")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Carga multipart inválida: {}", e)))?;

        files.push((original_name, bytes.to_vec()));
    }

    let service = DicomService::new(&config);
    let receipt = service.upload_files(&estudio_id, &user, files).await?;

    Ok(Json(json!(receipt)))
}

#[axum::debug_handler]
pub async fn get_study_files(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(estudio_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &VIEW_ROLES)?;

    let service = DicomService::new(&config);
    let files = service.study_files(&estudio_id, &user).await?;

    Ok(Json(files))
}

#[axum::debug_handler]
pub async fn get_preview(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path((estudio_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    require_role(&user, &VIEW_ROLES)?;

    let service = DicomService::new(&config);
    let path = service.stored_file_path(&estudio_id, &filename, &user).await?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

#[axum::debug_handler]
pub async fn download_dicom_file(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path((estudio_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    require_role(&user, &UPLOAD_ROLES)?;

    let service = DicomService::new(&config);
    let path = service.stored_file_path(&estudio_id, &filename, &user).await?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let disposition = format!("attachment; filename={}", filename);
    Ok((
        [
            (header::CONTENT_TYPE, "application/dicom".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[axum::debug_handler]
pub async fn get_patients_with_studies(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &UPLOAD_ROLES)?;

    let service = DicomService::new(&config);
    let patients = service.patients_with_studies().await?;

    Ok(Json(json!(patients)))
}

#[axum::debug_handler]
pub async fn get_studies_by_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(paciente_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &UPLOAD_ROLES)?;

    let service = DicomService::new(&config);
    let studies = service.studies_by_patient(&paciente_id).await?;

    Ok(Json(studies))
}
