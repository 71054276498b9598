use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

/// Upload size ceiling per request. Imaging series can be large.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn create_dicom_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/dicom/upload/{estudio_id}", post(upload_dicom_files))
        .route("/dicom/study/{estudio_id}", get(get_study_files))
        .route("/dicom/preview/{estudio_id}/{filename}", get(get_preview))
        .route("/dicom/download/{estudio_id}/{filename}", get(download_dicom_file))
        .route("/dicom/pacientes-con-estudios", get(get_patients_with_studies))
        .route("/dicom/estudios-por-paciente/{paciente_id}", get(get_studies_by_patient))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
