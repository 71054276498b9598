use std::sync::Arc;

use axum::{
    routing::get,
    Json, Router,
};
use serde_json::json;

use appointment_cell::router::create_appointment_router;
use auth_cell::router::create_auth_router;
use dicom_cell::router::create_dicom_router;
use notification_cell::router::create_notification_router;
use patient_cell::router::create_patient_router;
use report_cell::router::create_report_router;
use shared_config::AppConfig;
use study_cell::router::create_study_router;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    // Every cell declares full paths, so one merge + one nest gives the
    // /api prefix to all of them.
    let api = Router::new()
        .merge(create_auth_router(state.clone()))
        .merge(create_patient_router(state.clone()))
        .merge(create_study_router(state.clone()))
        .merge(create_appointment_router(state.clone()))
        .merge(create_report_router(state.clone()))
        .merge(create_notification_router(state.clone()))
        .merge(create_dicom_router(state));

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .nest("/api", api)
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Sistema de Gestión de Imagenología Diagnóstica",
        "docs": "/api"
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
