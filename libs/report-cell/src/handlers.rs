use std::sync::Arc;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreateReportRequest, ReportListQuery, StatsQuery, UpdateReportRequest};
use crate::services::ReportService;

#[axum::debug_handler]
pub async fn list_reports(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let reports = service.list_reports(query).await?;

    Ok(Json(json!(reports)))
}

#[axum::debug_handler]
pub async fn get_report(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(report_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let report = service.get_report(&report_id).await?;

    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn create_report(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Json(request): Json<CreateReportRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let report = service.create_report(request).await?;

    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn update_report(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(report_id): Path<String>,
    Json(request): Json<UpdateReportRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let report = service.update_report(&report_id, request).await?;

    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn sign_report(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(report_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let report = service.sign_report(&report_id).await?;

    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn delete_report(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(report_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    service.delete_report(&report_id).await?;

    Ok(Json(json!({
        "message": "Informe eliminado correctamente"
    })))
}

#[axum::debug_handler]
pub async fn sync_report_images(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(report_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let (report, count) = service.sync_images(&report_id).await?;

    Ok(Json(json!({
        "message": "Imágenes sincronizadas correctamente",
        "imagenes_sincronizadas": count,
        "informe": report,
    })))
}

#[axum::debug_handler]
pub async fn get_statistics(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let statistics = service.statistics(query).await?;

    Ok(Json(statistics))
}

#[axum::debug_handler]
pub async fn get_performance(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&config);

    let performance = service.performance(query).await?;

    Ok(Json(performance))
}
