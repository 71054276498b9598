use std::sync::Arc;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use notification_cell::services::DispatchHandle;
use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    AppointmentListQuery, AttendanceQuery, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::AppointmentService;

#[axum::debug_handler]
pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointments = service.list_appointments(query).await?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointment = service.get_appointment(&appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_study_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(estudio_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointments = service.study_appointments(&estudio_id).await?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    dispatch: Option<Extension<DispatchHandle>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let (appointment, queued) = service.create_appointment(request).await?;

    if let Some(Extension(dispatch)) = dispatch {
        for notification_id in &queued {
            dispatch.nudge(notification_id);
        }
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointment = service.update_appointment(&appointment_id, request).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    service.cancel_appointment(&appointment_id).await?;

    Ok(Json(json!({
        "message": "Cita cancelada correctamente"
    })))
}

#[axum::debug_handler]
pub async fn update_attendance(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(appointment_id): Path<String>,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    service.update_attendance(&appointment_id, query.asistio).await?;

    Ok(Json(json!({
        "message": "Asistencia actualizada correctamente"
    })))
}
