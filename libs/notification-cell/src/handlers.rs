use std::sync::Arc;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreateNotificationRequest, NotificationListQuery};
use crate::services::{DispatchHandle, NotificationService};

#[axum::debug_handler]
pub async fn create_notification(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    dispatch: Option<Extension<DispatchHandle>>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let notification = service.create_notification(request).await?;

    if let Some(Extension(dispatch)) = dispatch {
        dispatch.nudge(&notification.id);
    }

    Ok(Json(json!(notification)))
}

#[axum::debug_handler]
pub async fn list_notifications(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let notifications = service.list_notifications(query).await?;

    Ok(Json(json!(notifications)))
}

#[axum::debug_handler]
pub async fn get_notification(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let notification = service.get_notification(&notification_id).await?;

    Ok(Json(json!(notification)))
}

#[axum::debug_handler]
pub async fn patient_notifications(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(paciente_id): Path<String>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let notifications = service.patient_notifications(&paciente_id, query).await?;

    Ok(Json(json!(notifications)))
}

#[axum::debug_handler]
pub async fn notify_study_state(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    dispatch: Option<Extension<DispatchHandle>>,
    Path(estudio_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    match service.notify_study_state(&estudio_id).await? {
        Some(notifications) => {
            if let Some(Extension(dispatch)) = dispatch {
                for notification in &notifications {
                    dispatch.nudge(&notification.id);
                }
            }
            Ok(Json(json!({ "message": "Notificaciones programadas" })))
        }
        None => Ok(Json(json!({
            "message": "No se requiere notificación para este estado"
        }))),
    }
}

#[axum::debug_handler]
pub async fn resend_notification(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    dispatch: Option<Extension<DispatchHandle>>,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let notification = service.prepare_resend(&notification_id).await?;

    if let Some(Extension(dispatch)) = dispatch {
        dispatch.nudge(&notification.id);
    }

    Ok(Json(json!({
        "message": "Notificación programada para reenvío"
    })))
}

#[axum::debug_handler]
pub async fn delete_notification(
    State(config): State<Arc<AppConfig>>,
    Extension(_user): Extension<AuthUser>,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    service.delete_notification(&notification_id).await?;

    Ok(Json(json!({
        "message": "Notificación eliminada correctamente"
    })))
}
