use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_notification_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/notificaciones", get(list_notifications).post(create_notification))
        .route(
            "/notificaciones/{id}",
            get(get_notification).delete(delete_notification),
        )
        .route("/notificaciones/{id}/reenviar", post(resend_notification))
        .route("/pacientes/{id}/notificaciones", get(patient_notifications))
        .route("/estudios/{id}/notificaciones/estado", post(notify_study_state))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
