use std::sync::Arc;
use axum::{middleware, routing::{get, put}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_appointment_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/citas", get(list_appointments).post(create_appointment))
        .route(
            "/citas/{id}",
            get(get_appointment).put(update_appointment).delete(cancel_appointment),
        )
        .route("/citas/{id}/asistencia", put(update_attendance))
        .route("/estudios/{id}/citas", get(get_study_appointments))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
