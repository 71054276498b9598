use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_patient_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/pacientes", get(list_patients).post(create_patient))
        .route(
            "/pacientes/{id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/pacientes/{id}/estudios", get(get_patient_studies))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
