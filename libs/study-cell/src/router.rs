use std::sync::Arc;
use axum::{middleware, routing::{get, put}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_study_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/estudios", get(list_studies).post(create_study))
        .route(
            "/estudios/{id}",
            get(get_study).put(update_study).delete(delete_study),
        )
        .route("/estudios/{id}/estado", put(update_study_state))
        .route("/estudios/{id}/resultados", put(add_study_results))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
