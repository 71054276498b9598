use std::sync::Arc;
use axum::{middleware, routing::{get, post, put}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_report_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/informes", get(list_reports).post(create_report))
        .route("/informes/estadisticas", get(get_statistics))
        .route("/informes/rendimiento", get(get_performance))
        .route(
            "/informes/{id}",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/informes/{id}/firmar", put(sign_report))
        .route("/informes/{id}/sincronizar-imagenes", post(sync_report_images))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
