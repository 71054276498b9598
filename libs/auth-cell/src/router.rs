use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_auth_router(config: Arc<AppConfig>) -> Router {
    let public = Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/register-patient", post(register_patient))
        .route("/auth/login", post(login_user))
        .with_state(config.clone());

    let protected = Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/users", get(list_users))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config);

    public.merge(protected)
}
