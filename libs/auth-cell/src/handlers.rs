use std::sync::Arc;
use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{LoginRequest, RegisterRequest};
use crate::services::UserService;

#[axum::debug_handler]
pub async fn register_user(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&config);

    let user = service.register(request).await?;

    Ok(Json(json!(user)))
}

#[axum::debug_handler]
pub async fn register_patient(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&config);

    let token = service.register_patient(request).await?;

    Ok(Json(json!(token)))
}

#[axum::debug_handler]
pub async fn login_user(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&config);

    let token = service.login(request).await?;

    Ok(Json(json!(token)))
}

#[axum::debug_handler]
pub async fn get_me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&config);

    let account = service.get_user(&user.id).await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn list_users(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Admin])?;

    let service = UserService::new(&config);

    let users = service.list_users().await?;

    Ok(Json(json!(users)))
}
