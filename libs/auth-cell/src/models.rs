use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::UserRole;
use shared_models::error::AppError;

/// Account as returned by the API. The stored document also carries a
/// `password_hash` field that never leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub nombre: String,
    pub apellidos: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub paciente_id: Option<String>,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub nombre: String,
    pub apellidos: Option<String>,
    pub role: UserRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub password: String,
    pub paciente_id: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("El usuario con este email ya existe")]
    EmailTaken,

    #[error("Email o contraseña incorrectos")]
    InvalidCredentials,

    #[error("Cuenta desactivada")]
    AccountDisabled,

    #[error("Usuario no encontrado")]
    UserNotFound,

    #[error("Error al procesar la contraseña: {0}")]
    Hash(String),

    #[error("Error al emitir el token: {0}")]
    Token(String),

    #[error("Error de base de datos: {0}")]
    Database(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::EmailTaken => AppError::Conflict(message),
            AuthError::InvalidCredentials | AuthError::AccountDisabled => AppError::Auth(message),
            AuthError::UserNotFound => AppError::NotFound(message),
            AuthError::Hash(msg) | AuthError::Token(msg) => AppError::Internal(msg),
            AuthError::Database(msg) => AppError::Database(msg),
        }
    }
}
