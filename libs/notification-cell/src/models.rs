use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Email,
    Sms,
    Push,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Email => "email",
            NotificationType::Sms => "sms",
            NotificationType::Push => "push",
        }
    }
}

/// Outbox row in the `notificaciones` collection. Delivery is recorded
/// on the row itself so failed sends can be retried later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub paciente_id: String,
    pub tipo: NotificationType,
    pub mensaje: String,
    pub estudio_id: Option<String>,
    pub titulo: Option<String>,
    #[serde(default = "default_prioridad")]
    pub prioridad: String,
    pub enviada: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_envio: Option<DateTime<Utc>>,
    #[serde(default)]
    pub intentos_envio: u32,
    pub ultimo_intento: Option<DateTime<Utc>>,
}

fn default_prioridad() -> String {
    "normal".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotificationRequest {
    pub paciente_id: String,
    pub tipo: NotificationType,
    pub mensaje: String,
    pub estudio_id: Option<String>,
    pub titulo: Option<String>,
    #[serde(default = "default_prioridad")]
    pub prioridad: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub enviada: Option<bool>,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notificación no encontrada")]
    NotFound,

    #[error("ID de notificación inválido")]
    InvalidId,

    #[error("Paciente no encontrado")]
    PatientNotFound,

    #[error("Estudio no encontrado")]
    StudyNotFound,

    #[error("ID de paciente o estudio inválido")]
    InvalidReference,

    #[error("La notificación ya fue enviada exitosamente")]
    AlreadySent,

    #[error("Error de base de datos: {0}")]
    Database(String),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        let message = err.to_string();
        match err {
            NotificationError::NotFound
            | NotificationError::PatientNotFound
            | NotificationError::StudyNotFound => AppError::NotFound(message),
            NotificationError::InvalidId | NotificationError::InvalidReference => {
                AppError::BadRequest(message)
            }
            NotificationError::AlreadySent => AppError::Conflict(message),
            NotificationError::Database(msg) => AppError::Database(msg),
        }
    }
}
