use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

/// Patient record as stored in the `pacientes` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub nombre: String,
    pub apellidos: Option<String>,
    pub identificacion: String,
    pub email: String,
    pub telefono: String,
    pub fecha_nacimiento: DateTime<Utc>,
    pub direccion: Option<String>,
    pub genero: Option<String>,
    pub grupo_sanguineo: Option<String>,
    pub alergias: Option<String>,
    pub condiciones_cronicas: Option<String>,
    pub medicamentos: Option<String>,
    #[serde(default = "default_estado")]
    pub estado: String,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
}

// Records written before soft deletes existed have no estado field.
fn default_estado() -> String {
    "activo".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub nombre: String,
    pub apellidos: Option<String>,
    pub identificacion: String,
    pub email: String,
    pub telefono: String,
    pub fecha_nacimiento: DateTime<Utc>,
    pub direccion: Option<String>,
    pub genero: Option<String>,
    pub grupo_sanguineo: Option<String>,
    pub alergias: Option<String>,
    pub condiciones_cronicas: Option<String>,
    pub medicamentos: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub nombre: Option<String>,
    pub apellidos: Option<String>,
    pub identificacion: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub genero: Option<String>,
    pub grupo_sanguineo: Option<String>,
    pub alergias: Option<String>,
    pub condiciones_cronicas: Option<String>,
    pub medicamentos: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatientListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Paciente no encontrado")]
    NotFound,

    #[error("ID de paciente inválido")]
    InvalidId,

    #[error("Ya existe un paciente con esa identificación")]
    DuplicateIdentification,

    #[error("Ya existe un paciente con ese email")]
    DuplicateEmail,

    #[error("No se proporcionaron datos para actualizar")]
    EmptyUpdate,

    #[error("No se puede eliminar el paciente porque tiene estudios activos")]
    ActiveStudies,

    #[error("Error de base de datos: {0}")]
    Database(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        let message = err.to_string();
        match err {
            PatientError::NotFound => AppError::NotFound(message),
            PatientError::InvalidId | PatientError::EmptyUpdate => AppError::BadRequest(message),
            PatientError::DuplicateIdentification
            | PatientError::DuplicateEmail
            | PatientError::ActiveStudies => AppError::Conflict(message),
            PatientError::Database(msg) => AppError::Database(msg),
        }
    }
}
