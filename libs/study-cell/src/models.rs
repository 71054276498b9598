use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::error::AppError;

/// Lifecycle of an imaging study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyState {
    Pendiente,
    Programado,
    EnProceso,
    Completado,
    Cancelado,
}

impl StudyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyState::Pendiente => "pendiente",
            StudyState::Programado => "programado",
            StudyState::EnProceso => "en_proceso",
            StudyState::Completado => "completado",
            StudyState::Cancelado => "cancelado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pendiente" => Some(StudyState::Pendiente),
            "programado" => Some(StudyState::Programado),
            "en_proceso" => Some(StudyState::EnProceso),
            "completado" => Some(StudyState::Completado),
            "cancelado" => Some(StudyState::Cancelado),
            _ => None,
        }
    }
}

/// Imaging study as stored in the `estudios` collection.
///
/// The paciente_* fields are denormalized from the patient record when
/// studies are read, so list views do not need a second request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub id: String,
    pub paciente_id: String,
    pub tipo_estudio: String,
    pub medico_solicitante: String,
    #[serde(default = "default_prioridad")]
    pub prioridad: String,
    pub indicaciones: Option<String>,
    pub sala: Option<String>,
    pub tecnico_asignado: Option<String>,
    pub estado: StudyState,
    pub fecha_solicitud: DateTime<Utc>,
    pub fecha_programada: Option<DateTime<Utc>>,
    pub fecha_realizacion: Option<DateTime<Utc>>,
    pub resultados: Option<String>,
    #[serde(default)]
    pub archivos_dicom: Vec<Value>,
    pub fecha_actualizacion: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_apellidos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_cedula: Option<String>,
}

fn default_prioridad() -> String {
    "normal".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateStudyRequest {
    pub paciente_id: String,
    pub tipo_estudio: String,
    pub medico_solicitante: String,
    #[serde(default = "default_prioridad")]
    pub prioridad: String,
    pub indicaciones: Option<String>,
    pub sala: Option<String>,
    pub tecnico_asignado: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateStudyRequest {
    pub estado: Option<StudyState>,
    pub resultados: Option<String>,
    pub sala: Option<String>,
    pub tecnico_asignado: Option<String>,
    pub indicaciones: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudyListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub estado: Option<String>,
    pub tipo_estudio: Option<String>,
    pub paciente_id: Option<String>,
    pub medico_solicitante: Option<String>,
    pub prioridad: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StudyStateQuery {
    pub estado: String,
}

#[derive(Debug, Deserialize)]
pub struct StudyResultsQuery {
    pub resultados: String,
}

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Estudio no encontrado")]
    NotFound,

    #[error("ID de estudio inválido")]
    InvalidId,

    #[error("Paciente no encontrado")]
    PatientNotFound,

    #[error("ID de paciente inválido")]
    InvalidPatientId,

    #[error("Estado inválido: {0}")]
    InvalidState(String),

    #[error("No se proporcionaron datos para actualizar")]
    EmptyUpdate,

    #[error("No se puede eliminar el estudio porque tiene citas programadas")]
    ActiveAppointments,

    #[error("Error de base de datos: {0}")]
    Database(String),
}

impl From<StudyError> for AppError {
    fn from(err: StudyError) -> Self {
        let message = err.to_string();
        match err {
            StudyError::NotFound | StudyError::PatientNotFound => AppError::NotFound(message),
            StudyError::InvalidId
            | StudyError::InvalidPatientId
            | StudyError::InvalidState(_)
            | StudyError::EmptyUpdate => AppError::BadRequest(message),
            StudyError::ActiveAppointments => AppError::Conflict(message),
            StudyError::Database(msg) => AppError::Database(msg),
        }
    }
}
