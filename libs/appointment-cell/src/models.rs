use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

/// Lifecycle of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentState {
    Programada,
    EnProceso,
    Completada,
    Cancelada,
    NoAsistio,
}

impl AppointmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentState::Programada => "programada",
            AppointmentState::EnProceso => "en_proceso",
            AppointmentState::Completada => "completada",
            AppointmentState::Cancelada => "cancelada",
            AppointmentState::NoAsistio => "no_asistio",
        }
    }

    /// Parse a client-supplied state. Accepts display spellings such as
    /// "En Proceso" or "No Asistió" and normalizes them.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value
            .to_lowercase()
            .replace(' ', "_")
            .replace('ó', "o");

        match normalized.as_str() {
            "programada" => Some(AppointmentState::Programada),
            "en_proceso" => Some(AppointmentState::EnProceso),
            "completada" => Some(AppointmentState::Completada),
            "cancelada" => Some(AppointmentState::Cancelada),
            "no_asistio" => Some(AppointmentState::NoAsistio),
            _ => None,
        }
    }
}

/// Appointment as stored in the `citas` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub paciente_id: String,
    pub fecha_cita: DateTime<Utc>,
    pub tipo_estudio: String,
    #[serde(default = "default_tipo_cita")]
    pub tipo_cita: String,
    pub observaciones: Option<String>,
    pub estado: AppointmentState,
    pub estudio_id: Option<String>,
    pub tecnico_asignado: Option<String>,
    pub sala: Option<String>,
    #[serde(default = "default_duracion")]
    pub duracion_minutos: u32,
    pub asistio: Option<bool>,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_apellidos: Option<String>,
}

fn default_tipo_cita() -> String {
    "Consulta General".to_string()
}

fn default_duracion() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub paciente_id: String,
    pub fecha_cita: DateTime<Utc>,
    pub tipo_estudio: String,
    #[serde(default = "default_tipo_cita")]
    pub tipo_cita: String,
    pub observaciones: Option<String>,
    pub estudio_id: Option<String>,
    pub tecnico_asignado: Option<String>,
    pub sala: Option<String>,
    #[serde(default = "default_duracion")]
    pub duracion_minutos: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub fecha_cita: Option<DateTime<Utc>>,
    pub tipo_estudio: Option<String>,
    pub tipo_cita: Option<String>,
    pub observaciones: Option<String>,
    pub estado: Option<String>,
    pub tecnico_asignado: Option<String>,
    pub sala: Option<String>,
    pub duracion_minutos: Option<u32>,
    pub asistio: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub fecha: Option<String>,
    pub estado: Option<String>,
    pub tipo_estudio: Option<String>,
    pub tipo_cita: Option<String>,
    pub paciente_nombre: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub asistio: bool,
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Cita no encontrada")]
    NotFound,

    #[error("ID de cita inválido")]
    InvalidId,

    #[error("Paciente no encontrado")]
    PatientNotFound,

    #[error("ID de paciente inválido")]
    InvalidPatientId,

    #[error("Estudio no encontrado")]
    StudyNotFound,

    #[error("ID de estudio inválido")]
    InvalidStudyId,

    #[error("Formato de fecha inválido. Use YYYY-MM-DD")]
    InvalidDateFilter,

    #[error("Estado inválido: {0}")]
    InvalidState(String),

    #[error("No se proporcionaron datos para actualizar")]
    EmptyUpdate,

    #[error("Conflicto de horario: sala o técnico no disponible")]
    ScheduleConflict,

    #[error("No se puede cancelar una cita ya cancelada o completada")]
    AlreadyClosed,

    #[error("Solo se puede actualizar asistencia de citas programadas o completadas")]
    AttendanceNotAllowed,

    #[error("Error de base de datos: {0}")]
    Database(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::StudyNotFound => AppError::NotFound(message),
            AppointmentError::InvalidId
            | AppointmentError::InvalidPatientId
            | AppointmentError::InvalidStudyId
            | AppointmentError::InvalidDateFilter
            | AppointmentError::InvalidState(_)
            | AppointmentError::EmptyUpdate
            | AppointmentError::AlreadyClosed
            | AppointmentError::AttendanceNotAllowed => AppError::BadRequest(message),
            AppointmentError::ScheduleConflict => AppError::Conflict(message),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}
