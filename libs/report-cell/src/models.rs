use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

/// Reference to one DICOM image attached to a report.
///
/// The files themselves live under the study's upload directory; the
/// report only keeps the filename pair plus display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DicomImageRef {
    pub archivo_dicom: String,
    pub archivo_png: String,
    pub estudio_id: String,
    pub descripcion: Option<String>,
    #[serde(default)]
    pub orden: u32,
}

/// Radiology report as stored in the `informes` collection.
///
/// The paciente_* and estudio_* fields are denormalized at creation time
/// so the report can be rendered without extra lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub estudio_id: String,
    pub medico_radiologo: String,
    pub fecha_informe: String,
    pub hallazgos: String,
    pub impresion_diagnostica: String,
    pub recomendaciones: Option<String>,
    #[serde(default = "default_estado")]
    pub estado: String,
    pub tecnica_utilizada: Option<String>,
    #[serde(default = "default_calidad")]
    pub calidad_estudio: String,
    #[serde(default)]
    pub urgente: bool,
    #[serde(default)]
    pub validado: bool,
    pub observaciones_tecnicas: Option<String>,
    #[serde(default)]
    pub imagenes_dicom: Vec<DicomImageRef>,
    #[serde(default)]
    pub firmado: bool,
    pub fecha_firma: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_apellidos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_cedula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estudio_tipo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estudio_fecha: Option<String>,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
}

fn default_estado() -> String {
    "Borrador".to_string()
}

fn default_calidad() -> String {
    "Buena".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub estudio_id: String,
    pub medico_radiologo: String,
    pub fecha_informe: String,
    pub hallazgos: String,
    pub impresion_diagnostica: String,
    pub recomendaciones: Option<String>,
    #[serde(default = "default_estado")]
    pub estado: String,
    pub tecnica_utilizada: Option<String>,
    #[serde(default = "default_calidad")]
    pub calidad_estudio: String,
    #[serde(default)]
    pub urgente: bool,
    #[serde(default)]
    pub validado: bool,
    pub observaciones_tecnicas: Option<String>,
    #[serde(default)]
    pub imagenes_dicom: Vec<DicomImageRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateReportRequest {
    pub medico_radiologo: Option<String>,
    pub fecha_informe: Option<String>,
    pub hallazgos: Option<String>,
    pub impresion_diagnostica: Option<String>,
    pub recomendaciones: Option<String>,
    pub estado: Option<String>,
    pub tecnica_utilizada: Option<String>,
    pub calidad_estudio: Option<String>,
    pub urgente: Option<bool>,
    pub validado: Option<bool>,
    pub observaciones_tecnicas: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub estudio_id: Option<String>,
    pub paciente_id: Option<String>,
    pub estado: Option<String>,
    pub urgente: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub inicio: String,
    pub fin: String,
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Informe no encontrado")]
    NotFound,

    #[error("ID de informe inválido")]
    InvalidId,

    #[error("Estudio no encontrado")]
    StudyNotFound,

    #[error("ID de estudio inválido")]
    InvalidStudyId,

    #[error("El informe ya fue firmado")]
    AlreadySigned,

    #[error("No se proporcionaron datos para actualizar")]
    EmptyUpdate,

    #[error("Formato de fecha inválido. Use YYYY-MM-DD")]
    InvalidDateRange,

    #[error("Error de base de datos: {0}")]
    Database(String),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        let message = err.to_string();
        match err {
            ReportError::NotFound | ReportError::StudyNotFound => AppError::NotFound(message),
            ReportError::InvalidId
            | ReportError::InvalidStudyId
            | ReportError::EmptyUpdate
            | ReportError::InvalidDateRange => AppError::BadRequest(message),
            ReportError::AlreadySigned => AppError::Conflict(message),
            ReportError::Database(msg) => AppError::Database(msg),
        }
    }
}
