use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::error::AppError;

/// Metadata for one stored DICOM file, embedded in the study's
/// `archivos_dicom` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DicomFileRecord {
    pub original_name: String,
    pub saved_name: String,
    pub preview_name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub paciente_id: String,
}

/// What the upload endpoint returns to the caller.
#[derive(Debug, Serialize)]
pub struct UploadReceipt {
    pub message: String,
    pub files: Vec<DicomFileRecord>,
    pub paciente: Value,
    pub imagenes_anexadas_a_informe: usize,
}

#[derive(Error, Debug)]
pub enum DicomError {
    #[error("Estudio no encontrado")]
    StudyNotFound,

    #[error("ID de estudio inválido")]
    InvalidStudyId,

    #[error("Paciente no encontrado")]
    PatientNotFound,

    #[error("ID de paciente inválido")]
    InvalidPatientId,

    #[error("Estudio no tiene paciente asignado")]
    StudyWithoutPatient,

    #[error("Archivo no encontrado")]
    FileNotFound,

    #[error("Nombre de archivo inválido")]
    InvalidFilename,

    #[error("No tiene permiso para acceder a este estudio")]
    NotOwner,

    #[error("Error de almacenamiento: {0}")]
    Storage(String),

    #[error("Error de base de datos: {0}")]
    Database(String),
}

impl From<DicomError> for AppError {
    fn from(err: DicomError) -> Self {
        let message = err.to_string();
        match err {
            DicomError::StudyNotFound
            | DicomError::PatientNotFound
            | DicomError::FileNotFound => AppError::NotFound(message),
            DicomError::InvalidStudyId
            | DicomError::InvalidPatientId
            | DicomError::StudyWithoutPatient
            | DicomError::InvalidFilename => AppError::BadRequest(message),
            DicomError::NotOwner => AppError::Forbidden(message),
            DicomError::Storage(msg) | DicomError::Database(msg) => AppError::Internal(msg),
        }
    }
}
