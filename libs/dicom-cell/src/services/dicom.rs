use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::documents::{new_document_id, valid_document_id};
use shared_database::store::StoreClient;
use shared_models::auth::{AuthUser, UserRole};

use crate::models::{DicomError, DicomFileRecord, UploadReceipt};
use crate::services::preview::render_preview;

const STUDIES: &str = "estudios";
const PATIENTS: &str = "pacientes";
const REPORTS: &str = "informes";

pub struct DicomService {
    store: StoreClient,
    upload_dir: PathBuf,
}

impl DicomService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            upload_dir: PathBuf::from(&config.dicom_upload_dir),
        }
    }

    /// Store uploaded DICOM files for a study, generate previews, and link
    /// the results into the study document and its report.
    ///
    /// The three writes (file system, study, report) are not transactional;
    /// the report sync endpoint repairs drift after a partial failure.
    /// Files that fail to decode are logged and skipped; they never fail
    /// the request.
    pub async fn upload_files(
        &self,
        estudio_id: &str,
        uploader: &AuthUser,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<UploadReceipt, DicomError> {
        if !valid_document_id(estudio_id) {
            return Err(DicomError::InvalidStudyId);
        }

        let study = self.store
            .find_one(STUDIES, json!({ "_id": estudio_id }))
            .await
            .map_err(db_error)?
            .ok_or(DicomError::StudyNotFound)?;

        let paciente_id = study
            .get("paciente_id")
            .and_then(Value::as_str)
            .ok_or(DicomError::StudyWithoutPatient)?
            .to_string();

        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": paciente_id }))
            .await
            .map_err(db_error)?
            .ok_or(DicomError::PatientNotFound)?;

        let study_dir = self.upload_dir.join(estudio_id);
        tokio::fs::create_dir_all(&study_dir)
            .await
            .map_err(storage_error)?;

        let tipo_estudio = study
            .get("tipo_estudio")
            .and_then(Value::as_str)
            .unwrap_or("estudio")
            .to_string();

        let mut records: Vec<DicomFileRecord> = Vec::new();
        let mut image_refs: Vec<Value> = Vec::new();

        for (original_name, bytes) in files {
            let saved_name = format!("{}.dcm", Uuid::new_v4());
            let file_path = study_dir.join(&saved_name);

            tokio::fs::write(&file_path, &bytes)
                .await
                .map_err(storage_error)?;

            let preview_name = saved_name.replace(".dcm", ".png");
            let preview_path = study_dir.join(&preview_name);

            match render_preview(&file_path) {
                Ok(png) => {
                    tokio::fs::write(&preview_path, &png)
                        .await
                        .map_err(storage_error)?;
                }
                Err(err) => {
                    error!("Failed to decode DICOM file {}: {}", original_name, err);
                    continue;
                }
            }

            image_refs.push(json!({
                "archivo_dicom": saved_name,
                "archivo_png": preview_name,
                "estudio_id": estudio_id,
                "descripcion": format!("Imagen de {}", tipo_estudio),
                "orden": image_refs.len(),
            }));

            records.push(DicomFileRecord {
                original_name,
                saved_name,
                preview_name,
                size: bytes.len() as u64,
                uploaded_at: Utc::now(),
                uploaded_by: uploader.email.clone(),
                paciente_id: paciente_id.clone(),
            });
        }

        if !records.is_empty() {
            self.attach_to_study(estudio_id, &records).await?;
            self.attach_to_report(estudio_id, &paciente_id, &study, &patient, uploader, &image_refs)
                .await?;
        }

        let nombre = patient.get("nombre").and_then(Value::as_str).unwrap_or_default();
        let apellidos = patient.get("apellidos").and_then(Value::as_str).unwrap_or_default();

        Ok(UploadReceipt {
            message: format!(
                "{} archivos DICOM subidos exitosamente para el paciente {} {}",
                records.len(),
                nombre,
                apellidos,
            ),
            imagenes_anexadas_a_informe: image_refs.len(),
            paciente: json!({
                "id": paciente_id,
                "nombre": patient.get("nombre"),
                "apellidos": patient.get("apellidos"),
                "identificacion": patient.get("identificacion"),
            }),
            files: records,
        })
    }

    async fn attach_to_study(
        &self,
        estudio_id: &str,
        records: &[DicomFileRecord],
    ) -> Result<(), DicomError> {
        self.store
            .update_one(
                STUDIES,
                json!({ "_id": estudio_id }),
                json!({
                    "$push": { "archivos_dicom": { "$each": records } },
                    "$set": {
                        "estado": "completado",
                        "fecha_actualizacion": Utc::now().to_rfc3339(),
                    },
                }),
            )
            .await
            .map_err(db_error)?;

        Ok(())
    }

    /// Append the new image references to the study's report, creating a
    /// draft report when none exists yet.
    async fn attach_to_report(
        &self,
        estudio_id: &str,
        paciente_id: &str,
        study: &Value,
        patient: &Value,
        uploader: &AuthUser,
        image_refs: &[Value],
    ) -> Result<(), DicomError> {
        let existing = self.store
            .find_one(REPORTS, json!({ "estudio_id": estudio_id }))
            .await
            .map_err(db_error)?;

        match existing {
            Some(report) => {
                let report_id = report.get("_id").and_then(Value::as_str).unwrap_or_default();
                self.store
                    .update_one(
                        REPORTS,
                        json!({ "estudio_id": estudio_id }),
                        json!({
                            "$push": { "imagenes_dicom": { "$each": image_refs } },
                            "$set": { "fecha_actualizacion": Utc::now().to_rfc3339() },
                        }),
                    )
                    .await
                    .map_err(db_error)?;
                info!("Attached {} images to report {}", image_refs.len(), report_id);
            }
            None => {
                let medico_radiologo = if uploader.role == UserRole::Radiologo {
                    uploader.email.clone()
                } else {
                    "Por asignar".to_string()
                };

                let now = Utc::now().to_rfc3339();
                let report_id = new_document_id();
                let draft = json!({
                    "_id": report_id,
                    "estudio_id": estudio_id,
                    "paciente_id": paciente_id,
                    "medico_radiologo": medico_radiologo,
                    "fecha_informe": now,
                    "hallazgos": "Pendiente de análisis",
                    "impresion_diagnostica": "Pendiente de análisis",
                    "estado": "Borrador",
                    "imagenes_dicom": image_refs,
                    "firmado": false,
                    "urgente": false,
                    "validado": false,
                    "paciente_nombre": patient.get("nombre"),
                    "paciente_apellidos": patient.get("apellidos"),
                    "paciente_cedula": patient.get("identificacion"),
                    "estudio_tipo": study.get("tipo_estudio"),
                    "estudio_fecha": study.get("fecha_solicitud"),
                    "fecha_creacion": now,
                    "fecha_actualizacion": now,
                });

                self.store
                    .insert_one(REPORTS, draft)
                    .await
                    .map_err(db_error)?;
                info!("Created draft report {} for study {}", report_id, estudio_id);
            }
        }

        Ok(())
    }

    /// File list of a study. Patients can only see their own studies.
    pub async fn study_files(
        &self,
        estudio_id: &str,
        user: &AuthUser,
    ) -> Result<Value, DicomError> {
        let study = self.find_owned_study(estudio_id, user).await?;

        let archivos = study
            .get("archivos_dicom")
            .cloned()
            .unwrap_or_else(|| json!([]));

        Ok(json!({
            "estudio_id": estudio_id,
            "archivos": archivos,
        }))
    }

    /// Resolve the on-disk path of a stored file after the ownership check.
    pub async fn stored_file_path(
        &self,
        estudio_id: &str,
        filename: &str,
        user: &AuthUser,
    ) -> Result<PathBuf, DicomError> {
        if !safe_filename(filename) {
            return Err(DicomError::InvalidFilename);
        }

        self.find_owned_study(estudio_id, user).await?;

        let path = self.upload_dir.join(estudio_id).join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(DicomError::FileNotFound),
        }
    }

    /// Worklist helper: all patients that have at least one study, with a
    /// study count, sorted by name.
    pub async fn patients_with_studies(&self) -> Result<Vec<Value>, DicomError> {
        let counts = self.store
            .aggregate(STUDIES, json!([
                { "$group": { "_id": "$paciente_id", "total": { "$sum": 1 } } },
            ]))
            .await
            .map_err(db_error)?;

        let patient_ids: Vec<&str> = counts
            .iter()
            .filter_map(|doc| doc.get("_id").and_then(Value::as_str))
            .collect();

        if patient_ids.is_empty() {
            return Ok(vec![]);
        }

        let patients = self.store
            .find(
                PATIENTS,
                json!({ "_id": { "$in": patient_ids } }),
                Some(json!({ "nombre": 1 })),
                0,
                patient_ids.len() as u64,
            )
            .await
            .map_err(db_error)?;

        let mut rows = Vec::with_capacity(patients.len());
        for patient in patients {
            let id = patient.get("_id").and_then(Value::as_str).unwrap_or_default();
            let count = counts
                .iter()
                .find(|doc| doc.get("_id").and_then(Value::as_str) == Some(id))
                .and_then(|doc| doc.get("total"))
                .and_then(Value::as_u64)
                .unwrap_or(0);

            rows.push(json!({
                "id": id,
                "nombre": patient.get("nombre"),
                "apellidos": patient.get("apellidos").cloned().unwrap_or(json!("")),
                "identificacion": patient.get("identificacion"),
                "estudios_pendientes": count,
            }));
        }

        Ok(rows)
    }

    /// Worklist helper: one patient and all their studies, shaped for the
    /// upload UI.
    pub async fn studies_by_patient(&self, paciente_id: &str) -> Result<Value, DicomError> {
        if !valid_document_id(paciente_id) {
            return Err(DicomError::InvalidPatientId);
        }

        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": paciente_id }))
            .await
            .map_err(db_error)?
            .ok_or(DicomError::PatientNotFound)?;

        let studies = self.store
            .find(
                STUDIES,
                json!({ "paciente_id": paciente_id }),
                Some(json!({ "fecha_solicitud": -1 })),
                0,
                1000,
            )
            .await
            .map_err(db_error)?;

        let formatted: Vec<Value> = studies
            .iter()
            .map(|study| json!({
                "id": study.get("_id"),
                "tipo_estudio": study.get("tipo_estudio"),
                "estado": study.get("estado"),
                "fecha_solicitud": study.get("fecha_solicitud"),
                "fecha_programada": study.get("fecha_programada").cloned().unwrap_or(Value::Null),
                "prioridad": study.get("prioridad").cloned().unwrap_or(json!("normal")),
                "indicaciones": study.get("indicaciones").cloned().unwrap_or(Value::Null),
                "paciente_id": paciente_id,
                "paciente_nombre": patient.get("nombre"),
                "paciente_apellidos": patient.get("apellidos").cloned().unwrap_or(json!("")),
                "paciente_cedula": patient.get("identificacion"),
            }))
            .collect();

        Ok(json!({
            "paciente": {
                "id": paciente_id,
                "nombre": patient.get("nombre"),
                "apellidos": patient.get("apellidos").cloned().unwrap_or(json!("")),
                "identificacion": patient.get("identificacion"),
            },
            "estudios": formatted,
        }))
    }

    async fn find_owned_study(
        &self,
        estudio_id: &str,
        user: &AuthUser,
    ) -> Result<Value, DicomError> {
        if !valid_document_id(estudio_id) {
            return Err(DicomError::InvalidStudyId);
        }

        let study = self.store
            .find_one(STUDIES, json!({ "_id": estudio_id }))
            .await
            .map_err(db_error)?
            .ok_or(DicomError::StudyNotFound)?;

        if user.role == UserRole::Paciente {
            let owner = study.get("paciente_id").and_then(Value::as_str);
            if owner != user.paciente_id.as_deref() {
                warn!("Patient {} tried to access study {}", user.id, estudio_id);
                return Err(DicomError::NotOwner);
            }
        }

        Ok(study)
    }
}

/// A stored filename never contains a path separator, so anything with
/// one is a traversal attempt.
fn safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
}

fn db_error(err: anyhow::Error) -> DicomError {
    DicomError::Database(err.to_string())
}

fn storage_error(err: std::io::Error) -> DicomError {
    DicomError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_traversal_is_rejected() {
        assert!(safe_filename("f1.png"));
        assert!(!safe_filename("../secret.png"));
        assert!(!safe_filename("a/b.png"));
        assert!(!safe_filename(""));
    }
}
