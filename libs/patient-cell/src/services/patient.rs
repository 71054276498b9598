use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::documents::{new_document_id, reshape, reshape_all, valid_document_id};
use shared_database::store::StoreClient;

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientListQuery, UpdatePatientRequest};

const COLLECTION: &str = "pacientes";
const STUDIES: &str = "estudios";

/// Study states that block a patient soft delete.
const ACTIVE_STUDY_STATES: [&str; 3] = ["pendiente", "programado", "en_proceso"];

pub struct PatientService {
    store: StoreClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    pub async fn list_patients(&self, query: PatientListQuery) -> Result<Vec<Patient>, PatientError> {
        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(100);

        let documents = self.store
            .find(COLLECTION, json!({}), None, skip, limit)
            .await
            .map_err(db_error)?;

        documents.into_iter().map(parse_patient).collect()
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient, PatientError> {
        if !valid_document_id(patient_id) {
            return Err(PatientError::InvalidId);
        }

        let document = self.store
            .find_one(COLLECTION, json!({ "_id": patient_id }))
            .await
            .map_err(db_error)?
            .ok_or(PatientError::NotFound)?;

        parse_patient(document)
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        debug!("Creating patient with identification {}", request.identificacion);

        let existing = self.store
            .find_one(COLLECTION, json!({ "identificacion": request.identificacion }))
            .await
            .map_err(db_error)?;
        if existing.is_some() {
            return Err(PatientError::DuplicateIdentification);
        }

        let existing_email = self.store
            .find_one(COLLECTION, json!({ "email": request.email }))
            .await
            .map_err(db_error)?;
        if existing_email.is_some() {
            return Err(PatientError::DuplicateEmail);
        }

        let now = Utc::now().to_rfc3339();
        let document = json!({
            "_id": new_document_id(),
            "nombre": request.nombre,
            "apellidos": request.apellidos,
            "identificacion": request.identificacion,
            "email": request.email,
            "telefono": request.telefono,
            "fecha_nacimiento": request.fecha_nacimiento.to_rfc3339(),
            "direccion": request.direccion,
            "genero": request.genero,
            "grupo_sanguineo": request.grupo_sanguineo,
            "alergias": request.alergias,
            "condiciones_cronicas": request.condiciones_cronicas,
            "medicamentos": request.medicamentos,
            "estado": "activo",
            "fecha_creacion": now,
            "fecha_actualizacion": now,
        });

        self.store
            .insert_one(COLLECTION, document.clone())
            .await
            .map_err(db_error)?;

        parse_patient(document)
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        if !valid_document_id(patient_id) {
            return Err(PatientError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": patient_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(PatientError::NotFound);
        }

        let mut update_data = Map::new();
        if let Some(nombre) = request.nombre {
            update_data.insert("nombre".to_string(), json!(nombre));
        }
        if let Some(apellidos) = request.apellidos {
            update_data.insert("apellidos".to_string(), json!(apellidos));
        }
        if let Some(identificacion) = request.identificacion {
            update_data.insert("identificacion".to_string(), json!(identificacion));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(telefono) = request.telefono {
            update_data.insert("telefono".to_string(), json!(telefono));
        }
        if let Some(direccion) = request.direccion {
            update_data.insert("direccion".to_string(), json!(direccion));
        }
        if let Some(genero) = request.genero {
            update_data.insert("genero".to_string(), json!(genero));
        }
        if let Some(grupo_sanguineo) = request.grupo_sanguineo {
            update_data.insert("grupo_sanguineo".to_string(), json!(grupo_sanguineo));
        }
        if let Some(alergias) = request.alergias {
            update_data.insert("alergias".to_string(), json!(alergias));
        }
        if let Some(condiciones_cronicas) = request.condiciones_cronicas {
            update_data.insert("condiciones_cronicas".to_string(), json!(condiciones_cronicas));
        }
        if let Some(medicamentos) = request.medicamentos {
            update_data.insert("medicamentos".to_string(), json!(medicamentos));
        }

        if update_data.is_empty() {
            return Err(PatientError::EmptyUpdate);
        }

        // Re-check uniqueness when the identifying fields change.
        if let Some(identificacion) = update_data.get("identificacion") {
            let duplicate = self.store
                .find_one(COLLECTION, json!({
                    "identificacion": identificacion,
                    "_id": { "$ne": patient_id },
                }))
                .await
                .map_err(db_error)?;
            if duplicate.is_some() {
                return Err(PatientError::DuplicateIdentification);
            }
        }
        if let Some(email) = update_data.get("email") {
            let duplicate = self.store
                .find_one(COLLECTION, json!({
                    "email": email,
                    "_id": { "$ne": patient_id },
                }))
                .await
                .map_err(db_error)?;
            if duplicate.is_some() {
                return Err(PatientError::DuplicateEmail);
            }
        }

        update_data.insert("fecha_actualizacion".to_string(), json!(Utc::now().to_rfc3339()));

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": patient_id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(db_error)?;

        let updated = self.store
            .find_one(COLLECTION, json!({ "_id": patient_id }))
            .await
            .map_err(db_error)?
            .ok_or(PatientError::NotFound)?;

        parse_patient(updated)
    }

    /// Soft delete. The record stays in the collection with estado "inactivo".
    pub async fn delete_patient(&self, patient_id: &str) -> Result<(), PatientError> {
        if !valid_document_id(patient_id) {
            return Err(PatientError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": patient_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(PatientError::NotFound);
        }

        let active_studies = self.store
            .count(STUDIES, json!({
                "paciente_id": patient_id,
                "estado": { "$in": ACTIVE_STUDY_STATES },
            }))
            .await
            .map_err(db_error)?;

        if active_studies > 0 {
            return Err(PatientError::ActiveStudies);
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": patient_id }),
                json!({ "$set": {
                    "estado": "inactivo",
                    "fecha_actualizacion": Utc::now().to_rfc3339(),
                }}),
            )
            .await
            .map_err(db_error)?;

        Ok(())
    }

    /// The patient plus every study requested for them, newest first.
    pub async fn get_patient_studies(
        &self,
        patient_id: &str,
    ) -> Result<(Patient, Vec<Value>), PatientError> {
        let patient = self.get_patient(patient_id).await?;

        let studies = self.store
            .find(
                STUDIES,
                json!({ "paciente_id": patient_id }),
                Some(json!({ "fecha_solicitud": -1 })),
                0,
                1000,
            )
            .await
            .map_err(db_error)?;

        Ok((patient, reshape_all(studies)))
    }
}

fn db_error(err: anyhow::Error) -> PatientError {
    PatientError::Database(err.to_string())
}

fn parse_patient(document: Value) -> Result<Patient, PatientError> {
    serde_json::from_value(reshape(document))
        .map_err(|e| PatientError::Database(format!("documento de paciente inválido: {}", e)))
}
