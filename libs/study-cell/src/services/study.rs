use std::collections::HashMap;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::documents::{new_document_id, reshape, valid_document_id};
use shared_database::store::StoreClient;

use crate::models::{
    CreateStudyRequest, Study, StudyError, StudyListQuery, StudyState, UpdateStudyRequest,
};

const COLLECTION: &str = "estudios";
const PATIENTS: &str = "pacientes";
const APPOINTMENTS: &str = "citas";

/// Appointment states that block a study soft delete.
const ACTIVE_APPOINTMENT_STATES: [&str; 2] = ["programada", "en_proceso"];

pub struct StudyService {
    store: StoreClient,
}

impl StudyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    pub async fn list_studies(&self, query: StudyListQuery) -> Result<Vec<Study>, StudyError> {
        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(100);

        let mut filter = Map::new();
        if let Some(estado) = query.estado {
            filter.insert("estado".to_string(), json!(estado));
        }
        if let Some(tipo_estudio) = query.tipo_estudio {
            filter.insert(
                "tipo_estudio".to_string(),
                json!({ "$regex": tipo_estudio, "$options": "i" }),
            );
        }
        if let Some(paciente_id) = query.paciente_id {
            filter.insert("paciente_id".to_string(), json!(paciente_id));
        }
        if let Some(medico_solicitante) = query.medico_solicitante {
            filter.insert(
                "medico_solicitante".to_string(),
                json!({ "$regex": medico_solicitante, "$options": "i" }),
            );
        }
        if let Some(prioridad) = query.prioridad {
            filter.insert("prioridad".to_string(), json!(prioridad));
        }

        let documents = self.store
            .find(
                COLLECTION,
                Value::Object(filter),
                Some(json!({ "fecha_solicitud": -1 })),
                skip,
                limit,
            )
            .await
            .map_err(db_error)?;

        self.with_patient_details(documents).await
    }

    pub async fn get_study(&self, study_id: &str) -> Result<Study, StudyError> {
        if !valid_document_id(study_id) {
            return Err(StudyError::InvalidId);
        }

        let document = self.store
            .find_one(COLLECTION, json!({ "_id": study_id }))
            .await
            .map_err(db_error)?
            .ok_or(StudyError::NotFound)?;

        let mut studies = self.with_patient_details(vec![document]).await?;
        studies.pop().ok_or(StudyError::NotFound)
    }

    pub async fn create_study(&self, request: CreateStudyRequest) -> Result<Study, StudyError> {
        if !valid_document_id(&request.paciente_id) {
            return Err(StudyError::InvalidPatientId);
        }

        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": request.paciente_id }))
            .await
            .map_err(db_error)?;
        if patient.is_none() {
            return Err(StudyError::PatientNotFound);
        }

        debug!("Creating {} study for patient {}", request.tipo_estudio, request.paciente_id);

        let now = Utc::now().to_rfc3339();
        let document = json!({
            "_id": new_document_id(),
            "paciente_id": request.paciente_id,
            "tipo_estudio": request.tipo_estudio,
            "medico_solicitante": request.medico_solicitante,
            "prioridad": request.prioridad,
            "indicaciones": request.indicaciones,
            "sala": request.sala,
            "tecnico_asignado": request.tecnico_asignado,
            "estado": "pendiente",
            "archivos_dicom": [],
            "fecha_solicitud": now,
            "fecha_actualizacion": now,
        });

        self.store
            .insert_one(COLLECTION, document.clone())
            .await
            .map_err(db_error)?;

        parse_study(document)
    }

    pub async fn update_study(
        &self,
        study_id: &str,
        request: UpdateStudyRequest,
    ) -> Result<Study, StudyError> {
        if !valid_document_id(study_id) {
            return Err(StudyError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": study_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(StudyError::NotFound);
        }

        let mut update_data = Map::new();
        if let Some(estado) = request.estado {
            update_data.insert("estado".to_string(), json!(estado.as_str()));
        }
        if let Some(resultados) = request.resultados {
            update_data.insert("resultados".to_string(), json!(resultados));
        }
        if let Some(sala) = request.sala {
            update_data.insert("sala".to_string(), json!(sala));
        }
        if let Some(tecnico_asignado) = request.tecnico_asignado {
            update_data.insert("tecnico_asignado".to_string(), json!(tecnico_asignado));
        }
        if let Some(indicaciones) = request.indicaciones {
            update_data.insert("indicaciones".to_string(), json!(indicaciones));
        }

        if update_data.is_empty() {
            return Err(StudyError::EmptyUpdate);
        }

        self.apply_update(study_id, update_data).await
    }

    /// Move a study to a new state, stamping the completion date when it
    /// reaches "completado".
    pub async fn update_state(&self, study_id: &str, estado: &str) -> Result<Study, StudyError> {
        if !valid_document_id(study_id) {
            return Err(StudyError::InvalidId);
        }

        let state = StudyState::parse(estado)
            .ok_or_else(|| StudyError::InvalidState(estado.to_string()))?;

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": study_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(StudyError::NotFound);
        }

        let mut update_data = Map::new();
        update_data.insert("estado".to_string(), json!(state.as_str()));

        self.apply_update(study_id, update_data).await
    }

    pub async fn add_results(&self, study_id: &str, resultados: &str) -> Result<Study, StudyError> {
        if !valid_document_id(study_id) {
            return Err(StudyError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": study_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(StudyError::NotFound);
        }

        let mut update_data = Map::new();
        update_data.insert("resultados".to_string(), json!(resultados));

        self.apply_update(study_id, update_data).await
    }

    /// Soft delete. The study stays in the collection as "cancelado".
    pub async fn delete_study(&self, study_id: &str) -> Result<(), StudyError> {
        if !valid_document_id(study_id) {
            return Err(StudyError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": study_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(StudyError::NotFound);
        }

        let active_appointments = self.store
            .count(APPOINTMENTS, json!({
                "estudio_id": study_id,
                "estado": { "$in": ACTIVE_APPOINTMENT_STATES },
            }))
            .await
            .map_err(db_error)?;

        if active_appointments > 0 {
            return Err(StudyError::ActiveAppointments);
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": study_id }),
                json!({ "$set": {
                    "estado": "cancelado",
                    "fecha_actualizacion": Utc::now().to_rfc3339(),
                }}),
            )
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn apply_update(
        &self,
        study_id: &str,
        mut update_data: Map<String, Value>,
    ) -> Result<Study, StudyError> {
        if update_data.get("estado") == Some(&json!("completado")) {
            update_data.insert("fecha_realizacion".to_string(), json!(Utc::now().to_rfc3339()));
        }
        update_data.insert("fecha_actualizacion".to_string(), json!(Utc::now().to_rfc3339()));

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": study_id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(db_error)?;

        let updated = self.store
            .find_one(COLLECTION, json!({ "_id": study_id }))
            .await
            .map_err(db_error)?
            .ok_or(StudyError::NotFound)?;

        let mut studies = self.with_patient_details(vec![updated]).await?;
        studies.pop().ok_or(StudyError::NotFound)
    }

    /// Attach patient name fields to study documents with one batched
    /// lookup instead of a query per row.
    async fn with_patient_details(
        &self,
        documents: Vec<Value>,
    ) -> Result<Vec<Study>, StudyError> {
        let patient_ids: Vec<&str> = documents
            .iter()
            .filter_map(|doc| doc.get("paciente_id").and_then(Value::as_str))
            .collect();

        let mut patients: HashMap<String, Value> = HashMap::new();
        if !patient_ids.is_empty() {
            let found = self.store
                .find(
                    PATIENTS,
                    json!({ "_id": { "$in": patient_ids } }),
                    None,
                    0,
                    patient_ids.len() as u64,
                )
                .await
                .map_err(db_error)?;

            for patient in found {
                if let Some(id) = patient.get("_id").and_then(Value::as_str) {
                    patients.insert(id.to_string(), patient);
                }
            }
        }

        let mut studies = Vec::with_capacity(documents.len());
        for mut document in documents {
            let paciente_id = document
                .get("paciente_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            match patients.get(&paciente_id) {
                Some(patient) => {
                    document["paciente_nombre"] = patient.get("nombre").cloned().unwrap_or(Value::Null);
                    document["paciente_apellidos"] = patient.get("apellidos").cloned().unwrap_or(Value::Null);
                    document["paciente_cedula"] = patient.get("identificacion").cloned().unwrap_or(Value::Null);
                }
                None => {
                    warn!("Patient {} not found for study enrichment", paciente_id);
                    document["paciente_nombre"] = json!("Paciente no encontrado");
                }
            }

            studies.push(parse_study(document)?);
        }

        Ok(studies)
    }
}

fn db_error(err: anyhow::Error) -> StudyError {
    StudyError::Database(err.to_string())
}

fn parse_study(document: Value) -> Result<Study, StudyError> {
    serde_json::from_value(reshape(document))
        .map_err(|e| StudyError::Database(format!("documento de estudio inválido: {}", e)))
}
