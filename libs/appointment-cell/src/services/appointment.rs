use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use notification_cell::services::NotificationService;
use shared_config::AppConfig;
use shared_database::documents::{new_document_id, reshape, valid_document_id};
use shared_database::store::StoreClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentState,
    CreateAppointmentRequest, UpdateAppointmentRequest,
};

const COLLECTION: &str = "citas";
const PATIENTS: &str = "pacientes";
const STUDIES: &str = "estudios";

pub struct AppointmentService {
    store: StoreClient,
    notifications: NotificationService,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            notifications: NotificationService::new(config),
        }
    }

    pub async fn list_appointments(
        &self,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(100);

        let mut filter = Map::new();

        if let Some(fecha) = query.fecha {
            let day = fecha
                .parse::<NaiveDate>()
                .map_err(|_| AppointmentError::InvalidDateFilter)?;
            let start = day.and_hms_opt(0, 0, 0)
                .ok_or(AppointmentError::InvalidDateFilter)?
                .and_utc();
            let end = start + Duration::days(1);
            filter.insert("fecha_cita".to_string(), json!({
                "$gte": start.to_rfc3339(),
                "$lt": end.to_rfc3339(),
            }));
        }

        if let Some(estado) = query.estado {
            if estado != "Todos" {
                filter.insert("estado".to_string(), json!(estado.to_lowercase()));
            }
        }

        if let Some(tipo_estudio) = query.tipo_estudio {
            if tipo_estudio != "Todos" {
                filter.insert(
                    "tipo_estudio".to_string(),
                    json!({ "$regex": tipo_estudio, "$options": "i" }),
                );
            }
        }

        if let Some(tipo_cita) = query.tipo_cita {
            if tipo_cita != "Todos" {
                filter.insert(
                    "tipo_cita".to_string(),
                    json!({ "$regex": tipo_cita, "$options": "i" }),
                );
            }
        }

        if let Some(paciente_nombre) = query.paciente_nombre {
            let nombre_regex = json!({ "$regex": paciente_nombre, "$options": "i" });
            let matching = self.store
                .find(
                    PATIENTS,
                    json!({ "$or": [
                        { "nombre": nombre_regex },
                        { "apellidos": nombre_regex },
                    ]}),
                    None,
                    0,
                    1000,
                )
                .await
                .map_err(db_error)?;

            let ids: Vec<String> = matching
                .into_iter()
                .filter_map(|p| p.get("_id").and_then(Value::as_str).map(str::to_string))
                .collect();

            if ids.is_empty() {
                return Ok(Vec::new());
            }
            filter.insert("paciente_id".to_string(), json!({ "$in": ids }));
        }

        let documents = self.store
            .find(
                COLLECTION,
                Value::Object(filter),
                Some(json!({ "fecha_cita": 1 })),
                skip,
                limit,
            )
            .await
            .map_err(db_error)?;

        self.with_patient_details(documents).await
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Appointment, AppointmentError> {
        if !valid_document_id(appointment_id) {
            return Err(AppointmentError::InvalidId);
        }

        let document = self.store
            .find_one(COLLECTION, json!({ "_id": appointment_id }))
            .await
            .map_err(db_error)?
            .ok_or(AppointmentError::NotFound)?;

        let mut appointments = self.with_patient_details(vec![document]).await?;
        appointments.pop().ok_or(AppointmentError::NotFound)
    }

    /// Appointments linked to one study, soonest first.
    pub async fn study_appointments(
        &self,
        estudio_id: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !valid_document_id(estudio_id) {
            return Err(AppointmentError::InvalidStudyId);
        }

        let study = self.store
            .find_one(STUDIES, json!({ "_id": estudio_id }))
            .await
            .map_err(db_error)?;
        if study.is_none() {
            return Err(AppointmentError::StudyNotFound);
        }

        let documents = self.store
            .find(
                COLLECTION,
                json!({ "estudio_id": estudio_id }),
                Some(json!({ "fecha_cita": 1 })),
                0,
                1000,
            )
            .await
            .map_err(db_error)?;

        self.with_patient_details(documents).await
    }

    /// Book an appointment and queue its confirmation notifications.
    /// Returns the ids of the queued notifications so the caller can
    /// wake the dispatcher.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<(Appointment, Vec<String>), AppointmentError> {
        if !valid_document_id(&request.paciente_id) {
            return Err(AppointmentError::InvalidPatientId);
        }
        if let Some(estudio_id) = &request.estudio_id {
            if !valid_document_id(estudio_id) {
                return Err(AppointmentError::InvalidStudyId);
            }
        }

        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": request.paciente_id }))
            .await
            .map_err(db_error)?
            .ok_or(AppointmentError::PatientNotFound)?;

        self.assert_no_schedule_conflict(
            &request.fecha_cita,
            request.sala.as_deref(),
            request.tecnico_asignado.as_deref(),
            None,
        ).await?;

        debug!("Booking {} appointment for patient {}", request.tipo_estudio, request.paciente_id);

        let now = Utc::now().to_rfc3339();
        let document = json!({
            "_id": new_document_id(),
            "paciente_id": request.paciente_id,
            "fecha_cita": request.fecha_cita.to_rfc3339(),
            "tipo_estudio": request.tipo_estudio,
            "tipo_cita": request.tipo_cita,
            "observaciones": request.observaciones,
            "estado": "programada",
            "estudio_id": request.estudio_id,
            "tecnico_asignado": request.tecnico_asignado,
            "sala": request.sala,
            "duracion_minutos": request.duracion_minutos,
            "asistio": null,
            "fecha_creacion": now,
            "fecha_actualizacion": now,
        });

        self.store
            .insert_one(COLLECTION, document.clone())
            .await
            .map_err(db_error)?;

        let mut appointments = self.with_patient_details(vec![document]).await?;
        let appointment = appointments.pop().ok_or(AppointmentError::NotFound)?;

        // A booking without notifications is still a booking.
        let mut queued = Vec::new();
        let has_email = patient
            .get("email")
            .and_then(Value::as_str)
            .is_some_and(|email| !email.is_empty());
        if has_email {
            match self.notifications
                .enqueue_appointment_confirmation(
                    &appointment.paciente_id,
                    appointment.estudio_id.as_deref(),
                    appointment.fecha_cita,
                    &appointment.tipo_estudio,
                )
                .await
            {
                Ok(notifications) => {
                    queued = notifications.into_iter().map(|n| n.id).collect();
                }
                Err(err) => warn!("Could not queue confirmation notifications: {}", err),
            }
        }

        Ok((appointment, queued))
    }

    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !valid_document_id(appointment_id) {
            return Err(AppointmentError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": appointment_id }))
            .await
            .map_err(db_error)?
            .ok_or(AppointmentError::NotFound)?;

        let mut update_data = Map::new();
        if let Some(fecha_cita) = &request.fecha_cita {
            update_data.insert("fecha_cita".to_string(), json!(fecha_cita.to_rfc3339()));
        }
        if let Some(tipo_estudio) = request.tipo_estudio {
            update_data.insert("tipo_estudio".to_string(), json!(tipo_estudio));
        }
        if let Some(tipo_cita) = request.tipo_cita {
            update_data.insert("tipo_cita".to_string(), json!(tipo_cita));
        }
        if let Some(observaciones) = request.observaciones {
            update_data.insert("observaciones".to_string(), json!(observaciones));
        }
        if let Some(estado) = &request.estado {
            let estado = AppointmentState::parse(estado)
                .ok_or_else(|| AppointmentError::InvalidState(estado.clone()))?;
            update_data.insert("estado".to_string(), json!(estado.as_str()));
        }
        if let Some(tecnico_asignado) = &request.tecnico_asignado {
            update_data.insert("tecnico_asignado".to_string(), json!(tecnico_asignado));
        }
        if let Some(sala) = &request.sala {
            update_data.insert("sala".to_string(), json!(sala));
        }
        if let Some(duracion_minutos) = request.duracion_minutos {
            update_data.insert("duracion_minutos".to_string(), json!(duracion_minutos));
        }
        if let Some(asistio) = request.asistio {
            update_data.insert("asistio".to_string(), json!(asistio));
        }

        if update_data.is_empty() {
            return Err(AppointmentError::EmptyUpdate);
        }

        // Rescheduling or moving the appointment re-runs the collision
        // check against the effective slot.
        let reschedules = request.fecha_cita.is_some()
            || request.sala.is_some()
            || request.tecnico_asignado.is_some();
        if reschedules {
            let fecha_cita = match &request.fecha_cita {
                Some(fecha) => *fecha,
                None => existing
                    .get("fecha_cita")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                    .ok_or_else(|| AppointmentError::Database(
                        "cita sin fecha_cita válida".to_string(),
                    ))?,
            };
            let existing_sala = existing.get("sala").and_then(Value::as_str).map(str::to_string);
            let existing_tecnico = existing
                .get("tecnico_asignado")
                .and_then(Value::as_str)
                .map(str::to_string);
            let sala = request.sala.clone().or(existing_sala);
            let tecnico = request.tecnico_asignado.clone().or(existing_tecnico);

            self.assert_no_schedule_conflict(
                &fecha_cita,
                sala.as_deref(),
                tecnico.as_deref(),
                Some(appointment_id),
            ).await?;
        }

        update_data.insert("fecha_actualizacion".to_string(), json!(Utc::now().to_rfc3339()));

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": appointment_id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(db_error)?;

        self.get_appointment(appointment_id).await
    }

    /// Cancel an appointment. A linked study goes back to "pendiente"
    /// so it can be rescheduled.
    pub async fn cancel_appointment(&self, appointment_id: &str) -> Result<(), AppointmentError> {
        if !valid_document_id(appointment_id) {
            return Err(AppointmentError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": appointment_id }))
            .await
            .map_err(db_error)?
            .ok_or(AppointmentError::NotFound)?;

        let estado = existing.get("estado").and_then(Value::as_str).unwrap_or_default();
        if estado == "cancelada" || estado == "completada" {
            return Err(AppointmentError::AlreadyClosed);
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": appointment_id }),
                json!({ "$set": {
                    "estado": "cancelada",
                    "fecha_actualizacion": Utc::now().to_rfc3339(),
                }}),
            )
            .await
            .map_err(db_error)?;

        if let Some(estudio_id) = existing.get("estudio_id").and_then(Value::as_str) {
            let outcome = self.store
                .update_one(
                    STUDIES,
                    json!({ "_id": estudio_id }),
                    json!({ "$set": {
                        "estado": "pendiente",
                        "fecha_actualizacion": Utc::now().to_rfc3339(),
                    }}),
                )
                .await;
            if let Err(err) = outcome {
                warn!("Could not reset study {} after cancellation: {}", estudio_id, err);
            }
        }

        Ok(())
    }

    pub async fn update_attendance(
        &self,
        appointment_id: &str,
        asistio: bool,
    ) -> Result<(), AppointmentError> {
        if !valid_document_id(appointment_id) {
            return Err(AppointmentError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": appointment_id }))
            .await
            .map_err(db_error)?
            .ok_or(AppointmentError::NotFound)?;

        let estado = existing.get("estado").and_then(Value::as_str).unwrap_or_default();
        if estado != "programada" && estado != "completada" {
            return Err(AppointmentError::AttendanceNotAllowed);
        }

        let mut update_data = Map::new();
        update_data.insert("asistio".to_string(), json!(asistio));
        update_data.insert("fecha_actualizacion".to_string(), json!(Utc::now().to_rfc3339()));
        if !asistio {
            update_data.insert("estado".to_string(), json!("no_asistio"));
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": appointment_id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(db_error)?;

        Ok(())
    }

    /// Reject the slot when another open appointment has the same date
    /// and time and shares the room or the technician.
    async fn assert_no_schedule_conflict(
        &self,
        fecha_cita: &DateTime<Utc>,
        sala: Option<&str>,
        tecnico_asignado: Option<&str>,
        exclude_id: Option<&str>,
    ) -> Result<(), AppointmentError> {
        let mut arms = Vec::new();
        if let Some(sala) = sala {
            arms.push(json!({ "sala": sala }));
        }
        if let Some(tecnico) = tecnico_asignado {
            arms.push(json!({ "tecnico_asignado": tecnico }));
        }
        if arms.is_empty() {
            return Ok(());
        }

        let mut filter = Map::new();
        filter.insert("fecha_cita".to_string(), json!(fecha_cita.to_rfc3339()));
        filter.insert("estado".to_string(), json!({ "$ne": "cancelada" }));
        filter.insert("$or".to_string(), json!(arms));
        if let Some(exclude_id) = exclude_id {
            filter.insert("_id".to_string(), json!({ "$ne": exclude_id }));
        }

        let clash = self.store
            .find_one(COLLECTION, Value::Object(filter))
            .await
            .map_err(db_error)?;

        if clash.is_some() {
            return Err(AppointmentError::ScheduleConflict);
        }
        Ok(())
    }

    async fn with_patient_details(
        &self,
        documents: Vec<Value>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
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

        let mut appointments = Vec::with_capacity(documents.len());
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
                }
                None => {
                    document["paciente_nombre"] = json!("Desconocido");
                }
            }

            appointments.push(parse_appointment(document)?);
        }

        Ok(appointments)
    }
}

fn db_error(err: anyhow::Error) -> AppointmentError {
    AppointmentError::Database(err.to_string())
}

fn parse_appointment(document: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(reshape(document))
        .map_err(|e| AppointmentError::Database(format!("documento de cita inválido: {}", e)))
}
