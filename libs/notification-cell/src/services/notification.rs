use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::documents::{new_document_id, reshape, valid_document_id};
use shared_database::store::StoreClient;

use crate::models::{
    CreateNotificationRequest, Notification, NotificationError, NotificationListQuery,
    NotificationType,
};
use crate::services::email::EmailService;
use crate::services::sms::SmsService;

const COLLECTION: &str = "notificaciones";
const PATIENTS: &str = "pacientes";
const STUDIES: &str = "estudios";

const DEFAULT_EMAIL_SUBJECT: &str = "Actualización de su estudio médico";

pub struct NotificationService {
    store: StoreClient,
    email: EmailService,
    sms: SmsService,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            email: EmailService::new(config),
            sms: SmsService::new(config),
        }
    }

    pub async fn create_notification(
        &self,
        request: CreateNotificationRequest,
    ) -> Result<Notification, NotificationError> {
        if !valid_document_id(&request.paciente_id) {
            return Err(NotificationError::InvalidReference);
        }

        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": request.paciente_id }))
            .await
            .map_err(db_error)?;
        if patient.is_none() {
            return Err(NotificationError::PatientNotFound);
        }

        if let Some(estudio_id) = &request.estudio_id {
            if !valid_document_id(estudio_id) {
                return Err(NotificationError::InvalidReference);
            }
            let study = self.store
                .find_one(STUDIES, json!({ "_id": estudio_id }))
                .await
                .map_err(db_error)?;
            if study.is_none() {
                return Err(NotificationError::StudyNotFound);
            }
        }

        self.insert_row(request).await
    }

    pub async fn list_notifications(
        &self,
        query: NotificationListQuery,
    ) -> Result<Vec<Notification>, NotificationError> {
        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(100);

        let mut filter = Map::new();
        if let Some(enviada) = query.enviada {
            filter.insert("enviada".to_string(), json!(enviada));
        }

        let documents = self.store
            .find(
                COLLECTION,
                Value::Object(filter),
                Some(json!({ "fecha_creacion": -1 })),
                skip,
                limit,
            )
            .await
            .map_err(db_error)?;

        documents.into_iter().map(parse_notification).collect()
    }

    pub async fn get_notification(
        &self,
        notification_id: &str,
    ) -> Result<Notification, NotificationError> {
        if !valid_document_id(notification_id) {
            return Err(NotificationError::InvalidId);
        }

        let document = self.store
            .find_one(COLLECTION, json!({ "_id": notification_id }))
            .await
            .map_err(db_error)?
            .ok_or(NotificationError::NotFound)?;

        parse_notification(document)
    }

    pub async fn patient_notifications(
        &self,
        paciente_id: &str,
        query: NotificationListQuery,
    ) -> Result<Vec<Notification>, NotificationError> {
        if !valid_document_id(paciente_id) {
            return Err(NotificationError::InvalidReference);
        }

        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": paciente_id }))
            .await
            .map_err(db_error)?;
        if patient.is_none() {
            return Err(NotificationError::PatientNotFound);
        }

        let documents = self.store
            .find(
                COLLECTION,
                json!({ "paciente_id": paciente_id }),
                Some(json!({ "fecha_creacion": -1 })),
                query.skip.unwrap_or(0),
                query.limit.unwrap_or(100),
            )
            .await
            .map_err(db_error)?;

        documents.into_iter().map(parse_notification).collect()
    }

    /// Queue the automatic email and SMS rows for a study's current
    /// state. States without a patient-facing message queue nothing.
    pub async fn notify_study_state(
        &self,
        estudio_id: &str,
    ) -> Result<Option<Vec<Notification>>, NotificationError> {
        if !valid_document_id(estudio_id) {
            return Err(NotificationError::InvalidReference);
        }

        let study = self.store
            .find_one(STUDIES, json!({ "_id": estudio_id }))
            .await
            .map_err(db_error)?
            .ok_or(NotificationError::StudyNotFound)?;

        let paciente_id = study
            .get("paciente_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": paciente_id }))
            .await
            .map_err(db_error)?;
        if patient.is_none() {
            return Err(NotificationError::PatientNotFound);
        }

        let tipo_estudio = study
            .get("tipo_estudio")
            .and_then(Value::as_str)
            .unwrap_or("imagenología");

        let (titulo, mensaje) = match study.get("estado").and_then(Value::as_str) {
            Some("programado") => (
                "Estudio Programado",
                format!("Su estudio de {} ha sido programado.", tipo_estudio),
            ),
            Some("en_proceso") => (
                "Estudio en Proceso",
                format!("Su estudio de {} está en proceso.", tipo_estudio),
            ),
            Some("completado") => (
                "Estudio Completado",
                format!(
                    "Su estudio de {} ha sido completado. Los resultados estarán disponibles pronto.",
                    tipo_estudio
                ),
            ),
            _ => return Ok(None),
        };

        let email_row = self.insert_row(CreateNotificationRequest {
            paciente_id: paciente_id.clone(),
            tipo: NotificationType::Email,
            mensaje: mensaje.clone(),
            estudio_id: Some(estudio_id.to_string()),
            titulo: Some(titulo.to_string()),
            prioridad: "normal".to_string(),
        }).await?;

        let sms_row = self.insert_row(CreateNotificationRequest {
            paciente_id,
            tipo: NotificationType::Sms,
            mensaje,
            estudio_id: Some(estudio_id.to_string()),
            titulo: None,
            prioridad: "normal".to_string(),
        }).await?;

        Ok(Some(vec![email_row, sms_row]))
    }

    /// Queue the confirmation email and SMS for a newly booked
    /// appointment.
    pub async fn enqueue_appointment_confirmation(
        &self,
        paciente_id: &str,
        estudio_id: Option<&str>,
        fecha_cita: DateTime<Utc>,
        tipo_estudio: &str,
    ) -> Result<Vec<Notification>, NotificationError> {
        let fecha_formateada = fecha_cita.format("%d/%m/%Y a las %H:%M");

        let body = format!(
            "Estimado paciente,\n\n\
             Su cita ha sido programada exitosamente:\n\n\
             Fecha y Hora: {}\n\
             Tipo de Estudio: {}\n\n\
             Por favor, llegue 15 minutos antes de su cita.\n\n\
             Saludos,\n\
             Centro de Imagenología",
            fecha_formateada, tipo_estudio
        );

        let email_row = self.insert_row(CreateNotificationRequest {
            paciente_id: paciente_id.to_string(),
            tipo: NotificationType::Email,
            mensaje: body,
            estudio_id: estudio_id.map(str::to_string),
            titulo: Some("Confirmación de Cita - Imagenología".to_string()),
            prioridad: "normal".to_string(),
        }).await?;

        let sms_row = self.insert_row(CreateNotificationRequest {
            paciente_id: paciente_id.to_string(),
            tipo: NotificationType::Sms,
            mensaje: format!(
                "Cita confirmada: {} el {}. Centro de Imagenología.",
                tipo_estudio, fecha_formateada
            ),
            estudio_id: estudio_id.map(str::to_string),
            titulo: None,
            prioridad: "normal".to_string(),
        }).await?;

        Ok(vec![email_row, sms_row])
    }

    /// Check that a failed notification can be queued again.
    pub async fn prepare_resend(
        &self,
        notification_id: &str,
    ) -> Result<Notification, NotificationError> {
        let notification = self.get_notification(notification_id).await?;

        if notification.enviada {
            return Err(NotificationError::AlreadySent);
        }

        Ok(notification)
    }

    pub async fn delete_notification(
        &self,
        notification_id: &str,
    ) -> Result<(), NotificationError> {
        if !valid_document_id(notification_id) {
            return Err(NotificationError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": notification_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(NotificationError::NotFound);
        }

        self.store
            .delete_one(COLLECTION, json!({ "_id": notification_id }))
            .await
            .map_err(db_error)?;

        Ok(())
    }

    /// Attempt delivery of one outbox row and record the outcome on it.
    pub async fn deliver(&self, notification_id: &str) -> Result<bool, NotificationError> {
        let notification = self.get_notification(notification_id).await?;

        let patient = self.store
            .find_one(PATIENTS, json!({ "_id": notification.paciente_id }))
            .await
            .map_err(db_error)?
            .ok_or(NotificationError::PatientNotFound)?;

        let sent = match notification.tipo {
            NotificationType::Email => {
                let to = patient.get("email").and_then(Value::as_str).unwrap_or_default();
                let subject = notification.titulo.as_deref().unwrap_or(DEFAULT_EMAIL_SUBJECT);
                self.email.send_email(to, subject, &notification.mensaje).await
            }
            NotificationType::Sms => {
                let to = patient.get("telefono").and_then(Value::as_str).unwrap_or_default();
                self.sms.send_sms(to, &notification.mensaje).await
            }
            NotificationType::Push => {
                warn!("Push delivery is not implemented, notification {} stays queued", notification_id);
                false
            }
        };

        let now = Utc::now().to_rfc3339();
        let update = if sent {
            json!({ "$set": {
                "enviada": true,
                "fecha_envio": now,
                "ultimo_intento": now,
            }})
        } else {
            json!({
                "$inc": { "intentos_envio": 1 },
                "$set": { "ultimo_intento": now },
            })
        };

        self.store
            .update_one(COLLECTION, json!({ "_id": notification_id }), update)
            .await
            .map_err(db_error)?;

        debug!("Delivery attempt for {} finished, sent={}", notification_id, sent);
        Ok(sent)
    }

    /// Ids of rows that were queued but never attempted, for the
    /// dispatcher's sweep.
    pub async fn pending_unattempted(&self, limit: u64) -> Result<Vec<String>, NotificationError> {
        let documents = self.store
            .find(
                COLLECTION,
                json!({ "enviada": false, "intentos_envio": 0 }),
                Some(json!({ "fecha_creacion": 1 })),
                0,
                limit,
            )
            .await
            .map_err(db_error)?;

        Ok(documents
            .into_iter()
            .filter_map(|doc| doc.get("_id").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    async fn insert_row(
        &self,
        request: CreateNotificationRequest,
    ) -> Result<Notification, NotificationError> {
        let document = json!({
            "_id": new_document_id(),
            "paciente_id": request.paciente_id,
            "tipo": request.tipo.as_str(),
            "mensaje": request.mensaje,
            "estudio_id": request.estudio_id,
            "titulo": request.titulo,
            "prioridad": request.prioridad,
            "enviada": false,
            "fecha_creacion": Utc::now().to_rfc3339(),
            "fecha_envio": null,
            "intentos_envio": 0,
            "ultimo_intento": null,
        });

        self.store
            .insert_one(COLLECTION, document.clone())
            .await
            .map_err(db_error)?;

        parse_notification(document)
    }
}

fn db_error(err: anyhow::Error) -> NotificationError {
    NotificationError::Database(err.to_string())
}

fn parse_notification(document: Value) -> Result<Notification, NotificationError> {
    serde_json::from_value(reshape(document))
        .map_err(|e| NotificationError::Database(format!("documento de notificación inválido: {}", e)))
}
