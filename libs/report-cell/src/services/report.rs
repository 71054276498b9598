use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::documents::{new_document_id, reshape, valid_document_id};
use shared_database::store::StoreClient;

use crate::models::{
    CreateReportRequest, Report, ReportError, ReportListQuery, StatsQuery, UpdateReportRequest,
};

const COLLECTION: &str = "informes";
const STUDIES: &str = "estudios";
const PATIENTS: &str = "pacientes";
const APPOINTMENTS: &str = "citas";

pub struct ReportService {
    store: StoreClient,
}

impl ReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    pub async fn list_reports(&self, query: ReportListQuery) -> Result<Vec<Report>, ReportError> {
        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(100);

        let mut filter = Map::new();
        if let Some(estudio_id) = query.estudio_id {
            filter.insert("estudio_id".to_string(), json!(estudio_id));
        }
        if let Some(paciente_id) = query.paciente_id {
            filter.insert("paciente_id".to_string(), json!(paciente_id));
        }
        if let Some(estado) = query.estado {
            filter.insert("estado".to_string(), json!(estado));
        }
        if let Some(urgente) = query.urgente {
            filter.insert("urgente".to_string(), json!(urgente));
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

        documents.into_iter().map(parse_report).collect()
    }

    pub async fn get_report(&self, report_id: &str) -> Result<Report, ReportError> {
        if !valid_document_id(report_id) {
            return Err(ReportError::InvalidId);
        }

        let document = self.store
            .find_one(COLLECTION, json!({ "_id": report_id }))
            .await
            .map_err(db_error)?
            .ok_or(ReportError::NotFound)?;

        parse_report(document)
    }

    pub async fn create_report(&self, request: CreateReportRequest) -> Result<Report, ReportError> {
        if !valid_document_id(&request.estudio_id) {
            return Err(ReportError::InvalidStudyId);
        }

        let study = self.store
            .find_one(STUDIES, json!({ "_id": request.estudio_id }))
            .await
            .map_err(db_error)?
            .ok_or(ReportError::StudyNotFound)?;

        let patient = match study.get("paciente_id").and_then(Value::as_str) {
            Some(paciente_id) => self.store
                .find_one(PATIENTS, json!({ "_id": paciente_id }))
                .await
                .map_err(db_error)?,
            None => None,
        };

        debug!("Creating report for study {}", request.estudio_id);

        let now = Utc::now().to_rfc3339();
        let document = json!({
            "_id": new_document_id(),
            "estudio_id": request.estudio_id,
            "medico_radiologo": request.medico_radiologo,
            "fecha_informe": request.fecha_informe,
            "hallazgos": request.hallazgos,
            "impresion_diagnostica": request.impresion_diagnostica,
            "recomendaciones": request.recomendaciones,
            "estado": request.estado,
            "tecnica_utilizada": request.tecnica_utilizada,
            "calidad_estudio": request.calidad_estudio,
            "urgente": request.urgente,
            "validado": request.validado,
            "observaciones_tecnicas": request.observaciones_tecnicas,
            "imagenes_dicom": request.imagenes_dicom,
            "firmado": false,
            "fecha_firma": Value::Null,
            "paciente_id": study.get("paciente_id").cloned().unwrap_or(Value::Null),
            "paciente_nombre": patient.as_ref().and_then(|p| p.get("nombre")).cloned().unwrap_or(Value::Null),
            "paciente_apellidos": patient.as_ref().and_then(|p| p.get("apellidos")).cloned().unwrap_or(Value::Null),
            "paciente_cedula": patient.as_ref().and_then(|p| p.get("identificacion")).cloned().unwrap_or(Value::Null),
            "estudio_tipo": study.get("tipo_estudio").cloned().unwrap_or(Value::Null),
            "estudio_fecha": study.get("fecha_solicitud").cloned().unwrap_or(Value::Null),
            "fecha_creacion": now,
            "fecha_actualizacion": now,
        });

        self.store
            .insert_one(COLLECTION, document.clone())
            .await
            .map_err(db_error)?;

        parse_report(document)
    }

    pub async fn update_report(
        &self,
        report_id: &str,
        request: UpdateReportRequest,
    ) -> Result<Report, ReportError> {
        if !valid_document_id(report_id) {
            return Err(ReportError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": report_id }))
            .await
            .map_err(db_error)?;
        if existing.is_none() {
            return Err(ReportError::NotFound);
        }

        let mut update_data = Map::new();
        if let Some(medico_radiologo) = request.medico_radiologo {
            update_data.insert("medico_radiologo".to_string(), json!(medico_radiologo));
        }
        if let Some(fecha_informe) = request.fecha_informe {
            update_data.insert("fecha_informe".to_string(), json!(fecha_informe));
        }
        if let Some(hallazgos) = request.hallazgos {
            update_data.insert("hallazgos".to_string(), json!(hallazgos));
        }
        if let Some(impresion_diagnostica) = request.impresion_diagnostica {
            update_data.insert("impresion_diagnostica".to_string(), json!(impresion_diagnostica));
        }
        if let Some(recomendaciones) = request.recomendaciones {
            update_data.insert("recomendaciones".to_string(), json!(recomendaciones));
        }
        if let Some(estado) = request.estado {
            update_data.insert("estado".to_string(), json!(estado));
        }
        if let Some(tecnica_utilizada) = request.tecnica_utilizada {
            update_data.insert("tecnica_utilizada".to_string(), json!(tecnica_utilizada));
        }
        if let Some(calidad_estudio) = request.calidad_estudio {
            update_data.insert("calidad_estudio".to_string(), json!(calidad_estudio));
        }
        if let Some(urgente) = request.urgente {
            update_data.insert("urgente".to_string(), json!(urgente));
        }
        if let Some(validado) = request.validado {
            update_data.insert("validado".to_string(), json!(validado));
        }
        if let Some(observaciones_tecnicas) = request.observaciones_tecnicas {
            update_data.insert("observaciones_tecnicas".to_string(), json!(observaciones_tecnicas));
        }

        if update_data.is_empty() {
            return Err(ReportError::EmptyUpdate);
        }

        self.apply_update(report_id, update_data).await
    }

    /// Sign a report. Signing is final; a signed report cannot be re-signed.
    pub async fn sign_report(&self, report_id: &str) -> Result<Report, ReportError> {
        if !valid_document_id(report_id) {
            return Err(ReportError::InvalidId);
        }

        let existing = self.store
            .find_one(COLLECTION, json!({ "_id": report_id }))
            .await
            .map_err(db_error)?
            .ok_or(ReportError::NotFound)?;

        if existing.get("firmado").and_then(Value::as_bool) == Some(true) {
            return Err(ReportError::AlreadySigned);
        }

        let mut update_data = Map::new();
        update_data.insert("firmado".to_string(), json!(true));
        update_data.insert("fecha_firma".to_string(), json!(Utc::now().to_rfc3339()));

        self.apply_update(report_id, update_data).await
    }

    /// Hard delete. Reports are not soft-deleted.
    pub async fn delete_report(&self, report_id: &str) -> Result<(), ReportError> {
        if !valid_document_id(report_id) {
            return Err(ReportError::InvalidId);
        }

        let deleted = self.store
            .delete_one(COLLECTION, json!({ "_id": report_id }))
            .await
            .map_err(db_error)?;

        if deleted == 0 {
            return Err(ReportError::NotFound);
        }

        Ok(())
    }

    /// Recompute the report's image list from the owning study's file list.
    ///
    /// The study's `archivos_dicom` is the source of truth; this repairs a
    /// report whose `imagenes_dicom` drifted after a partial upload failure.
    pub async fn sync_images(&self, report_id: &str) -> Result<(Report, usize), ReportError> {
        if !valid_document_id(report_id) {
            return Err(ReportError::InvalidId);
        }

        let report = self.store
            .find_one(COLLECTION, json!({ "_id": report_id }))
            .await
            .map_err(db_error)?
            .ok_or(ReportError::NotFound)?;

        let estudio_id = report
            .get("estudio_id")
            .and_then(Value::as_str)
            .ok_or(ReportError::StudyNotFound)?
            .to_string();

        let study = self.store
            .find_one(STUDIES, json!({ "_id": estudio_id }))
            .await
            .map_err(db_error)?
            .ok_or(ReportError::StudyNotFound)?;

        let files = study
            .get("archivos_dicom")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let images: Vec<Value> = files
            .iter()
            .enumerate()
            .map(|(index, file)| image_ref_from_file(file, &estudio_id, index))
            .collect();

        let count = images.len();

        let mut update_data = Map::new();
        update_data.insert("imagenes_dicom".to_string(), Value::Array(images));

        info!("Synced {} images from study {} into report {}", count, estudio_id, report_id);

        let report = self.apply_update(report_id, update_data).await?;
        Ok((report, count))
    }

    /// Counts of studies and appointments over a date range, grouped for
    /// the dashboard.
    pub async fn statistics(&self, query: StatsQuery) -> Result<Value, ReportError> {
        let (start, end) = parse_range(&query.inicio, &query.fin)?;

        let studies_by_state = self.grouped_counts(
            STUDIES,
            json!({ "fecha_solicitud": { "$gte": start, "$lt": end } }),
            "$estado",
        ).await?;

        let studies_by_type = self.grouped_counts(
            STUDIES,
            json!({ "fecha_solicitud": { "$gte": start, "$lt": end } }),
            "$tipo_estudio",
        ).await?;

        let appointments_by_state = self.grouped_counts(
            APPOINTMENTS,
            json!({ "fecha_creacion": { "$gte": start, "$lt": end } }),
            "$estado",
        ).await?;

        let attended = self.store
            .count(APPOINTMENTS, json!({
                "asistio": true,
                "fecha_creacion": { "$gte": start, "$lt": end },
            }))
            .await
            .map_err(db_error)?;

        let missed = self.store
            .count(APPOINTMENTS, json!({
                "asistio": false,
                "fecha_creacion": { "$gte": start, "$lt": end },
            }))
            .await
            .map_err(db_error)?;

        let total_studies: u64 = studies_by_state.iter().map(|(_, n)| n).sum();
        let total_appointments: u64 = appointments_by_state.iter().map(|(_, n)| n).sum();

        let attendance_rate = if attended + missed > 0 {
            (attended as f64 / (attended + missed) as f64 * 10000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(json!({
            "periodo": { "inicio": query.inicio, "fin": query.fin },
            "estudios": {
                "por_estado": group_object(studies_by_state),
                "por_tipo": group_object(studies_by_type),
                "total": total_studies,
            },
            "citas": {
                "por_estado": group_object(appointments_by_state),
                "total": total_appointments,
                "asistencia": {
                    "asistidas": attended,
                    "no_asistidas": missed,
                    "tasa": attendance_rate,
                },
            },
        }))
    }

    /// Operational dashboard: processing time per study type, appointments
    /// closed per technician, and room usage over a date range.
    pub async fn performance(&self, query: StatsQuery) -> Result<Value, ReportError> {
        let (start, end) = parse_range(&query.inicio, &query.fin)?;

        // Timestamps are stored as RFC 3339 strings, so they are converted
        // with $toDate before subtracting. The difference comes back in
        // milliseconds.
        let times_pipeline = json!([
            { "$match": {
                "estado": "completado",
                "fecha_solicitud": { "$gte": start },
                "fecha_realizacion": { "$lt": end },
            }},
            { "$project": {
                "tipo_estudio": 1,
                "tiempo_procesamiento": { "$divide": [
                    { "$subtract": [
                        { "$toDate": "$fecha_realizacion" },
                        { "$toDate": "$fecha_solicitud" },
                    ]},
                    3_600_000,
                ]},
            }},
            { "$group": {
                "_id": "$tipo_estudio",
                "tiempo_promedio": { "$avg": "$tiempo_procesamiento" },
                "total_estudios": { "$sum": 1 },
            }},
        ]);

        let study_times: Vec<Value> = self.store
            .aggregate(STUDIES, times_pipeline)
            .await
            .map_err(db_error)?
            .into_iter()
            .filter_map(|doc| {
                let tipo_estudio = doc.get("_id").and_then(Value::as_str)?.to_string();
                let promedio = doc.get("tiempo_promedio").and_then(Value::as_f64).unwrap_or(0.0);
                let total = doc.get("total_estudios").and_then(Value::as_u64).unwrap_or(0);
                Some(json!({
                    "tipo_estudio": tipo_estudio,
                    "tiempo_promedio_horas": round2(promedio),
                    "total_estudios": total,
                }))
            })
            .collect();

        let technician_pipeline = json!([
            { "$match": {
                "estado": "completada",
                "fecha_creacion": { "$gte": start, "$lt": end },
            }},
            { "$group": { "_id": "$tecnico_asignado", "total_citas": { "$sum": 1 } } },
            { "$sort": { "total_citas": -1 } },
        ]);

        let technician_load: Vec<Value> = self.store
            .aggregate(APPOINTMENTS, technician_pipeline)
            .await
            .map_err(db_error)?
            .into_iter()
            .filter_map(|doc| {
                let total = doc.get("total_citas").and_then(Value::as_u64)?;
                Some(json!({
                    "tecnico": doc.get("_id").cloned().unwrap_or(Value::Null),
                    "total_citas": total,
                }))
            })
            .collect();

        let rooms_pipeline = json!([
            { "$match": { "fecha_creacion": { "$gte": start, "$lt": end } } },
            { "$group": { "_id": "$sala", "total_citas": { "$sum": 1 } } },
        ]);

        let room_usage: Vec<Value> = self.store
            .aggregate(APPOINTMENTS, rooms_pipeline)
            .await
            .map_err(db_error)?
            .into_iter()
            .filter_map(|doc| {
                let total = doc.get("total_citas").and_then(Value::as_u64)?;
                // Each appointment blocks a half-hour slot; capacity is
                // 10 hours a day over 22 working days.
                let horas_utilizadas = total as f64 * 0.5;
                let utilizacion = horas_utilizadas / (10.0 * 22.0) * 100.0;
                Some(json!({
                    "sala": doc.get("_id").cloned().unwrap_or(Value::Null),
                    "total_citas": total,
                    "horas_utilizadas": horas_utilizadas,
                    "utilizacion": round2(utilizacion),
                }))
            })
            .collect();

        Ok(json!({
            "periodo": { "inicio": query.inicio, "fin": query.fin },
            "tiempos_estudio": study_times,
            "productividad_tecnico": technician_load,
            "utilizacion_salas": room_usage,
        }))
    }

    async fn grouped_counts(
        &self,
        collection: &str,
        filter: Value,
        key: &str,
    ) -> Result<Vec<(String, u64)>, ReportError> {
        let pipeline = json!([
            { "$match": filter },
            { "$group": { "_id": key, "total": { "$sum": 1 } } },
        ]);

        let documents = self.store
            .aggregate(collection, pipeline)
            .await
            .map_err(db_error)?;

        Ok(documents
            .into_iter()
            .filter_map(|doc| {
                let group = doc.get("_id").and_then(Value::as_str)?.to_string();
                let total = doc.get("total").and_then(Value::as_u64)?;
                Some((group, total))
            })
            .collect())
    }

    async fn apply_update(
        &self,
        report_id: &str,
        mut update_data: Map<String, Value>,
    ) -> Result<Report, ReportError> {
        update_data.insert("fecha_actualizacion".to_string(), json!(Utc::now().to_rfc3339()));

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": report_id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(db_error)?;

        let updated = self.store
            .find_one(COLLECTION, json!({ "_id": report_id }))
            .await
            .map_err(db_error)?
            .ok_or(ReportError::NotFound)?;

        parse_report(updated)
    }
}

/// Build a report image reference from a study file record.
fn image_ref_from_file(file: &Value, estudio_id: &str, index: usize) -> Value {
    let original_name = file
        .get("original_name")
        .and_then(Value::as_str)
        .unwrap_or("archivo");
    let saved_name = file
        .get("saved_name")
        .and_then(Value::as_str)
        .unwrap_or(original_name);
    let preview_name = file
        .get("preview_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| saved_name.replace(".dcm", ".png"));

    json!({
        "archivo_dicom": saved_name,
        "archivo_png": preview_name,
        "estudio_id": estudio_id,
        "descripcion": format!("Imagen {} - {}", index + 1, original_name),
        "orden": index,
    })
}

/// Parse an inclusive YYYY-MM-DD range into RFC 3339 bounds, end exclusive.
fn parse_range(inicio: &str, fin: &str) -> Result<(String, String), ReportError> {
    let start = NaiveDate::parse_from_str(inicio, "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidDateRange)?;
    let end = NaiveDate::parse_from_str(fin, "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidDateRange)?;

    let start = start
        .and_hms_opt(0, 0, 0)
        .ok_or(ReportError::InvalidDateRange)?
        .and_utc();
    let end = (end + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .ok_or(ReportError::InvalidDateRange)?
        .and_utc();

    Ok((start.to_rfc3339(), end.to_rfc3339()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn group_object(groups: Vec<(String, u64)>) -> Value {
    let mut object = Map::new();
    for (group, total) in groups {
        object.insert(group, json!(total));
    }
    Value::Object(object)
}

fn db_error(err: anyhow::Error) -> ReportError {
    ReportError::Database(err.to_string())
}

fn parse_report(document: Value) -> Result<Report, ReportError> {
    serde_json::from_value(reshape(document))
        .map_err(|e| ReportError::Database(format!("documento de informe inválido: {}", e)))
}
