use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::handlers::*;
use appointment_cell::models::{
    AppointmentListQuery, AttendanceQuery, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{MockStoreResponses, TestConfig, TestUser};

fn staff_user() -> Extension<shared_models::auth::AuthUser> {
    Extension(TestUser::default().to_auth_user())
}

fn cita_row(id: &str, paciente_id: &str, estado: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "paciente_id": paciente_id,
        "fecha_cita": "2026-09-01T10:00:00+00:00",
        "tipo_estudio": "Radiografía de Tórax",
        "tipo_cita": "Consulta General",
        "observaciones": null,
        "estado": estado,
        "estudio_id": null,
        "tecnico_asignado": "tec-1",
        "sala": "Sala 1",
        "duracion_minutos": 30,
        "asistio": null,
        "fecha_creacion": chrono::Utc::now().to_rfc3339(),
        "fecha_actualizacion": chrono::Utc::now().to_rfc3339()
    })
}

fn create_request(paciente_id: &str) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        paciente_id: paciente_id.to_string(),
        fecha_cita: "2026-09-01T10:00:00Z".parse().unwrap(),
        tipo_estudio: "Radiografía de Tórax".to_string(),
        tipo_cita: "Consulta General".to_string(),
        observaciones: None,
        estudio_id: None,
        tecnico_asignado: Some("tec-1".to_string()),
        sala: Some("Sala 1".to_string()),
        duracion_minutos: 30,
    }
}

#[tokio::test]
async fn booking_a_taken_slot_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();
    let paciente_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient(&paciente_id, "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({
            "collection": "citas",
            "filter": { "fecha_cita": "2026-09-01T10:00:00+00:00" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            cita_row("cita-1", &paciente_id, "programada"),
        )))
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(config),
        staff_user(),
        None,
        Json(create_request(&paciente_id)),
    )
    .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn busy_technician_blocks_the_slot_even_in_another_room() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();
    let paciente_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient(&paciente_id, "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    // The existing booking holds tec-1 in Sala 1; the request asks for
    // Sala 2, so only the technician arm of the check can match.
    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({
            "collection": "citas",
            "filter": {
                "fecha_cita": "2026-09-01T10:00:00+00:00",
                "$or": [
                    { "sala": "Sala 2" },
                    { "tecnico_asignado": "tec-1" },
                ],
            },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            cita_row("cita-1", &paciente_id, "programada"),
        )))
        .mount(&mock_server)
        .await;

    let mut request = create_request(&paciente_id);
    request.sala = Some("Sala 2".to_string());

    let result = create_appointment(State(config), staff_user(), None, Json(request)).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn booking_a_free_slot_queues_confirmations() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();
    let paciente_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient(&paciente_id, "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "citas" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one_missing()))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "citas" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockStoreResponses::inserted("cita-9")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/find"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find(vec![
            MockStoreResponses::patient(&paciente_id, "ana@clinic.test", "Ana"),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "notificaciones" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockStoreResponses::inserted("not-1")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(config),
        staff_user(),
        None,
        Json(create_request(&paciente_id)),
    )
    .await;

    let response = result.unwrap().0;
    assert_eq!(response["estado"], "programada");
    assert_eq!(response["paciente_nombre"], "Ana");
}

#[tokio::test]
async fn cancelling_resets_the_linked_study() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();
    let cita_id = uuid::Uuid::new_v4().to_string();
    let estudio_id = uuid::Uuid::new_v4().to_string();

    let mut cita = cita_row(&cita_id, "pac-1", "programada");
    cita["estudio_id"] = json!(estudio_id);

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(cita)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({
            "collection": "citas",
            "update": { "$set": { "estado": "cancelada" } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::updated(1, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({
            "collection": "estudios",
            "update": { "$set": { "estado": "pendiente" } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::updated(1, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(State(config), staff_user(), Path(cita_id)).await;

    let response = result.unwrap().0;
    assert_eq!(response["message"], "Cita cancelada correctamente");
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();
    let cita_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            cita_row(&cita_id, "pac-1", "cancelada"),
        )))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(State(config), staff_user(), Path(cita_id)).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn missed_appointment_is_marked_no_asistio() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();
    let cita_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            cita_row(&cita_id, "pac-1", "programada"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({
            "update": { "$set": { "asistio": false, "estado": "no_asistio" } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::updated(1, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = update_attendance(
        State(config),
        staff_user(),
        Path(cita_id),
        Query(AttendanceQuery { asistio: false }),
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn rescheduling_into_a_taken_slot_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();
    let cita_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "filter": { "_id": cita_id } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            cita_row(&cita_id, "pac-1", "programada"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({
            "filter": { "fecha_cita": "2026-09-02T09:00:00+00:00" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            cita_row("cita-other", "pac-2", "programada"),
        )))
        .mount(&mock_server)
        .await;

    let request = UpdateAppointmentRequest {
        fecha_cita: Some("2026-09-02T09:00:00Z".parse().unwrap()),
        ..UpdateAppointmentRequest::default()
    };

    let result = update_appointment(State(config), staff_user(), Path(cita_id), Json(request)).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn bad_date_filter_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    let query = AppointmentListQuery {
        fecha: Some("01-09-2026".to_string()),
        ..AppointmentListQuery::default()
    };

    let result = list_appointments(State(config), staff_user(), Query(query)).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}
