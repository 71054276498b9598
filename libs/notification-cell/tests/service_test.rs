use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::models::{CreateNotificationRequest, NotificationError, NotificationType};
use notification_cell::services::NotificationService;
use shared_utils::test_utils::{MockStoreResponses, TestConfig};

fn notification_row(id: &str, tipo: &str, enviada: bool) -> serde_json::Value {
    json!({
        "_id": id,
        "paciente_id": "pac-1",
        "tipo": tipo,
        "mensaje": "Su estudio ha sido completado.",
        "estudio_id": "est-1",
        "titulo": "Estudio Completado",
        "prioridad": "normal",
        "enviada": enviada,
        "fecha_creacion": chrono::Utc::now().to_rfc3339(),
        "fecha_envio": null,
        "intentos_envio": 0,
        "ultimo_intento": null
    })
}

#[tokio::test]
async fn create_notification_queues_an_unsent_row() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
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
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({
            "collection": "notificaciones",
            "document": { "enviada": false, "intentos_envio": 0 },
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockStoreResponses::inserted("not-1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config);
    let notification = service
        .create_notification(CreateNotificationRequest {
            paciente_id,
            tipo: NotificationType::Email,
            mensaje: "Hola".to_string(),
            estudio_id: None,
            titulo: None,
            prioridad: "normal".to_string(),
        })
        .await
        .unwrap();

    assert!(!notification.enviada);
    assert_eq!(notification.intentos_envio, 0);
}

#[tokio::test]
async fn successful_delivery_marks_the_row_sent() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    config.mail_api_url = format!("{}/mail/send", mock_server.uri());
    config.mail_api_key = "mail-key".to_string();

    let notification_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "notificaciones" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            notification_row(&notification_id, "email", false),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient("pac-1", "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({ "update": { "$set": { "enviada": true } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::updated(1, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config);
    let sent = service.deliver(&notification_id).await.unwrap();

    assert!(sent);
}

#[tokio::test]
async fn failed_delivery_increments_the_attempt_counter() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    config.mail_api_url = format!("{}/mail/send", mock_server.uri());
    config.mail_api_key = "mail-key".to_string();

    let notification_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "notificaciones" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            notification_row(&notification_id, "email", false),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient("pac-1", "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({ "update": { "$inc": { "intentos_envio": 1 } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::updated(1, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config);
    let sent = service.deliver(&notification_id).await.unwrap();

    assert!(!sent);
}

#[tokio::test]
async fn unconfigured_mail_provider_fails_without_calling_out() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();

    let notification_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "notificaciones" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            notification_row(&notification_id, "email", false),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient("pac-1", "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::updated(1, 1)))
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config);
    let sent = service.deliver(&notification_id).await.unwrap();

    assert!(!sent);
}

#[tokio::test]
async fn resend_is_refused_for_delivered_rows() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    let notification_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            notification_row(&notification_id, "sms", true),
        )))
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config);
    let result = service.prepare_resend(&notification_id).await;

    assert!(matches!(result, Err(NotificationError::AlreadySent)));
}

#[tokio::test]
async fn study_state_without_patient_message_queues_nothing() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    let estudio_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "estudios" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::study(&estudio_id, "pac-1", "pendiente"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient("pac-1", "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config);
    let queued = service.notify_study_state(&estudio_id).await.unwrap();

    assert!(queued.is_none());
}

#[tokio::test]
async fn completed_study_queues_email_and_sms() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    let estudio_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "estudios" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::study(&estudio_id, "pac-1", "completado"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            MockStoreResponses::patient("pac-1", "ana@clinic.test", "Ana"),
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "notificaciones" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockStoreResponses::inserted("not-x")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config);
    let queued = service.notify_study_state(&estudio_id).await.unwrap().unwrap();

    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].tipo, NotificationType::Email);
    assert_eq!(queued[1].tipo, NotificationType::Sms);
}
