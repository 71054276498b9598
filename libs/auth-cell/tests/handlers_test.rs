use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use axum::extract::{Extension, State};
use axum::Json;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::handlers::*;
use auth_cell::models::{LoginRequest, RegisterRequest};
use shared_models::auth::UserRole;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockStoreResponses, TestConfig, TestUser};

fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

fn user_row(email: &str, password_hash: &str, is_active: bool) -> serde_json::Value {
    json!({
        "_id": uuid::Uuid::new_v4().to_string(),
        "email": email,
        "nombre": "Laura",
        "apellidos": "Gómez",
        "role": "secretario",
        "is_active": is_active,
        "password_hash": password_hash,
        "paciente_id": null,
        "fecha_creacion": chrono::Utc::now().to_rfc3339(),
        "fecha_actualizacion": chrono::Utc::now().to_rfc3339()
    })
}

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        nombre: "Laura".to_string(),
        apellidos: Some("Gómez".to_string()),
        role: UserRole::Secretario,
        is_active: true,
        password: "una-contraseña-larga".to_string(),
        paciente_id: None,
    }
}

#[tokio::test]
async fn registering_a_taken_email_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            user_row("laura@clinic.test", "$argon2id$whatever", true),
        )))
        .mount(&mock_server)
        .await;

    let result = register_user(State(config), Json(register_request("laura@clinic.test"))).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn registration_stores_a_hash_and_never_returns_it() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one_missing()))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "users" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockStoreResponses::inserted("u-1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = register_user(State(config), Json(register_request("nueva@clinic.test"))).await;

    let response = result.unwrap().0;
    assert_eq!(response["email"], "nueva@clinic.test");
    assert!(response.get("password_hash").is_none());
    assert!(response.get("password").is_none());

    let requests = mock_server.received_requests().await.unwrap();
    let insert = requests
        .iter()
        .find(|r| r.url.path() == "/action/insertOne")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    let stored = body["document"]["password_hash"].as_str().unwrap();
    assert!(stored.starts_with("$argon2"));
    assert_ne!(stored, "una-contraseña-larga");
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            user_row("laura@clinic.test", &hash("la-correcta"), true),
        )))
        .mount(&mock_server)
        .await;

    let request = LoginRequest {
        email: "laura@clinic.test".to_string(),
        password: "otra-cosa".to_string(),
    };

    let result = login_user(State(config), Json(request)).await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn login_issues_a_bearer_token() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            user_row("laura@clinic.test", &hash("la-correcta"), true),
        )))
        .mount(&mock_server)
        .await;

    let request = LoginRequest {
        email: "laura@clinic.test".to_string(),
        password: "la-correcta".to_string(),
    };

    let result = login_user(State(config), Json(request)).await;

    let response = result.unwrap().0;
    assert_eq!(response["token_type"], "bearer");
    assert!(!response["access_token"].as_str().unwrap().is_empty());
    assert_eq!(response["user"]["email"], "laura@clinic.test");
    assert!(response["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn disabled_accounts_cannot_log_in() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one(
            user_row("laura@clinic.test", &hash("la-correcta"), false),
        )))
        .mount(&mock_server)
        .await;

    let request = LoginRequest {
        email: "laura@clinic.test".to_string(),
        password: "la-correcta".to_string(),
    };

    let result = login_user(State(config), Json(request)).await;

    match result {
        Err(AppError::Auth(message)) => assert_eq!(message, "Cuenta desactivada"),
        other => panic!("expected auth error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn only_admins_can_list_users() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    let result = list_users(
        State(config),
        Extension(TestUser::tecnico("tec@clinic.test").to_auth_user()),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn patient_signup_creates_the_patient_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one_missing()))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "pacientes" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockStoreResponses::inserted("p-1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "users" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockStoreResponses::inserted("u-1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut request = register_request("paciente@clinic.test");
    request.role = UserRole::Admin; // must be overridden to paciente

    let result = register_patient(State(config), Json(request)).await;

    let response = result.unwrap().0;
    assert_eq!(response["user"]["role"], "paciente");
    assert!(response["user"]["paciente_id"].is_string());
    assert!(!response["access_token"].as_str().unwrap().is_empty());
}
