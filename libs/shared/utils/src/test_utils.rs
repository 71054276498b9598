use std::sync::Arc;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, UserRole};

use crate::jwt::create_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub store_api_url: String,
    pub store_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            store_api_url: "http://localhost:54321".to_string(),
            store_api_key: "test-api-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_store_url(store_url: &str) -> Self {
        Self {
            store_api_url: store_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            store_api_url: self.store_api_url.clone(),
            store_api_key: self.store_api_key.clone(),
            store_data_source: "Cluster0".to_string(),
            database_name: "imagenologia_test".to_string(),
            secret_key: self.jwt_secret.clone(),
            token_expiry_minutes: 60,
            mail_api_url: String::new(),
            mail_api_key: String::new(),
            mail_from: "notificaciones@ips.com".to_string(),
            sms_api_url: String::new(),
            sms_api_key: String::new(),
            sms_from: String::new(),
            dicom_upload_dir: "uploads/dicom".to_string(),
            cors_allowed_origins: String::new(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub paciente_id: Option<String>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: UserRole::Secretario,
            paciente_id: None,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role,
            paciente_id: None,
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, UserRole::Admin)
    }

    pub fn radiologo(email: &str) -> Self {
        Self::new(email, UserRole::Radiologo)
    }

    pub fn tecnico(email: &str) -> Self {
        Self::new(email, UserRole::Tecnico)
    }

    pub fn paciente(email: &str, paciente_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: UserRole::Paciente,
            paciente_id: Some(paciente_id.to_string()),
        }
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
            paciente_id: self.paciente_id.clone(),
        }
    }

    pub fn bearer_token(&self, secret: &str) -> String {
        create_token(
            &self.email,
            &self.id,
            self.role,
            self.paciente_id.as_deref(),
            secret,
            60,
        )
        .expect("token creation should not fail in tests")
    }
}

/// Canned store data API response bodies for wiremock.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn find_one(document: Value) -> Value {
        json!({ "document": document })
    }

    pub fn find_one_missing() -> Value {
        json!({ "document": null })
    }

    pub fn find(documents: Vec<Value>) -> Value {
        json!({ "documents": documents })
    }

    pub fn inserted(id: &str) -> Value {
        json!({ "insertedId": id })
    }

    pub fn updated(matched: u64, modified: u64) -> Value {
        json!({ "matchedCount": matched, "modifiedCount": modified })
    }

    pub fn deleted(count: u64) -> Value {
        json!({ "deletedCount": count })
    }

    pub fn patient(id: &str, email: &str, nombre: &str) -> Value {
        json!({
            "_id": id,
            "nombre": nombre,
            "apellidos": "Prueba",
            "identificacion": "123456",
            "email": email,
            "telefono": "3000000000",
            "fecha_nacimiento": "1990-01-01T00:00:00+00:00",
            "estado": "activo",
            "fecha_creacion": Utc::now().to_rfc3339(),
            "fecha_actualizacion": Utc::now().to_rfc3339()
        })
    }

    pub fn study(id: &str, paciente_id: &str, estado: &str) -> Value {
        json!({
            "_id": id,
            "paciente_id": paciente_id,
            "tipo_estudio": "Radiografía de Tórax",
            "medico_solicitante": "Dr. Prueba",
            "prioridad": "normal",
            "estado": estado,
            "archivos_dicom": [],
            "fecha_solicitud": Utc::now().to_rfc3339(),
            "fecha_actualizacion": Utc::now().to_rfc3339()
        })
    }
}
