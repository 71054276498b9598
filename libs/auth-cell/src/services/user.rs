use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::documents::{new_document_id, reshape, valid_document_id};
use shared_database::store::StoreClient;
use shared_models::auth::UserRole;
use shared_utils::jwt::create_token;

use crate::models::{AuthError, LoginRequest, RegisterRequest, TokenResponse, User};

const COLLECTION: &str = "users";
const PATIENTS: &str = "pacientes";

pub struct UserService {
    store: StoreClient,
    secret_key: String,
    token_expiry_minutes: i64,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            secret_key: config.secret_key.clone(),
            token_expiry_minutes: config.token_expiry_minutes,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        let existing = self.store
            .find_one(COLLECTION, json!({ "email": request.email }))
            .await
            .map_err(db_error)?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let document = self.insert_user(&request).await?;

        info!("Registered user {} with role {}", request.email, request.role.as_str());

        parse_user(document)
    }

    /// Self-service patient signup. Forces the patient role and creates a
    /// bare patient record when the account is not linked to one yet.
    /// Returns a token so the caller is logged in immediately.
    pub async fn register_patient(
        &self,
        mut request: RegisterRequest,
    ) -> Result<TokenResponse, AuthError> {
        let existing = self.store
            .find_one(COLLECTION, json!({ "email": request.email }))
            .await
            .map_err(db_error)?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        request.role = UserRole::Paciente;

        if request.paciente_id.is_none() {
            let now = Utc::now().to_rfc3339();
            let paciente_id = new_document_id();
            // Identification and contact details are completed later by
            // the clinic staff.
            let patient = json!({
                "_id": paciente_id,
                "nombre": request.nombre,
                "apellidos": request.apellidos,
                "email": request.email,
                "identificacion": "",
                "telefono": "",
                "fecha_nacimiento": now,
                "estado": "activo",
                "fecha_creacion": now,
                "fecha_actualizacion": now,
            });

            self.store
                .insert_one(PATIENTS, patient)
                .await
                .map_err(db_error)?;

            request.paciente_id = Some(paciente_id);
        }

        let document = self.insert_user(&request).await?;
        let user = parse_user(document)?;

        info!("Registered patient account {}", user.email);

        self.issue_token(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        let document = self.store
            .find_one(COLLECTION, json!({ "email": request.email }))
            .await
            .map_err(db_error)?
            .ok_or(AuthError::InvalidCredentials)?;

        let stored_hash = document
            .get("password_hash")
            .and_then(Value::as_str)
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, stored_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if document.get("is_active").and_then(Value::as_bool) == Some(false) {
            return Err(AuthError::AccountDisabled);
        }

        let user = parse_user(document)?;

        info!("Authenticated user {}", user.email);

        self.issue_token(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AuthError> {
        if !valid_document_id(user_id) {
            return Err(AuthError::UserNotFound);
        }

        let document = self.store
            .find_one(COLLECTION, json!({ "_id": user_id }))
            .await
            .map_err(db_error)?
            .ok_or(AuthError::UserNotFound)?;

        parse_user(document)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        let documents = self.store
            .find(COLLECTION, json!({}), Some(json!({ "email": 1 })), 0, 1000)
            .await
            .map_err(db_error)?;

        documents.into_iter().map(parse_user).collect()
    }

    async fn insert_user(&self, request: &RegisterRequest) -> Result<Value, AuthError> {
        let password_hash = hash_password(&request.password)?;

        let now = Utc::now().to_rfc3339();
        let document = json!({
            "_id": new_document_id(),
            "email": request.email,
            "nombre": request.nombre,
            "apellidos": request.apellidos,
            "role": request.role.as_str(),
            "is_active": request.is_active,
            "password_hash": password_hash,
            "paciente_id": request.paciente_id,
            "fecha_creacion": now,
            "fecha_actualizacion": now,
        });

        self.store
            .insert_one(COLLECTION, document.clone())
            .await
            .map_err(db_error)?;

        Ok(document)
    }

    fn issue_token(&self, user: User) -> Result<TokenResponse, AuthError> {
        let access_token = create_token(
            &user.email,
            &user.id,
            user.role,
            user.paciente_id.as_deref(),
            &self.secret_key,
            self.token_expiry_minutes,
        )
        .map_err(AuthError::Token)?;

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.token_expiry_minutes * 60,
            user,
        })
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn db_error(err: anyhow::Error) -> AuthError {
    AuthError::Database(err.to_string())
}

fn parse_user(document: Value) -> Result<User, AuthError> {
    serde_json::from_value(reshape(document))
        .map_err(|e| AuthError::Database(format!("documento de usuario inválido: {}", e)))
}
