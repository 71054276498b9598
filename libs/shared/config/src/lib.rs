use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_api_url: String,
    pub store_api_key: String,
    pub store_data_source: String,
    pub database_name: String,
    pub secret_key: String,
    pub token_expiry_minutes: i64,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub sms_api_url: String,
    pub sms_api_key: String,
    pub sms_from: String,
    pub dicom_upload_dir: String,
    pub cors_allowed_origins: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_api_url: env::var("STORE_API_URL")
                .unwrap_or_else(|_| {
                    warn!("STORE_API_URL not set, using empty value");
                    String::new()
                }),
            store_api_key: env::var("STORE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORE_API_KEY not set, using empty value");
                    String::new()
                }),
            store_data_source: env::var("STORE_DATA_SOURCE")
                .unwrap_or_else(|_| "Cluster0".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "imagenologia_db".to_string()),
            secret_key: env::var("SECRET_KEY")
                .unwrap_or_else(|_| {
                    warn!("SECRET_KEY not set, using empty value");
                    String::new()
                }),
            token_expiry_minutes: env::var("TOKEN_EXPIRY_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            mail_api_url: env::var("MAIL_API_URL").unwrap_or_default(),
            mail_api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "notificaciones@ips.com".to_string()),
            sms_api_url: env::var("SMS_API_URL").unwrap_or_default(),
            sms_api_key: env::var("SMS_API_KEY").unwrap_or_default(),
            sms_from: env::var("SMS_FROM").unwrap_or_default(),
            dicom_upload_dir: env::var("DICOM_UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads/dicom".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_api_url.is_empty()
            && !self.store_api_key.is_empty()
            && !self.secret_key.is_empty()
    }

    pub fn is_mail_configured(&self) -> bool {
        !self.mail_api_url.is_empty() && !self.mail_api_key.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.sms_api_url.is_empty() && !self.sms_api_key.is_empty()
    }
}
