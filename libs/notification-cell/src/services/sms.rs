use reqwest::Client;
use serde_json::json;
use tracing::{error, info, warn};

use shared_config::AppConfig;

/// Client for the SMS gateway's HTTP API. Like the mail client, it
/// degrades to a logged no-op when unconfigured.
pub struct SmsService {
    client: Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl SmsService {
    pub fn new(config: &AppConfig) -> Self {
        if !config.is_sms_configured() {
            warn!("SMS gateway not configured, text messages will not be sent");
        }

        Self {
            client: Client::new(),
            api_url: config.sms_api_url.clone(),
            api_key: config.sms_api_key.clone(),
            sender: config.sms_from.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }

    pub async fn send_sms(&self, to: &str, message: &str) -> bool {
        if !self.is_configured() {
            error!("SMS gateway not configured, dropping message to {}", to);
            return false;
        }

        let payload = json!({
            "to": to,
            "message": message,
            "sender": self.sender,
            "api_key": self.api_key,
        });

        let response = self.client
            .post(&self.api_url)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!("SMS sent to {}", to);
                true
            }
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                error!("SMS gateway error ({}): {}", status, text);
                false
            }
            Err(err) => {
                error!("Error sending SMS to {}: {}", to, err);
                false
            }
        }
    }
}
