use reqwest::Client;
use serde_json::json;
use tracing::{error, info, warn};

use shared_config::AppConfig;

/// Thin client for the transactional mail provider's HTTP API.
///
/// Sends degrade to a logged no-op when the provider is not configured,
/// so environments without mail credentials still run.
pub struct EmailService {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailService {
    pub fn new(config: &AppConfig) -> Self {
        if !config.is_mail_configured() {
            warn!("Mail provider not configured, emails will not be sent");
        }

        Self {
            client: Client::new(),
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }

    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> bool {
        if !self.is_configured() {
            error!("Mail provider not configured, dropping email to {}", to);
            return false;
        }

        let payload = json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let response = self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!("Email sent to {}", to);
                true
            }
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                error!("Mail provider error ({}): {}", status, text);
                false
            }
            Err(err) => {
                error!("Error sending email to {}: {}", to, err);
                false
            }
        }
    }
}
