//! Brevo transactional email API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{DeliveryError, Mailer, VERIFICATION_SUBJECT, verification_body};

/// Brevo send endpoint.
const BREVO_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Clone)]
pub struct BrevoConfig {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    /// Upper bound for one send call.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoRequest<'a> {
    sender: BrevoContact<'a>,
    to: Vec<BrevoContact<'a>>,
    subject: &'a str,
    text_content: String,
}

#[derive(Debug, Serialize)]
struct BrevoContact<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
}

/// Sends verification codes through Brevo.
#[derive(Debug, Clone)]
pub struct BrevoMailer {
    client: reqwest::Client,
    config: BrevoConfig,
    url: String,
}

impl BrevoMailer {
    pub fn new(config: BrevoConfig) -> Result<Self, DeliveryError> {
        Self::with_url(config, BREVO_URL)
    }

    /// Point the mailer at a different endpoint (e.g. a local mock).
    pub fn with_url(config: BrevoConfig, url: &str) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            url: url.to_string(),
        })
    }

    fn request<'a>(&'a self, to: &'a str, code: &str) -> BrevoRequest<'a> {
        BrevoRequest {
            sender: BrevoContact {
                name: Some(self.config.sender_name.as_str()).filter(|n| !n.is_empty()),
                email: &self.config.sender_email,
            },
            to: vec![BrevoContact { name: None, email: to }],
            subject: VERIFICATION_SUBJECT,
            text_content: verification_body(code),
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&self.request(to, code))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        debug!(to, "verification email accepted by brevo");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> BrevoMailer {
        BrevoMailer::new(BrevoConfig {
            api_key: "key".into(),
            sender_email: "noreply@example.com".into(),
            sender_name: "Ident".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn request_body_matches_brevo_shape() {
        let m = mailer();
        let json = serde_json::to_value(m.request("a@b.com", "000123")).unwrap();
        assert_eq!(json["sender"]["email"], "noreply@example.com");
        assert_eq!(json["sender"]["name"], "Ident");
        assert_eq!(json["to"][0]["email"], "a@b.com");
        assert!(json["to"][0].get("name").is_none());
        assert_eq!(json["subject"], "Email Verification Code");
        assert!(json["textContent"].as_str().unwrap().contains("000123"));
    }
}
