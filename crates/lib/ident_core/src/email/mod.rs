//! Outbound email for verification codes.

mod brevo;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use self::brevo::{BrevoConfig, BrevoMailer};

/// Subject line for verification emails.
pub const VERIFICATION_SUBJECT: &str = "Email Verification Code";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),
}

/// Email collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), DeliveryError>;
}

/// Plain-text body of a verification email.
pub fn verification_body(code: &str) -> String {
    format!("Your verification code is: {code}\n\nThis code expires in 5 minutes.")
}

/// Mailer that only logs. Used when no email API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), DeliveryError> {
        info!(to, code, "email delivery disabled, verification code logged");
        Ok(())
    }
}
