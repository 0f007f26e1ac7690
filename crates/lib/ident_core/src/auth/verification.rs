//! One-time email verification codes.
//!
//! A code is six decimal digits, stored in the [`CodeCache`] under
//! `verify:<email>` for five minutes. Issuing a new code overwrites the old
//! one. A wrong guess leaves the stored code in place; only a successful
//! [`VerificationCodes::confirm`] removes it.

use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, rng};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::AuthError;
use crate::cache::CodeCache;
use crate::email::Mailer;

/// Lifetime of a verification code.
pub const CODE_TTL: Duration = Duration::from_secs(5 * 60);

const KEY_PREFIX: &str = "verify:";

/// Cache key for an email's pending code.
pub fn code_key(email: &str) -> String {
    format!("{KEY_PREFIX}{email}")
}

/// Uniformly random six-digit code, leading zeros kept.
pub fn generate_code() -> String {
    format!("{:06}", rng().random_range(0..1_000_000u32))
}

/// Issues, checks and invalidates verification codes.
#[derive(Clone)]
pub struct VerificationCodes {
    cache: Arc<dyn CodeCache>,
    mailer: Arc<dyn Mailer>,
    ttl: Duration,
    /// Background deliveries started by [`VerificationCodes::issue_detached`].
    deliveries: TaskTracker,
}

impl VerificationCodes {
    pub fn new(cache: Arc<dyn CodeCache>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            cache,
            mailer,
            ttl: CODE_TTL,
            deliveries: TaskTracker::new(),
        }
    }

    /// Tracker for background deliveries. Close and wait on it at shutdown.
    pub fn deliveries(&self) -> &TaskTracker {
        &self.deliveries
    }

    /// Store a fresh code and return it without sending anything.
    async fn store(&self, email: &str) -> Result<String, AuthError> {
        let code = generate_code();
        self.cache.set(&code_key(email), &code, self.ttl).await?;
        debug!(email, "verification code stored");
        Ok(code)
    }

    /// Store a fresh code and deliver it, waiting for the mailer.
    pub async fn issue(&self, email: &str) -> Result<String, AuthError> {
        let code = self.store(email).await?;
        self.mailer.send_verification_code(email, &code).await?;
        Ok(code)
    }

    /// Store a fresh code and hand delivery to a background task.
    ///
    /// Delivery failure is logged, never returned.
    pub async fn issue_detached(&self, email: &str) -> Result<String, AuthError> {
        let code = self.store(email).await?;
        let mailer = Arc::clone(&self.mailer);
        let to = email.to_string();
        let sent = code.clone();
        self.deliveries.spawn(async move {
            if let Err(e) = mailer.send_verification_code(&to, &sent).await {
                warn!(email = %to, error = %e, "verification email delivery failed");
            }
        });
        Ok(code)
    }

    /// Consume the stored code if it equals `code`.
    ///
    /// The compare and the delete are one cache operation, so concurrent
    /// confirmations of the same code succeed at most once.
    pub async fn confirm(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let key = code_key(email);
        if self.cache.delete_if_eq(&key, code).await? {
            return Ok(());
        }
        match self.cache.get(&key).await? {
            None => Err(AuthError::CodeExpiredOrMissing),
            Some(_) => Err(AuthError::CodeMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::email::{DeliveryError, LogMailer};

    /// Records deliveries after a short delay.
    #[derive(Default)]
    struct SlowMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for SlowMailer {
        async fn send_verification_code(&self, to: &str, _code: &str) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.sent.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    fn codes() -> VerificationCodes {
        VerificationCodes::new(Arc::new(MemoryCache::new()), Arc::new(LogMailer))
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn key_is_prefixed_by_email() {
        assert_eq!(code_key("a@b.com"), "verify:a@b.com");
    }

    #[tokio::test]
    async fn exact_code_confirms_once() {
        let codes = codes();
        let code = codes.issue("a@b.com").await.unwrap();
        codes.confirm("a@b.com", &code).await.unwrap();
        assert!(matches!(
            codes.confirm("a@b.com", &code).await,
            Err(AuthError::CodeExpiredOrMissing)
        ));
    }

    #[tokio::test]
    async fn wrong_code_does_not_consume() {
        let codes = codes();
        let code = codes.issue("a@b.com").await.unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(matches!(
            codes.confirm("a@b.com", wrong).await,
            Err(AuthError::CodeMismatch)
        ));
        codes.confirm("a@b.com", &code).await.unwrap();
    }

    #[tokio::test]
    async fn reissue_overwrites_previous_code() {
        let codes = codes();
        let first = codes.issue("a@b.com").await.unwrap();
        let second = codes.issue_detached("a@b.com").await.unwrap();
        if first != second {
            assert!(matches!(
                codes.confirm("a@b.com", &first).await,
                Err(AuthError::CodeMismatch)
            ));
        }
        codes.confirm("a@b.com", &second).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_email_has_no_code() {
        assert!(matches!(
            codes().confirm("nobody@b.com", "123456").await,
            Err(AuthError::CodeExpiredOrMissing)
        ));
    }

    #[tokio::test]
    async fn concurrent_confirmations_succeed_once() {
        let codes = codes();
        let code = codes.issue("a@b.com").await.unwrap();
        let (first, second) = tokio::join!(
            codes.confirm("a@b.com", &code),
            codes.confirm("a@b.com", &code)
        );
        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn detached_deliveries_can_be_awaited() {
        let mailer = Arc::new(SlowMailer::default());
        let codes = VerificationCodes::new(Arc::new(MemoryCache::new()), mailer.clone());
        codes.issue_detached("a@b.com").await.unwrap();
        codes.issue_detached("c@d.com").await.unwrap();

        let deliveries = codes.deliveries().clone();
        deliveries.close();
        deliveries.wait().await;
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);
    }
}
