//! Remote account validation seam.
//!
//! The engine consumes a single capability from the identity backend:
//! "does this user id still name a valid account?". The manager applies the
//! fail-closed policy — an `Err` from the validator is handled exactly like
//! `Ok(false)` — so implementations report errors honestly instead of
//! guessing.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{SessionError, SessionResult};

/// Answers whether a user account still exists in the remote backend.
#[async_trait]
pub trait AccountValidator: Send + Sync {
    /// Check the account behind `user_id`.
    async fn exists(&self, user_id: &str) -> SessionResult<bool>;
}

/// HTTP implementation of [`AccountValidator`].
///
/// Issues `GET {base}/accounts/{user_id}`: 2xx means the account exists,
/// 404 or 410 means it is gone, anything else is an error (which the
/// manager fails closed on).
pub struct HttpAccountValidator {
    client: reqwest::Client,
    base: Url,
}

impl HttpAccountValidator {
    /// Create a validator against the given backend base URL.
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    fn endpoint(&self, user_id: &str) -> SessionResult<Url> {
        Ok(self.base.join(&format!("accounts/{user_id}"))?)
    }
}

#[async_trait]
impl AccountValidator for HttpAccountValidator {
    async fn exists(&self, user_id: &str) -> SessionResult<bool> {
        let endpoint = self.endpoint(user_id)?;
        debug!(url = %endpoint, "validating account");

        let response = self.client.get(endpoint).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(false);
        }
        Err(SessionError::Backend {
            status: status.as_u16(),
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
