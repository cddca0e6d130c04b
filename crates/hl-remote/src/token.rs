//! Session token refresh
//!
//! A token is reused while it is valid and replaced by a fresh backend
//! request once `valid_until` has passed. Each refresh generates new AES key
//! material that the backend binds to the token.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;

use hl_core::time::until;
use hl_core::traits::RemoteBackend;
use hl_core::{BackendError, SessionToken};

/// AES key length in bytes
pub const AES_KEY_LEN: usize = 32;

/// AES IV length in bytes
pub const AES_IV_LEN: usize = 16;

/// Generate a fresh AES key and IV
pub fn generate_aes_keyset() -> (Bytes, Bytes) {
    let key: [u8; AES_KEY_LEN] = rand::random();
    let iv: [u8; AES_IV_LEN] = rand::random();
    (Bytes::copy_from_slice(&key), Bytes::copy_from_slice(&iv))
}

/// Acquires and caches the session token for one backend load cycle
pub struct TokenRefresher {
    backend: Arc<dyn RemoteBackend>,
    timeout: Duration,
    token: Mutex<Option<SessionToken>>,
}

impl TokenRefresher {
    /// Create a refresher with no cached token
    pub fn new(backend: Arc<dyn RemoteBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            token: Mutex::new(None),
        }
    }

    /// Return a usable token, requesting a new one if the cached token
    /// expired or none exists.
    ///
    /// Concurrent callers are serialized; the second caller reuses the
    /// token the first one obtained.
    pub async fn refresh(&self) -> Result<SessionToken, BackendError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now()) {
                tracing::debug!("Session token still valid, not refreshing");
                return Ok(token.clone());
            }
        }

        let (aes_key, aes_iv) = generate_aes_keyset();
        let response = tokio::time::timeout(
            self.timeout,
            self.backend.session_token(&aes_key, &aes_iv),
        )
        .await
        .map_err(|_| BackendError::Timeout(self.timeout))??;

        let token = SessionToken {
            valid_until: response.valid_until()?,
            auth_token: Bytes::from(response.token.into_bytes()),
            aes_key,
            aes_iv,
            throttling: response.throttling,
        };
        tracing::debug!(
            valid_until = %token.valid_until,
            expires_in = ?until(token.valid_until, Utc::now()),
            throttling = token.throttling,
            "Session token refreshed"
        );

        *cached = Some(token.clone());
        Ok(token)
    }

    /// The cached token, if any, regardless of validity
    pub async fn current(&self) -> Option<SessionToken> {
        self.token.lock().await.clone()
    }
}
