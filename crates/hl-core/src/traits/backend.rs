//! Remote backend trait

use async_trait::async_trait;
use hl_protocol::{RegisterResponse, TokenResponse};

use crate::error::BackendError;

/// Request/response operations of the remote backend API.
///
/// Implementations report transport failures and non-success statuses as
/// errors; callers apply their own deadline.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Register this instance and fetch its domain, contact and relay
    async fn register_instance(&self) -> Result<RegisterResponse, BackendError>;

    /// Request a session token bound to the given AES key material
    async fn session_token(
        &self,
        aes_key: &[u8],
        aes_iv: &[u8],
    ) -> Result<TokenResponse, BackendError>;
}
