//! Backend request and response bodies
//!
//! # Message Flow
//!
//! 1. On backend load the coordinator posts to [`REGISTER_PATH`] and receives
//!    a [`RegisterResponse`] naming its domain, contact address and relay.
//! 2. Before each tunnel connect with an expired token, the coordinator
//!    generates a fresh AES key/IV pair, posts a [`TokenRequest`] to
//!    [`TOKEN_PATH`] and receives a [`TokenResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Path of the instance registration endpoint
pub const REGISTER_PATH: &str = "/register_instance";

/// Path of the session token endpoint
pub const TOKEN_PATH: &str = "/snitun_token";

/// Registration details assigned to this instance by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Public domain of the instance
    pub domain: String,
    /// Contact address used for certificate registration
    pub email: String,
    /// Relay server the tunnel connects to
    pub server: String,
}

impl RegisterResponse {
    /// Reject responses the coordinator cannot act on
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.domain.is_empty() {
            return Err(ProtocolError::MissingField("domain"));
        }
        if self.server.is_empty() {
            return Err(ProtocolError::MissingField("server"));
        }
        Ok(())
    }
}

/// Body of a session token request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Hex-encoded AES key
    pub aes_key: String,
    /// Hex-encoded AES IV
    pub aes_iv: String,
}

impl TokenRequest {
    /// Build a request from raw key material
    pub fn new(aes_key: &[u8], aes_iv: &[u8]) -> Self {
        Self {
            aes_key: hex::encode(aes_key),
            aes_iv: hex::encode(aes_iv),
        }
    }
}

/// Session token issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque token presented to the relay
    pub token: String,
    /// Unix timestamp (seconds) until which the token is accepted
    pub valid: i64,
    /// Throttling rate the relay applies to this session
    pub throttling: u32,
}

impl TokenResponse {
    /// Expiry of the token as a UTC timestamp
    pub fn valid_until(&self) -> Result<DateTime<Utc>, ProtocolError> {
        DateTime::from_timestamp(self.valid, 0).ok_or(ProtocolError::InvalidTimestamp(self.valid))
    }
}
