//! Core domain types

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity assigned to this instance by the backend registration call.
///
/// Fixed for one backend load cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIdentity {
    /// Public domain of the instance
    pub domain: String,
    /// Relay server the tunnel connects to
    pub relay_server: String,
    /// Contact address used for certificate registration
    pub contact: String,
}

/// Snapshot of the certificate held by the certificate authority client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Subject common name
    pub common_name: String,
    /// Expiry (not-after) of the certificate
    pub expire_date: DateTime<Utc>,
    /// Certificate fingerprint as reported by the authority client
    pub fingerprint: String,
}

/// Short-lived credential and key material authorizing one tunnel connection
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Opaque token presented to the relay
    pub auth_token: Bytes,
    /// Symmetric key for the tunnel payload
    pub aes_key: Bytes,
    /// Symmetric IV for the tunnel payload
    pub aes_iv: Bytes,
    /// Instant from which the token must be refreshed
    pub valid_until: DateTime<Utc>,
    /// Throttling rate the relay applies to this session
    pub throttling: u32,
}

impl SessionToken {
    /// Whether the token can still be used at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }
}

// Key material stays out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("valid_until", &self.valid_until)
            .field("throttling", &self.throttling)
            .finish_non_exhaustive()
    }
}

/// Connection state of the remote coordinator, derived from the backend
/// phase, the tunnel liveness flag and the reconnect supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No backend loaded
    NoBackend,
    /// Backend registration or setup in progress
    BackendLoading,
    /// Backend ready, tunnel not connected
    Disconnected,
    /// Connect attempt in flight
    Connecting,
    /// Tunnel connected
    Connected,
    /// Tunnel down, reconnect supervisor waiting to retry
    ReconnectPending,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::NoBackend => write!(f, "no backend"),
            ConnectionState::BackendLoading => write!(f, "backend loading"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::ReconnectPending => write!(f, "reconnect pending"),
        }
    }
}

/// Lifecycle signal emitted to the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteEvent {
    /// Tunnel client constructed and started
    BackendUp,
    /// Backend torn down
    BackendDown,
    /// Tunnel connected to the relay
    Connected,
    /// Tunnel disconnected from the relay
    Disconnected,
}

impl fmt::Display for RemoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteEvent::BackendUp => write!(f, "remote_backend_up"),
            RemoteEvent::BackendDown => write!(f, "remote_backend_down"),
            RemoteEvent::Connected => write!(f, "remote_connect"),
            RemoteEvent::Disconnected => write!(f, "remote_disconnect"),
        }
    }
}
