//! hl-core: Core abstractions and configuration for homelink
//!
//! This crate provides the shared types, error taxonomy, configuration and
//! collaborator traits used by the remote access coordinator.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{BackendError, CertificateError, RemoteError, TransportError};
pub use types::{Certificate, ConnectionState, InstanceIdentity, RemoteEvent, SessionToken};
