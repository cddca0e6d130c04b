//! hl-remote: Remote access coordinator for homelink
//!
//! Keeps the instance reachable through a relay server: registers with the
//! remote backend, keeps the TLS certificate renewed, refreshes session
//! tokens and reconnects the tunnel after unexpected disconnects.

pub mod api;
pub mod certificate;
mod reconnect;
pub mod remote;
mod state;
pub mod task;
pub mod tls;
pub mod token;

pub use api::HttpBackend;
pub use certificate::CertificateCheck;
pub use remote::{RemoteUi, CERTIFICATE_MESSAGE_ID};
pub use token::TokenRefresher;
