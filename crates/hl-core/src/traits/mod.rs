//! Collaborator trait definitions

mod backend;
mod certificate;
mod host;
mod tunnel;

pub use backend::RemoteBackend;
pub use certificate::{CertificateAuthority, CertificateAuthorityFactory};
pub use host::RemoteHost;
pub use tunnel::{TunnelClient, TunnelFactory, TunnelParams};
