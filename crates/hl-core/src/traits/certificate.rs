//! Certificate authority client traits

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CertificateError;
use crate::types::Certificate;

/// Client of the certificate authority that issues the TLS certificate
/// terminating the tunnel locally.
///
/// The client owns the certificate; callers only read snapshots.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Load a previously issued certificate from storage, if any
    async fn load_certificate(&self) -> Result<(), CertificateError>;

    /// Issue or renew the certificate for the client's domain
    async fn issue_certificate(&self) -> Result<(), CertificateError>;

    /// Revoke and forget the current certificate and account
    async fn reset(&self) -> Result<(), CertificateError>;

    /// Tighten permissions on the stored key material
    async fn harden_files(&self) -> Result<(), CertificateError>;

    /// Snapshot of the current certificate, `None` if none is available
    fn certificate(&self) -> Option<Certificate>;

    /// Whether a certificate exists and is currently usable
    fn is_valid_certificate(&self) -> bool;

    /// Path of the PEM full chain
    fn path_fullchain(&self) -> PathBuf;

    /// Path of the PEM private key
    fn path_private_key(&self) -> PathBuf;
}

/// Builds a certificate authority client for one backend load cycle
pub trait CertificateAuthorityFactory: Send + Sync {
    /// Create a client issuing for `domain`, registered under `email`
    fn create(&self, domain: &str, email: &str) -> Arc<dyn CertificateAuthority>;
}
