//! TLS context for connections forwarded through the tunnel

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;

use hl_core::CertificateError;

/// Build a server TLS context from a PEM full chain and private key.
///
/// Reads files synchronously; call from a blocking context.
pub fn server_context(
    fullchain: &Path,
    private_key: &Path,
) -> Result<Arc<ServerConfig>, CertificateError> {
    let chain = CertificateDer::pem_file_iter(fullchain)
        .map_err(|e| {
            CertificateError::Tls(format!("Failed to read {}: {}", fullchain.display(), e))
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            CertificateError::Tls(format!("Failed to parse {}: {}", fullchain.display(), e))
        })?;

    if chain.is_empty() {
        return Err(CertificateError::Tls(format!(
            "No certificate found in {}",
            fullchain.display()
        )));
    }

    let key = PrivateKeyDer::from_pem_file(private_key).map_err(|e| {
        CertificateError::Tls(format!("Failed to read {}: {}", private_key.display(), e))
    })?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| CertificateError::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .map_err(|e| CertificateError::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
