//! Tunnel client traits

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::TransportError;

/// Parameters binding a tunnel client to its relay
#[derive(Clone)]
pub struct TunnelParams {
    /// Relay server host
    pub server: String,
    /// Relay server port
    pub port: u16,
    /// TLS context terminating forwarded connections locally
    pub tls: Arc<rustls::ServerConfig>,
}

impl std::fmt::Debug for TunnelParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelParams")
            .field("server", &self.server)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// Owner of the network connection to the relay server
#[async_trait]
pub trait TunnelClient: Send + Sync {
    /// Start accepting forwarded connections locally
    async fn start(&self) -> Result<(), TransportError>;

    /// Stop the client and drop any relay connection
    async fn stop(&self);

    /// Connect to the relay with session token material
    async fn connect(
        &self,
        auth_token: &[u8],
        aes_key: &[u8],
        aes_iv: &[u8],
        throttling: u32,
    ) -> Result<(), TransportError>;

    /// Disconnect from the relay, keeping the client started
    async fn disconnect(&self);

    /// Suspend until the relay connection is lost
    async fn wait(&self);

    /// Whether the relay connection is up
    fn is_connected(&self) -> bool;
}

/// Builds the tunnel client for one backend load cycle
pub trait TunnelFactory: Send + Sync {
    /// Create a client bound to `params`
    fn create(&self, params: TunnelParams) -> Arc<dyn TunnelClient>;
}
