//! Host application trait

use crate::types::RemoteEvent;

/// Hooks the embedding application provides to the remote coordinator
pub trait RemoteHost: Send + Sync {
    /// Deliver a lifecycle signal
    fn dispatch(&self, event: RemoteEvent);

    /// Show or replace a persistent notification keyed by `identifier`
    fn user_message(&self, identifier: &str, title: &str, message: &str);

    /// Whether the host's network server runtime is available
    fn runtime_ready(&self) -> bool;

    /// Whether the tunnel should connect as soon as the backend is up
    fn remote_autostart(&self) -> bool;
}
