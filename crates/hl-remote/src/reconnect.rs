//! Reconnect guard
//!
//! Watches the tunnel of one backend generation and reconnects after each
//! disconnect, waiting a random delay first so a relay outage does not
//! bring every client back at the same instant.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use hl_core::{RemoteError, RemoteEvent};

use crate::remote::RemoteUi;

pub(crate) async fn run_reconnect_guard(
    remote: Arc<RemoteUi>,
    generation: u64,
    cancel: CancellationToken,
) {
    tracing::debug!(generation, "Reconnect guard started");

    loop {
        let Some(active) = remote.active_for(generation) else {
            tracing::debug!(generation, "Backend gone, reconnect guard exiting");
            break;
        };

        if active.tunnel.is_connected() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = active.tunnel.wait() => {}
            }
        }
        // Release the handles before sleeping; teardown may be dropping them.
        drop(active);

        tracing::info!("Tunnel disconnected from relay");
        remote.host.dispatch(RemoteEvent::Disconnected);

        let delay = remote
            .config
            .reconnect_jitter
            .sample(&mut rand::thread_rng());
        tracing::debug!(?delay, "Reconnecting to relay after delay");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        match remote.connect_inner(Some(&cancel)).await {
            Ok(()) => {}
            Err(RemoteError::NotConnected) => break,
            Err(e) => tracing::debug!("Reconnect attempt failed: {}", e),
        }
        if cancel.is_cancelled() {
            break;
        }
    }

    tracing::debug!(generation, "Reconnect guard stopped");
}
