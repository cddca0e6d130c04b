//! Certificate handler
//!
//! Perpetual background task that wakes once per night, at local midnight
//! plus a random offset, and runs [`RemoteUi::check_certificate`]. The offset
//! spreads renewals of many instances over the first hour of the day.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tokio_util::sync::CancellationToken;

use hl_core::time::until_next_midnight;

use crate::remote::RemoteUi;

/// Outcome of one certificate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateCheck {
    /// No backend was ready; a load was attempted instead
    LoadedBackend,
    /// Certificate expires beyond the renewal threshold
    NotDue,
    /// Certificate renewed and backend reloaded
    Renewed,
    /// Renewal attempted and failed
    RenewalFailed,
}

/// Whether a certificate expiring at `expire_date` must be renewed at `now`.
///
/// A certificate without a known expiry is always due.
pub fn renewal_due(
    expire_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> bool {
    match expire_date {
        Some(expire_date) => expire_date <= now + threshold,
        None => true,
    }
}

/// Whether a failed renewal is close enough to expiry to warn about
pub fn renewal_urgent(
    expire_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    warn_threshold: chrono::Duration,
) -> bool {
    renewal_due(expire_date, now, warn_threshold)
}

pub(crate) async fn run_certificate_handler(remote: Arc<RemoteUi>, cancel: CancellationToken) {
    tracing::debug!("Certificate handler started");

    loop {
        let offset = remote
            .config
            .renewal_jitter
            .sample(&mut rand::thread_rng());
        let delay = until_next_midnight(&Local::now()) + offset;
        tracing::debug!(?delay, "Next certificate check scheduled");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = remote.check_certificate() => {
                tracing::debug!(?outcome, "Certificate check finished");
            }
        }
    }

    tracing::debug!("Certificate handler stopped");
}
