//! Remote access configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::seconds;
use crate::error::ConfigError;

/// Configuration for the remote access coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the remote backend API
    pub api_url: String,

    /// Bearer token sent with backend requests
    pub access_token: Option<String>,

    /// Port of the relay server
    pub relay_port: u16,

    /// Deadline for each backend API call
    #[serde(with = "seconds")]
    pub backend_timeout: Duration,

    /// Renew the certificate once it expires within this many days
    pub renew_before_days: u32,

    /// Log failed renewals as warnings once the certificate expires within
    /// this many days
    pub warn_before_days: u32,

    /// Pause between tearing down and reloading the backend after a renewal
    #[serde(with = "seconds")]
    pub renewal_settle: Duration,

    /// Poll interval while waiting for the host's network runtime
    #[serde(with = "seconds")]
    pub runtime_poll_interval: Duration,

    /// Random offset added to the nightly certificate check
    pub renewal_jitter: JitterConfig,

    /// Random delay before each reconnect attempt
    pub reconnect_jitter: JitterConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            access_token: None,
            relay_port: 443,
            backend_timeout: Duration::from_secs(30),
            renew_before_days: 25,
            warn_before_days: 18,
            renewal_settle: Duration::from_secs(5),
            runtime_poll_interval: Duration::from_secs(1),
            renewal_jitter: JitterConfig::new(Duration::from_secs(1), Duration::from_secs(3600)),
            reconnect_jitter: JitterConfig::new(Duration::from_secs(1), Duration::from_secs(15)),
        }
    }
}

impl RemoteConfig {
    /// Check the values are usable together
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renewal_jitter.validate("renewal_jitter")?;
        self.reconnect_jitter.validate("reconnect_jitter")?;
        if self.warn_before_days > self.renew_before_days {
            return Err(ConfigError::Invalid(format!(
                "warn_before_days ({}) exceeds renew_before_days ({})",
                self.warn_before_days, self.renew_before_days
            )));
        }
        if self.backend_timeout.is_zero() {
            return Err(ConfigError::Invalid("backend_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Expiry window inside which the certificate is renewed
    pub fn renew_threshold(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.renew_before_days))
    }

    /// Expiry window inside which failed renewals are logged as warnings
    pub fn warn_threshold(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.warn_before_days))
    }
}

/// Uniformly random delay in a closed window of whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterConfig {
    /// Lower bound
    #[serde(with = "seconds")]
    pub min: Duration,

    /// Upper bound (inclusive)
    #[serde(with = "seconds")]
    pub max: Duration,
}

impl JitterConfig {
    /// Create a jitter window
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Draw a delay from the window.
    ///
    /// An inverted window collapses to `max`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max = self.max.as_secs();
        let min = self.min.as_secs().min(max);
        Duration::from_secs(rng.gen_range(min..=max))
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::Invalid(format!(
                "{name}: min ({:?}) exceeds max ({:?})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}
