//! Backend lifecycle state machine
//!
//! The orchestrator keeps one [`BackendState`] behind a mutex. Every load and
//! teardown bumps the generation; detached work captures the generation it
//! was started for and only mutates state while it is still current.

use std::sync::Arc;

use hl_core::traits::{CertificateAuthority, TunnelClient};
use hl_core::InstanceIdentity;

use crate::token::TokenRefresher;

/// Everything produced by one successful registration
pub(crate) struct Registration {
    pub identity: InstanceIdentity,
    pub authority: Arc<dyn CertificateAuthority>,
    pub tokens: TokenRefresher,
}

/// Phase of the backend load cycle
pub(crate) enum Phase {
    /// Nothing loaded
    Absent,
    /// Registration call in flight
    Registering,
    /// Registered; certificate and tunnel setup in progress
    Loading(Arc<Registration>),
    /// Registered, but setup failed; the certificate handler retries
    Stalled(Arc<Registration>),
    /// Tunnel client constructed and started
    Ready {
        registration: Arc<Registration>,
        tunnel: Arc<dyn TunnelClient>,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Absent => "absent",
            Phase::Registering => "registering",
            Phase::Loading(_) => "loading",
            Phase::Stalled(_) => "stalled",
            Phase::Ready { .. } => "ready",
        }
    }

    pub fn registration(&self) -> Option<&Arc<Registration>> {
        match self {
            Phase::Absent | Phase::Registering => None,
            Phase::Loading(registration) | Phase::Stalled(registration) => Some(registration),
            Phase::Ready { registration, .. } => Some(registration),
        }
    }
}

/// Handles of a ready backend, cloned out of the state lock
#[derive(Clone)]
pub(crate) struct ActiveBackend {
    pub generation: u64,
    pub registration: Arc<Registration>,
    pub tunnel: Arc<dyn TunnelClient>,
}

pub(crate) struct BackendState {
    generation: u64,
    phase: Phase,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: Phase::Absent,
        }
    }
}

impl BackendState {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Enter `Registering` if nothing is loaded or setup stalled.
    ///
    /// Returns the generation of the new load cycle, or `None` if a backend
    /// is already loading or ready.
    pub fn begin_load(&mut self) -> Option<u64> {
        match self.phase {
            Phase::Absent | Phase::Stalled(_) => {
                self.generation += 1;
                self.phase = Phase::Registering;
                Some(self.generation)
            }
            Phase::Registering | Phase::Loading(_) | Phase::Ready { .. } => None,
        }
    }

    /// Return a failed registration to `Absent`
    pub fn abandon(&mut self, generation: u64) {
        if self.is_current(generation) && matches!(self.phase, Phase::Registering) {
            self.phase = Phase::Absent;
        }
    }

    /// `Registering` → `Loading`
    pub fn set_loading(&mut self, generation: u64, registration: Arc<Registration>) -> bool {
        if !self.is_current(generation) || !matches!(self.phase, Phase::Registering) {
            return false;
        }
        self.phase = Phase::Loading(registration);
        true
    }

    /// `Loading` → `Stalled`
    pub fn set_stalled(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        match std::mem::replace(&mut self.phase, Phase::Absent) {
            Phase::Loading(registration) => {
                self.phase = Phase::Stalled(registration);
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    /// `Loading` → `Ready`
    pub fn set_ready(&mut self, generation: u64, tunnel: Arc<dyn TunnelClient>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        match std::mem::replace(&mut self.phase, Phase::Absent) {
            Phase::Loading(registration) => {
                self.phase = Phase::Ready {
                    registration,
                    tunnel,
                };
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    /// Reset to `Absent`, invalidating every outstanding generation.
    ///
    /// Returns the phase that was replaced.
    pub fn take(&mut self) -> Phase {
        self.generation += 1;
        std::mem::replace(&mut self.phase, Phase::Absent)
    }

    pub fn active(&self) -> Option<ActiveBackend> {
        match &self.phase {
            Phase::Ready {
                registration,
                tunnel,
            } => Some(ActiveBackend {
                generation: self.generation,
                registration: Arc::clone(registration),
                tunnel: Arc::clone(tunnel),
            }),
            _ => None,
        }
    }

    /// The ready backend of `generation`, if it is still current
    pub fn active_for(&self, generation: u64) -> Option<ActiveBackend> {
        self.active().filter(|active| active.generation == generation)
    }
}
