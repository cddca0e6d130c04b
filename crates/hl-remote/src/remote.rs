//! Lifecycle orchestrator for remote access
//!
//! [`RemoteUi`] loads the backend (registration, certificate, tunnel client),
//! exposes the connect/disconnect entry points and owns the two perpetual
//! background tasks: the certificate handler and the reconnect guard.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use hl_core::config::RemoteConfig;
use hl_core::traits::{
    CertificateAuthority, CertificateAuthorityFactory, RemoteBackend, RemoteHost, TunnelFactory,
    TunnelParams,
};
use hl_core::{
    BackendError, Certificate, CertificateError, ConnectionState, InstanceIdentity, RemoteError,
    RemoteEvent, SessionToken,
};

use crate::certificate::{self, CertificateCheck};
use crate::reconnect;
use crate::state::{ActiveBackend, BackendState, Phase, Registration};
use crate::task::TaskSlot;
use crate::tls;
use crate::token::TokenRefresher;

/// Notification identifier shared by the setup failure and ready messages
pub const CERTIFICATE_MESSAGE_ID: &str = "remote_certificate";

const MESSAGE_TITLE: &str = "Remote access";
const MESSAGE_SETUP_FAILED: &str =
    "Remote access setup failed: no certificate could be issued. Setup is retried automatically.";
const MESSAGE_READY: &str = "Remote access is ready.";

/// Remote access coordinator.
///
/// All entry points take `&Arc<Self>` because they spawn detached work that
/// keeps the coordinator alive. Call [`RemoteUi::close_backend`] (or
/// [`RemoteUi::stop`]) on shutdown to cancel that work.
pub struct RemoteUi {
    pub(crate) config: RemoteConfig,
    backend: Arc<dyn RemoteBackend>,
    authorities: Arc<dyn CertificateAuthorityFactory>,
    tunnels: Arc<dyn TunnelFactory>,
    pub(crate) host: Arc<dyn RemoteHost>,
    state: Mutex<BackendState>,
    connect_lock: AsyncMutex<()>,
    certificate_task: TaskSlot,
    reconnect_task: TaskSlot,
}

impl RemoteUi {
    /// Create a coordinator with nothing loaded
    pub fn new(
        config: RemoteConfig,
        backend: Arc<dyn RemoteBackend>,
        authorities: Arc<dyn CertificateAuthorityFactory>,
        tunnels: Arc<dyn TunnelFactory>,
        host: Arc<dyn RemoteHost>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            backend,
            authorities,
            tunnels,
            host,
            state: Mutex::new(BackendState::default()),
            connect_lock: AsyncMutex::new(()),
            certificate_task: TaskSlot::new("certificate-handler"),
            reconnect_task: TaskSlot::new("reconnect-guard"),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn active(&self) -> Option<ActiveBackend> {
        self.lock_state().active()
    }

    pub(crate) fn active_for(&self, generation: u64) -> Option<ActiveBackend> {
        self.lock_state().active_for(generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_state().is_current(generation)
    }

    fn ensure_current(&self, generation: u64) -> Result<(), RemoteError> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(RemoteError::Superseded)
        }
    }

    /// Host start hook: load the backend in the background
    pub fn start(self: &Arc<Self>) {
        let remote = Arc::clone(self);
        tokio::spawn(async move { remote.load_backend().await });
    }

    /// Host stop hook
    pub async fn stop(&self) {
        self.close_backend().await;
    }

    /// Register the instance and load its certificate, then finish setup in
    /// the background.
    ///
    /// No-op while a backend is loading or ready. Failures are logged; the
    /// certificate handler retries on its next run.
    pub async fn load_backend(self: &Arc<Self>) {
        let Some(generation) = self.lock_state().begin_load() else {
            tracing::debug!("Remote backend already loading or loaded");
            return;
        };
        self.start_certificate_handler();
        tracing::debug!(generation, "Loading remote backend");

        match self.register(generation).await {
            Ok(registration) => {
                if self.lock_state().set_loading(generation, Arc::clone(&registration)) {
                    self.spawn_finish_load(generation, registration);
                } else {
                    tracing::debug!(generation, "Backend load superseded during registration");
                }
            }
            Err(RemoteError::Superseded) => {
                tracing::debug!(generation, "Backend load superseded during registration");
            }
            Err(e) => {
                tracing::error!("Can't register remote backend: {}", e);
                self.lock_state().abandon(generation);
            }
        }
    }

    async fn register(&self, generation: u64) -> Result<Arc<Registration>, RemoteError> {
        let timeout = self.config.backend_timeout;
        let response = tokio::time::timeout(timeout, self.backend.register_instance())
            .await
            .map_err(|_| BackendError::Timeout(timeout))??;
        response.validate().map_err(BackendError::from)?;
        self.ensure_current(generation)?;

        let identity = InstanceIdentity {
            domain: response.domain,
            relay_server: response.server,
            contact: response.email,
        };
        tracing::info!(
            domain = %identity.domain,
            relay = %identity.relay_server,
            "Remote instance registered"
        );

        let authority = self.authorities.create(&identity.domain, &identity.contact);
        if let Err(e) = authority.load_certificate().await {
            tracing::warn!("Can't load existing certificate: {}", e);
        }
        self.ensure_current(generation)?;

        // A certificate for another domain can never become valid again.
        if let Some(cert) = authority.certificate() {
            if !cert.common_name.is_empty() && cert.common_name != identity.domain {
                tracing::warn!(
                    common_name = %cert.common_name,
                    domain = %identity.domain,
                    "Invalid certificate found, resetting"
                );
                if let Err(e) = authority.reset().await {
                    tracing::warn!("Can't reset certificate authority: {}", e);
                }
                self.ensure_current(generation)?;
            }
        }

        Ok(Arc::new(Registration {
            identity,
            authority,
            tokens: TokenRefresher::new(Arc::clone(&self.backend), timeout),
        }))
    }

    fn spawn_finish_load(self: &Arc<Self>, generation: u64, registration: Arc<Registration>) {
        let remote = Arc::clone(self);
        tokio::spawn(async move { remote.finish_load_backend(generation, registration).await });
    }

    async fn finish_load_backend(self: &Arc<Self>, generation: u64, registration: Arc<Registration>) {
        let authority = &registration.authority;

        if !authority.is_valid_certificate() {
            let issued = authority.issue_certificate().await;
            if !self.is_current(generation) {
                tracing::debug!(generation, "Backend setup superseded during issuance");
                return;
            }
            if let Err(e) = issued {
                tracing::warn!("Certificate issuance failed, remote setup stalled: {}", e);
                self.host
                    .user_message(CERTIFICATE_MESSAGE_ID, MESSAGE_TITLE, MESSAGE_SETUP_FAILED);
                self.lock_state().set_stalled(generation);
                return;
            }
            self.host
                .user_message(CERTIFICATE_MESSAGE_ID, MESSAGE_TITLE, MESSAGE_READY);
        }

        if let Err(e) = authority.harden_files().await {
            tracing::warn!("Can't harden certificate files: {}", e);
        }

        while !self.host.runtime_ready() {
            if !self.is_current(generation) {
                return;
            }
            tokio::time::sleep(self.config.runtime_poll_interval).await;
        }

        let tls = match build_tls(Arc::clone(authority)).await {
            Ok(tls) => tls,
            Err(e) => {
                tracing::warn!("Can't build TLS context, remote setup stalled: {}", e);
                self.lock_state().set_stalled(generation);
                return;
            }
        };

        let tunnel = self.tunnels.create(TunnelParams {
            server: registration.identity.relay_server.clone(),
            port: self.config.relay_port,
            tls,
        });
        if let Err(e) = tunnel.start().await {
            tracing::error!("Can't start tunnel client: {}", e);
            self.lock_state().set_stalled(generation);
            return;
        }

        if !self.lock_state().set_ready(generation, Arc::clone(&tunnel)) {
            tracing::debug!(generation, "Backend setup superseded, stopping tunnel client");
            tunnel.stop().await;
            return;
        }

        tracing::info!(
            relay = %registration.identity.relay_server,
            port = self.config.relay_port,
            "Remote backend up"
        );
        self.host.dispatch(RemoteEvent::BackendUp);

        if self.host.remote_autostart() {
            let remote = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = remote.connect().await {
                    tracing::debug!("Autostart connect skipped: {}", e);
                }
            });
        }
    }

    /// Cancel the background tasks, stop the tunnel client and forget the
    /// backend.
    ///
    /// Safe to call repeatedly and in any state. Emits `BackendDown` only if
    /// a registration was loaded.
    pub async fn close_backend(&self) {
        self.teardown(true).await;
    }

    pub(crate) async fn teardown(&self, cancel_certificate_handler: bool) {
        let previous = self.lock_state().take();

        self.reconnect_task.cancel();
        if cancel_certificate_handler {
            self.certificate_task.cancel();
        }

        let had_registration = previous.registration().is_some();
        tracing::debug!(phase = previous.name(), "Closing remote backend");
        if let Phase::Ready { tunnel, .. } = previous {
            tunnel.stop().await;
        }

        if had_registration {
            tracing::info!("Remote backend down");
            self.host.dispatch(RemoteEvent::BackendDown);
        }
    }

    /// Handle a connection request signalled through the relay.
    pub async fn handle_connection_request(self: &Arc<Self>, caller: &str) -> Result<(), RemoteError> {
        let active = self.active().ok_or(RemoteError::NotConnected)?;
        if active.tunnel.is_connected() {
            return Ok(());
        }
        tracing::info!(caller, "Connection requested, connecting to relay");
        self.connect().await
    }

    /// Connect the tunnel to the relay.
    ///
    /// Fails only with `NotConnected`; token and transport failures are
    /// logged and left to the reconnect guard, which is started if needed.
    pub async fn connect(self: &Arc<Self>) -> Result<(), RemoteError> {
        self.connect_inner(None).await
    }

    /// Connect attempt shared by [`RemoteUi::connect`] and the reconnect
    /// guard.
    ///
    /// The guard passes its cancellation token: the attempt then stops at
    /// its next suspension point once the guard is cancelled, and never
    /// starts another guard.
    pub(crate) async fn connect_inner(
        self: &Arc<Self>,
        guard: Option<&CancellationToken>,
    ) -> Result<(), RemoteError> {
        let active = self.active().ok_or(RemoteError::NotConnected)?;
        if active.tunnel.is_connected() {
            return Ok(());
        }

        let uncancelled = CancellationToken::new();
        let cancel = guard.unwrap_or(&uncancelled);

        {
            let _attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                attempt = self.connect_lock.lock() => attempt,
            };
            if active.tunnel.is_connected() {
                tracing::debug!("Tunnel connected by a concurrent attempt");
            } else {
                match self.try_connect(&active, cancel).await {
                    Ok(()) => {}
                    Err(RemoteError::Superseded) => {
                        tracing::debug!(
                            generation = active.generation,
                            "Connect attempt superseded by backend reload"
                        );
                    }
                    Err(RemoteError::Cancelled) => {
                        tracing::debug!("Connect attempt cancelled");
                    }
                    Err(e) => tracing::error!("Connection problem to relay: {}", e),
                }
            }
        }

        if guard.is_none() {
            self.start_reconnect_guard(active.generation);
        }
        Ok(())
    }

    async fn try_connect(
        &self,
        active: &ActiveBackend,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let token = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RemoteError::Cancelled),
            token = active.registration.tokens.refresh() => token?,
        };
        self.ensure_current(active.generation)?;

        active
            .tunnel
            .connect(&token.auth_token, &token.aes_key, &token.aes_iv, token.throttling)
            .await?;
        // Cancelled while the relay handshake ran: undo it.
        if cancel.is_cancelled() {
            active.tunnel.disconnect().await;
            return Err(RemoteError::Cancelled);
        }
        self.ensure_current(active.generation)?;

        tracing::info!("Connected to relay");
        self.host.dispatch(RemoteEvent::Connected);
        Ok(())
    }

    /// Disconnect the tunnel from the relay and stop reconnecting.
    pub async fn disconnect(&self) -> Result<(), RemoteError> {
        let active = self.active().ok_or(RemoteError::NotConnected)?;
        self.reconnect_task.cancel();

        if !active.tunnel.is_connected() {
            return Ok(());
        }

        active.tunnel.disconnect().await;
        tracing::info!("Disconnected from relay");
        self.host.dispatch(RemoteEvent::Disconnected);
        Ok(())
    }

    /// Run one certificate check: load a missing backend, or renew a
    /// certificate that expires within the renewal threshold.
    pub async fn check_certificate(self: &Arc<Self>) -> CertificateCheck {
        let Some(active) = self.active() else {
            self.load_backend().await;
            return CertificateCheck::LoadedBackend;
        };

        let authority = &active.registration.authority;
        let expire_date = authority.certificate().map(|cert| cert.expire_date);
        let now = Utc::now();
        if !certificate::renewal_due(expire_date, now, self.config.renew_threshold()) {
            return CertificateCheck::NotDue;
        }

        tracing::info!(?expire_date, "Renewing certificate");
        match authority.issue_certificate().await {
            Ok(()) => {
                self.teardown(false).await;
                tokio::time::sleep(self.config.renewal_settle).await;
                self.load_backend().await;
                CertificateCheck::Renewed
            }
            Err(e) => {
                if certificate::renewal_urgent(expire_date, now, self.config.warn_threshold()) {
                    tracing::warn!("Renewal of certificate failed: {}", e);
                } else {
                    tracing::debug!("Renewal of certificate failed: {}", e);
                }
                CertificateCheck::RenewalFailed
            }
        }
    }

    fn start_certificate_handler(self: &Arc<Self>) {
        let remote = Arc::clone(self);
        self.certificate_task
            .spawn_if_idle(move |cancel| certificate::run_certificate_handler(remote, cancel));
    }

    fn start_reconnect_guard(self: &Arc<Self>, generation: u64) {
        // Checked under the state lock so a concurrent teardown either sees
        // the guard and cancels it, or the guard is never started.
        let state = self.lock_state();
        if state.active_for(generation).is_none() {
            return;
        }
        let remote = Arc::clone(self);
        self.reconnect_task.spawn_if_idle(move |cancel| {
            reconnect::run_reconnect_guard(remote, generation, cancel)
        });
    }

    /// Whether the tunnel is connected to the relay
    pub fn is_connected(&self) -> bool {
        self.active()
            .is_some_and(|active| active.tunnel.is_connected())
    }

    /// Domain assigned by the backend
    pub fn instance_domain(&self) -> Option<String> {
        self.lock_state()
            .phase()
            .registration()
            .map(|registration| registration.identity.domain.clone())
    }

    /// Relay server the tunnel connects to
    pub fn tunnel_server(&self) -> Option<String> {
        self.lock_state()
            .phase()
            .registration()
            .map(|registration| registration.identity.relay_server.clone())
    }

    /// Snapshot of the current certificate
    pub fn certificate(&self) -> Option<Certificate> {
        let authority = self
            .lock_state()
            .phase()
            .registration()
            .map(|registration| Arc::clone(&registration.authority))?;
        authority.certificate()
    }

    /// The cached session token of the loaded backend
    pub async fn session_token(&self) -> Option<SessionToken> {
        let registration = self
            .lock_state()
            .phase()
            .registration()
            .map(Arc::clone)?;
        registration.tokens.current().await
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        let state = self.lock_state();
        match state.phase() {
            Phase::Absent => ConnectionState::NoBackend,
            Phase::Registering | Phase::Loading(_) | Phase::Stalled(_) => {
                ConnectionState::BackendLoading
            }
            Phase::Ready { tunnel, .. } => {
                if tunnel.is_connected() {
                    ConnectionState::Connected
                } else if self.connect_lock.try_lock().is_err() {
                    ConnectionState::Connecting
                } else if self.reconnect_task.is_running() {
                    ConnectionState::ReconnectPending
                } else {
                    ConnectionState::Disconnected
                }
            }
        }
    }

    /// Whether the certificate handler task is running
    pub fn certificate_handler_running(&self) -> bool {
        self.certificate_task.is_running()
    }

    /// Whether the reconnect guard task is running
    pub fn reconnect_guard_running(&self) -> bool {
        self.reconnect_task.is_running()
    }
}

async fn build_tls(
    authority: Arc<dyn CertificateAuthority>,
) -> Result<Arc<rustls::ServerConfig>, CertificateError> {
    let fullchain = authority.path_fullchain();
    let private_key = authority.path_private_key();
    tokio::task::spawn_blocking(move || tls::server_context(&fullchain, &private_key))
        .await
        .map_err(|e| CertificateError::Tls(format!("TLS setup task failed: {}", e)))?
}
