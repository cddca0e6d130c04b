//! Shared fakes for the remote coordinator integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::watch;

use hl_core::config::{JitterConfig, RemoteConfig};
use hl_core::traits::{
    CertificateAuthority, CertificateAuthorityFactory, RemoteBackend, RemoteHost, TunnelClient,
    TunnelFactory, TunnelParams,
};
use hl_core::{
    BackendError, Certificate, CertificateError, RemoteEvent, TransportError,
};
use hl_protocol::{RegisterResponse, TokenResponse};
use hl_remote::RemoteUi;

pub const DOMAIN: &str = "abc.example";
pub const EMAIL: &str = "a@b.com";
pub const RELAY: &str = "relay1";

/// Config with no settle delay and a fast runtime poll
pub fn test_config() -> RemoteConfig {
    RemoteConfig {
        api_url: "http://backend.invalid".to_string(),
        renewal_settle: Duration::ZERO,
        runtime_poll_interval: Duration::from_millis(10),
        reconnect_jitter: JitterConfig::new(Duration::from_secs(1), Duration::from_secs(15)),
        ..RemoteConfig::default()
    }
}

// ============================================================================
// Backend
// ============================================================================

pub struct FakeBackend {
    pub register_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub fail_register: AtomicBool,
    register_delay: Duration,
    pub token_delay_ms: AtomicU64,
    pub token_valid_secs: AtomicI64,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Self::with_register_delay(Duration::ZERO)
    }

    pub fn with_register_delay(register_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            register_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
            fail_register: AtomicBool::new(false),
            register_delay,
            token_delay_ms: AtomicU64::new(0),
            token_valid_secs: AtomicI64::new(300),
        })
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteBackend for FakeBackend {
    async fn register_instance(&self) -> Result<RegisterResponse, BackendError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if !self.register_delay.is_zero() {
            tokio::time::sleep(self.register_delay).await;
        }
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(BackendError::Status(500));
        }
        Ok(RegisterResponse {
            domain: DOMAIN.to_string(),
            email: EMAIL.to_string(),
            server: RELAY.to_string(),
        })
    }

    async fn session_token(
        &self,
        _aes_key: &[u8],
        _aes_iv: &[u8],
    ) -> Result<TokenResponse, BackendError> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.token_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(TokenResponse {
            token: format!("token-{n}"),
            valid: Utc::now().timestamp() + self.token_valid_secs.load(Ordering::SeqCst),
            throttling: 400,
        })
    }
}

// ============================================================================
// Certificate authority
// ============================================================================

pub struct FakeAuthority {
    pub domain: String,
    pub email: String,
    stored: Option<Certificate>,
    current: Mutex<Option<Certificate>>,
    pub fail_issue: AtomicBool,
    pub issues: AtomicUsize,
    pub resets: AtomicUsize,
    pub hardens: AtomicUsize,
    fullchain: PathBuf,
    private_key: PathBuf,
}

impl FakeAuthority {
    pub fn issues(&self) -> usize {
        self.issues.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateAuthority for FakeAuthority {
    async fn load_certificate(&self) -> Result<(), CertificateError> {
        *self.current.lock().unwrap() = self.stored.clone();
        Ok(())
    }

    async fn issue_certificate(&self) -> Result<(), CertificateError> {
        self.issues.fetch_add(1, Ordering::SeqCst);
        if self.fail_issue.load(Ordering::SeqCst) {
            return Err(CertificateError::Issue("challenge failed".into()));
        }
        *self.current.lock().unwrap() = Some(Certificate {
            common_name: self.domain.clone(),
            expire_date: Utc::now() + chrono::Duration::days(90),
            fingerprint: "issued".to_string(),
        });
        Ok(())
    }

    async fn reset(&self) -> Result<(), CertificateError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    async fn harden_files(&self) -> Result<(), CertificateError> {
        self.hardens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn certificate(&self) -> Option<Certificate> {
        self.current.lock().unwrap().clone()
    }

    fn is_valid_certificate(&self) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|cert| cert.expire_date > Utc::now())
    }

    fn path_fullchain(&self) -> PathBuf {
        self.fullchain.clone()
    }

    fn path_private_key(&self) -> PathBuf {
        self.private_key.clone()
    }
}

/// Hands out authorities backed by one throwaway self-signed certificate
pub struct FakeAuthorityFactory {
    _dir: TempDir,
    fullchain: PathBuf,
    private_key: PathBuf,
    stored: Mutex<Option<Certificate>>,
    pub fail_issue: AtomicBool,
    pub created: Mutex<Vec<Arc<FakeAuthority>>>,
}

impl FakeAuthorityFactory {
    /// Authorities start with no stored certificate
    pub fn new() -> Arc<Self> {
        let dir = tempfile::tempdir().unwrap();
        let mut params = rcgen::CertificateParams::new(vec![DOMAIN.to_string()]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, DOMAIN);
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        let fullchain = dir.path().join("fullchain.pem");
        let private_key = dir.path().join("private.pem");
        std::fs::write(&fullchain, cert.pem()).unwrap();
        std::fs::write(&private_key, key_pair.serialize_pem()).unwrap();

        Arc::new(Self {
            _dir: dir,
            fullchain,
            private_key,
            stored: Mutex::new(None),
            fail_issue: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
        })
    }

    /// Authorities start with a stored certificate for `common_name`
    pub fn with_certificate(common_name: &str, expires_in: chrono::Duration) -> Arc<Self> {
        let factory = Self::new();
        *factory.stored.lock().unwrap() = Some(Certificate {
            common_name: common_name.to_string(),
            expire_date: Utc::now() + expires_in,
            fingerprint: "stored".to_string(),
        });
        factory
    }

    pub fn last(&self) -> Arc<FakeAuthority> {
        Arc::clone(self.created.lock().unwrap().last().expect("no authority created"))
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn total_issues(&self) -> usize {
        self.created.lock().unwrap().iter().map(|a| a.issues()).sum()
    }
}

impl CertificateAuthorityFactory for FakeAuthorityFactory {
    fn create(&self, domain: &str, email: &str) -> Arc<dyn CertificateAuthority> {
        let authority = Arc::new(FakeAuthority {
            domain: domain.to_string(),
            email: email.to_string(),
            stored: self.stored.lock().unwrap().clone(),
            current: Mutex::new(None),
            fail_issue: AtomicBool::new(self.fail_issue.load(Ordering::SeqCst)),
            issues: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            hardens: AtomicUsize::new(0),
            fullchain: self.fullchain.clone(),
            private_key: self.private_key.clone(),
        });
        self.created.lock().unwrap().push(Arc::clone(&authority));
        authority
    }
}

// ============================================================================
// Tunnel
// ============================================================================

pub struct FakeTunnel {
    pub server: String,
    pub port: u16,
    connected: watch::Sender<bool>,
    pub fail_connect: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FakeTunnel {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Simulate the relay dropping the connection
    pub fn drop_connection(&self) {
        self.connected.send_replace(false);
    }
}

#[async_trait]
impl TunnelClient for FakeTunnel {
    async fn start(&self) -> Result<(), TransportError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.connected.send_replace(false);
    }

    async fn connect(
        &self,
        auth_token: &[u8],
        aes_key: &[u8],
        aes_iv: &[u8],
        _throttling: u32,
    ) -> Result<(), TransportError> {
        assert!(!auth_token.is_empty());
        assert_eq!(aes_key.len(), 32);
        assert_eq!(aes_iv.len(), 16);
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("relay refused".into()));
        }
        self.connected.send_replace(true);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.send_replace(false);
    }

    async fn wait(&self) {
        let mut rx = self.connected.subscribe();
        let _ = rx.wait_for(|connected| !*connected).await;
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }
}

#[derive(Default)]
pub struct FakeTunnelFactory {
    pub fail_connect: AtomicBool,
    pub created: Mutex<Vec<Arc<FakeTunnel>>>,
}

impl FakeTunnelFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> Arc<FakeTunnel> {
        Arc::clone(self.created.lock().unwrap().last().expect("no tunnel created"))
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl TunnelFactory for FakeTunnelFactory {
    fn create(&self, params: TunnelParams) -> Arc<dyn TunnelClient> {
        let (connected, _) = watch::channel(false);
        let tunnel = Arc::new(FakeTunnel {
            server: params.server,
            port: params.port,
            connected,
            fail_connect: AtomicBool::new(self.fail_connect.load(Ordering::SeqCst)),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        });
        self.created.lock().unwrap().push(Arc::clone(&tunnel));
        tunnel
    }
}

// ============================================================================
// Host
// ============================================================================

pub struct RecordingHost {
    pub events: Mutex<Vec<RemoteEvent>>,
    pub messages: Mutex<Vec<(String, String)>>,
    pub autostart: AtomicBool,
    pub runtime_ready: AtomicBool,
}

impl RecordingHost {
    pub fn new(autostart: bool) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            autostart: AtomicBool::new(autostart),
            runtime_ready: AtomicBool::new(true),
        })
    }

    pub fn events(&self) -> Vec<RemoteEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: RemoteEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == event)
            .count()
    }

    /// Message texts, in order
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl RemoteHost for RecordingHost {
    fn dispatch(&self, event: RemoteEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn user_message(&self, identifier: &str, _title: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((identifier.to_string(), message.to_string()));
    }

    fn runtime_ready(&self) -> bool {
        self.runtime_ready.load(Ordering::SeqCst)
    }

    fn remote_autostart(&self) -> bool {
        self.autostart.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub remote: Arc<RemoteUi>,
    pub backend: Arc<FakeBackend>,
    pub authorities: Arc<FakeAuthorityFactory>,
    pub tunnels: Arc<FakeTunnelFactory>,
    pub host: Arc<RecordingHost>,
}

impl Harness {
    pub fn new(
        backend: Arc<FakeBackend>,
        authorities: Arc<FakeAuthorityFactory>,
        host: Arc<RecordingHost>,
    ) -> Self {
        Self::with_config(test_config(), backend, authorities, host)
    }

    pub fn with_config(
        config: RemoteConfig,
        backend: Arc<FakeBackend>,
        authorities: Arc<FakeAuthorityFactory>,
        host: Arc<RecordingHost>,
    ) -> Self {
        let tunnels = FakeTunnelFactory::new();
        let remote = RemoteUi::new(
            config,
            backend.clone(),
            authorities.clone(),
            tunnels.clone(),
            host.clone(),
        );
        Self {
            remote,
            backend,
            authorities,
            tunnels,
            host,
        }
    }

    /// Fresh instance without a stored certificate and autostart off
    pub fn default_setup() -> Self {
        Self::new(
            FakeBackend::new(),
            FakeAuthorityFactory::new(),
            RecordingHost::new(false),
        )
    }

    /// Load the backend and wait until the tunnel client is up
    pub async fn load_ready(&self) {
        self.remote.load_backend().await;
        let host = Arc::clone(&self.host);
        wait_for(move || host.count(RemoteEvent::BackendUp) > 0).await;
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

/// Let spawned tasks run without advancing time
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
