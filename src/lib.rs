//! Core networking engine for an Agent Communication Protocol client SDK
//! (spec §1-§9): process-wide façade (`AgentCp`) over per-identity
//! composition of the auth/heartbeat/session/group subsystems (`AgentID`).

pub mod agent_id;
pub mod config;
pub mod error;
pub mod group_transport;

pub use agent_id::{AgentID, AgentState, MessageHandler, StateChangeHandler};
pub use config::{AgentCpConfig, LogLevel, ProxyConfig, ProxyKind, TlsConfig};
pub use error::{Error, ErrorCode, MapError, Result};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use acp_crypto::csr::generate_csr;
use acp_crypto::ecdsa::generate_ec_p384_key;
use acp_crypto::pem_store::{load_private_key, save_private_key};
use acp_crypto::CryptoError;
use acp_group::{CursorStore, LocalCursorStore};
use acp_transport::{HttpBackend, HttpClientConfig, ReqwestHttpBackend};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::info;

/// Process-wide registry with life-cycle `{uninitialized, initialized}`
/// (spec §4.14). Not a global singleton (no hidden constructor, per spec §9
/// "Global state" note) — the consuming binary owns one instance and passes
/// it around or stores it in its own statics if it wants process-wide reach.
pub struct AgentCp {
    config: RwLock<AgentCpConfig>,
    initialized: AtomicBool,
    registry: RwLock<HashMap<String, Arc<AgentID>>>,
    http: RwLock<Arc<dyn HttpBackend>>,
}

impl Default for AgentCp {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentCp {
    #[must_use]
    pub fn new() -> Self {
        let config = AgentCpConfig::default();
        let http = build_http_backend(&config).expect("default HttpClientConfig (no proxy, no extra CA cert) always builds");
        Self {
            config: RwLock::new(config),
            initialized: AtomicBool::new(false),
            registry: RwLock::new(HashMap::new()),
            http: RwLock::new(http),
        }
    }

    /// Swap in an explicit HTTP backend (for tests: a `FakeHttpBackend`
    /// instead of a live `ReqwestHttpBackend`).
    pub fn set_http_backend(&self, http: Arc<dyn HttpBackend>) {
        *self.http.write() = http;
    }

    pub fn initialize(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(Error::new(ErrorCode::InvalidArgument, "AgentCp is already initialized"));
        }
        info!("agentcp initialized");
        Ok(())
    }

    /// Invalidates and offlines every registered `AgentID`, then returns to
    /// `uninitialized` (spec §8 "After shutdown(), every previously held
    /// AgentID handle returns AID_INVALID and is_online() == false").
    pub async fn shutdown(&self) {
        let agents: Vec<Arc<AgentID>> = self.registry.write().drain().map(|(_, agent)| agent).collect();
        for agent in agents {
            agent.invalidate();
            agent.offline().await;
        }
        self.initialized.store(false, Ordering::SeqCst);
        info!("agentcp shut down");
    }

    pub fn set_base_urls(&self, ca_base: impl Into<String>, ap_base: impl Into<String>) {
        let mut cfg = self.config.write();
        cfg.ca_base = ca_base.into();
        cfg.ap_base = ap_base.into();
    }

    pub fn set_storage_path(&self, path: impl Into<PathBuf>) {
        self.config.write().storage_path = path.into();
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.config.write().log_level = level;
    }

    pub fn set_proxy(&self, proxy: ProxyConfig) -> Result<()> {
        self.config.write().proxy = proxy;
        self.rebuild_http()
    }

    pub fn set_tls(&self, tls: TlsConfig) -> Result<()> {
        self.config.write().tls = tls;
        self.rebuild_http()
    }

    fn rebuild_http(&self) -> Result<()> {
        let cfg = self.config.read().clone();
        let backend = build_http_backend(&cfg).map_acp_err(ErrorCode::TlsError)?;
        *self.http.write() = backend;
        Ok(())
    }

    fn check_initialized(&self) -> Result<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorCode::NotInitialized, "AgentCp::initialize must be called first"));
        }
        Ok(())
    }

    fn material_paths(&self, aid: &str) -> (PathBuf, PathBuf) {
        let dir = self.config.read().storage_path.join(aid);
        (dir.join(format!("{aid}.key")), dir.join(format!("{aid}.crt")))
    }

    /// Generate an ECDSA P-384 key → CSR → `POST <ca_base>/issue_cert` →
    /// persist the encrypted key and the issued cert (spec §4.14). Fails
    /// with `AID_ALREADY_EXISTS` if the AID is already registered in memory
    /// or already has material on disk.
    pub async fn create_aid(&self, aid: impl Into<String>, password: impl Into<String>) -> Result<Arc<AgentID>> {
        self.check_initialized()?;
        let aid = aid.into();
        let password = password.into();

        if self.registry.read().contains_key(&aid) {
            return Err(Error::new(ErrorCode::AidAlreadyExists, format!("{aid} is already registered")));
        }
        let (key_path, cert_path) = self.material_paths(&aid);
        if key_path.exists() || cert_path.exists() {
            return Err(Error::new(ErrorCode::AidAlreadyExists, format!("{aid} already has material on disk")));
        }

        let key_pem = generate_ec_p384_key().map_acp_err(ErrorCode::CertError)?;
        let csr_pem = generate_csr(&aid, &key_pem).map_acp_err(ErrorCode::CertError)?;

        let cfg = self.config.read().clone();
        let http = self.http.read().clone();
        let issue_url = format!("{}/issue_cert", cfg.ca_base.trim_end_matches('/'));
        let response = http
            .post_json(&issue_url, &json!({ "aid": aid, "csr": csr_pem }))
            .await
            .map_acp_err(ErrorCode::NetworkError)?;
        let cert_pem = response
            .get("cert")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::new(ErrorCode::CertError, "issue_cert response missing cert"))?
            .to_string();

        save_private_key(&key_path, &key_pem, &password).map_acp_err(ErrorCode::CertError)?;
        if let Some(parent) = cert_path.parent() {
            std::fs::create_dir_all(parent).map_acp_err(ErrorCode::CertError)?;
        }
        std::fs::write(&cert_path, cert_pem.as_bytes()).map_acp_err(ErrorCode::CertError)?;

        let agent = self.build_agent_id(aid.clone(), http, key_pem, cert_pem, &cfg);
        self.registry.write().insert(aid, agent.clone());
        Ok(agent)
    }

    /// Reads `<storage_path>/<aid>/<aid>.{key,crt}` and constructs an
    /// `AgentID`; wrong password surfaces as `CERT_ERROR` (spec §4.14).
    /// Returns the already-registered handle if `aid` is already loaded.
    pub async fn load_aid(&self, aid: impl Into<String>, password: impl Into<String>) -> Result<Arc<AgentID>> {
        self.check_initialized()?;
        let aid = aid.into();
        let password = password.into();

        if let Some(existing) = self.registry.read().get(&aid) {
            return Ok(existing.clone());
        }

        let (key_path, cert_path) = self.material_paths(&aid);
        if !key_path.exists() || !cert_path.exists() {
            return Err(Error::new(ErrorCode::AidNotFound, format!("no material on disk for {aid}")));
        }
        let key_pem = load_private_key(&key_path, &password).map_err(|e| match e {
            CryptoError::WrongPassword => Error::new(ErrorCode::CertError, "wrong password"),
            other => Error::new(ErrorCode::CertError, other.to_string()),
        })?;
        let cert_pem = std::fs::read_to_string(&cert_path).map_acp_err(ErrorCode::CertError)?;

        let cfg = self.config.read().clone();
        let http = self.http.read().clone();
        let agent = self.build_agent_id(aid.clone(), http, key_pem, cert_pem, &cfg);
        self.registry.write().insert(aid, agent.clone());
        Ok(agent)
    }

    /// Invalidates and offlines any in-memory `AgentID` for `aid`, then
    /// removes its key/cert files (spec §4.14).
    pub async fn delete_aid(&self, aid: &str) -> Result<()> {
        self.check_initialized()?;
        if let Some(agent) = self.registry.write().remove(aid) {
            agent.invalidate();
            agent.offline().await;
        }
        let (key_path, cert_path) = self.material_paths(aid);
        let _ = std::fs::remove_file(key_path);
        let _ = std::fs::remove_file(cert_path);
        Ok(())
    }

    /// Every AID currently held in the process-wide registry (spec §3.5:
    /// the registry "exclusively owns a mapping from AID → AgentID").
    #[must_use]
    pub fn list_aids(&self) -> Vec<String> {
        self.registry.read().keys().cloned().collect()
    }

    fn build_agent_id(
        &self,
        aid: String,
        http: Arc<dyn HttpBackend>,
        key_pem: String,
        cert_pem: String,
        cfg: &AgentCpConfig,
    ) -> Arc<AgentID> {
        let cursor_path = cfg.storage_path.join(&aid).join("cursors.json");
        let cursor_store: Arc<dyn CursorStore> = Arc::new(LocalCursorStore::with_file(cursor_path));
        AgentID::new(aid, http, key_pem, cert_pem, cfg.ap_base.clone(), cursor_store)
    }
}

/// TLS/proxy options from `cfg` threaded into a fresh `reqwest`-backed HTTP
/// client (spec §4.14's `tls`/`proxy` option table).
fn build_http_backend(cfg: &AgentCpConfig) -> std::result::Result<Arc<dyn HttpBackend>, acp_transport::TransportError> {
    let extra_root_cert_pem = cfg.tls.ca_cert_path.as_ref().and_then(|path| std::fs::read_to_string(path).ok());
    let http_cfg = HttpClientConfig {
        verify_tls: cfg.tls.verify && !cfg.tls.allow_self_signed,
        proxy_url: cfg.proxy.to_url(),
        extra_root_cert_pem,
        ..HttpClientConfig::default()
    };
    let backend = ReqwestHttpBackend::new(http_cfg)?;
    Ok(Arc::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_before_initialize_fail_not_initialized() {
        let cp = AgentCp::new();
        let result = cp.create_aid("alice.aid.pub", "pw").await;
        assert!(matches!(result, Err(Error { code: ErrorCode::NotInitialized, .. })));
    }

    #[test]
    fn double_initialize_is_invalid_argument() {
        let cp = AgentCp::new();
        cp.initialize().unwrap();
        let result = cp.initialize();
        assert!(matches!(result, Err(Error { code: ErrorCode::InvalidArgument, .. })));
    }

    #[test]
    fn list_aids_starts_empty() {
        let cp = AgentCp::new();
        assert!(cp.list_aids().is_empty());
    }
}
