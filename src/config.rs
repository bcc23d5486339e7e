//! `AgentCpConfig` backing `AgentCp::initialize` (spec §4.14): a plain
//! builder-style struct, not a config-file format — the spec gives this as
//! an explicit programmatic surface (`set_base_urls`, `set_storage_path`,
//! `set_log_level`, `set_proxy`, `set_tls`).

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `tracing_subscriber::EnvFilter` directive for this level.
    #[must_use]
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyKind {
    #[default]
    None,
    Http,
    Socks5,
    /// Deferred to the platform/environment: no explicit proxy is set on
    /// the HTTP client and reqwest honors `HTTP_PROXY`/`HTTPS_PROXY` itself.
    System,
}

#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bypass: Vec<String>,
}

impl ProxyConfig {
    /// `scheme://[user[:pass]@]host:port` for `Http`/`Socks5` with both
    /// `host` and `port` set; `None` otherwise (including `None` and
    /// `System`, per the doc comment on [`ProxyKind::System`]).
    #[must_use]
    pub fn to_url(&self) -> Option<String> {
        let scheme = match self.kind {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
            ProxyKind::None | ProxyKind::System => return None,
        };
        let host = self.host.as_ref()?;
        let port = self.port?;
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{user}:{pass}@"),
            (Some(user), None) => format!("{user}@"),
            _ => String::new(),
        };
        Some(format!("{scheme}://{auth}{host}:{port}"))
    }
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub verify: bool,
    pub allow_self_signed: bool,
    pub ca_cert_path: Option<PathBuf>,
    /// Stored but not yet enforced: `acp-transport`'s reqwest backend has no
    /// client-certificate builder wiring (documented in `DESIGN.md`).
    pub client_cert_path: Option<PathBuf>,
    pub client_key_path: Option<PathBuf>,
    /// Stored but not yet enforced: reqwest has no built-in certificate
    /// pinning (documented in `DESIGN.md`).
    pub pinned_certs: Vec<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verify: true,
            allow_self_signed: false,
            ca_cert_path: None,
            client_cert_path: None,
            client_key_path: None,
            pinned_certs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentCpConfig {
    pub ca_base: String,
    pub ap_base: String,
    pub storage_path: PathBuf,
    pub log_level: LogLevel,
    pub proxy: ProxyConfig,
    pub tls: TlsConfig,
}

impl Default for AgentCpConfig {
    fn default() -> Self {
        Self {
            ca_base: String::new(),
            ap_base: String::new(),
            storage_path: default_storage_path(),
            log_level: LogLevel::Info,
            proxy: ProxyConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("agentcp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_url_requires_host_and_port() {
        let proxy = ProxyConfig { kind: ProxyKind::Http, host: Some("proxy.example".into()), port: Some(8080), ..Default::default() };
        assert_eq!(proxy.to_url().as_deref(), Some("http://proxy.example:8080"));
    }

    #[test]
    fn proxy_url_includes_credentials() {
        let proxy = ProxyConfig {
            kind: ProxyKind::Socks5,
            host: Some("proxy.example".into()),
            port: Some(1080),
            username: Some("alice".into()),
            password: Some("pw".into()),
            bypass: vec![],
        };
        assert_eq!(proxy.to_url().as_deref(), Some("socks5://alice:pw@proxy.example:1080"));
    }

    #[test]
    fn system_and_none_proxies_have_no_url() {
        assert!(ProxyConfig { kind: ProxyKind::System, ..Default::default() }.to_url().is_none());
        assert!(ProxyConfig::default().to_url().is_none());
    }
}
