//! HTTP backend (spec §4.3): `POST json`, `POST multipart`, `GET`, `GET to
//! file`, optional TLS verify toggle, per-call timeouts, and a pluggable
//! process-wide DNS resolver hook (mobile platforms need VPN/captive-portal
//! friendly name resolution, so the system resolver is only a fallback).

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::TransportError;

/// `(bytes_transferred, total_bytes)`; `total_bytes` is `None` when the
/// server did not send a `Content-Length`.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

pub type DnsHook = Arc<dyn Fn(&str) -> Option<SocketAddr> + Send + Sync>;

#[derive(Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub verify_tls: bool,
    pub dns_resolver: Option<DnsHook>,
    /// `scheme://[user:pass@]host:port`, forwarded verbatim to
    /// `reqwest::Proxy::all` (spec §4.14 `proxy` option).
    pub proxy_url: Option<String>,
    /// Extra CA certificate (PEM) to trust in addition to the platform
    /// store (spec §4.14 `tls.ca_cert_path`).
    pub extra_root_cert_pem: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            verify_tls: true,
            dns_resolver: None,
            proxy_url: None,
            extra_root_cert_pem: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultipartFile {
    pub field_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;

    async fn post_multipart(
        &self,
        url: &str,
        fields: &[(String, String)],
        file: &MultipartFile,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Value, TransportError>;

    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    async fn get_to_file(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<(), TransportError>;
}

/// A [`reqwest::dns::Resolve`] that consults the process-wide hook first and
/// falls back to `tokio::net::lookup_host` (the system resolver) when the
/// hook declines a name.
struct HookedResolver {
    hook: DnsHook,
}

impl Resolve for HookedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let hook = self.hook.clone();
        let host = name.as_str().to_string();
        Box::pin(async move {
            if let Some(addr) = hook(&host) {
                let addrs: Addrs = Box::new(std::iter::once(addr));
                return Ok(addrs);
            }
            let resolved = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?;
            let addrs: Addrs = Box::new(resolved);
            Ok(addrs)
        })
    }
}

pub struct ReqwestHttpBackend {
    client: reqwest::Client,
}

impl ReqwestHttpBackend {
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.verify_tls);

        if let Some(hook) = config.dns_resolver {
            builder = builder.dns_resolver(Arc::new(HookedResolver { hook }));
        }

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| TransportError::Http(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        if let Some(pem) = &config.extra_root_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| TransportError::Http(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpBackend for ReqwestHttpBackend {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        resp.json::<Value>().await.map_err(|e| TransportError::Http(e.to_string()))
    }

    async fn post_multipart(
        &self,
        url: &str,
        fields: &[(String, String)],
        file: &MultipartFile,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Value, TransportError> {
        let total = file.bytes.len() as u64;
        if let Some(cb) = &on_progress {
            cb(0, Some(total));
        }

        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new().part(file.field_name.clone(), part);
        for (k, v) in fields {
            form = form.text(k.clone(), v.clone());
        }

        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if let Some(cb) = &on_progress {
            cb(total, Some(total));
        }

        resp.json::<Value>().await.map_err(|e| TransportError::Http(e.to_string()))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let resp = self.client.get(url).send().await.map_err(|e| TransportError::Http(e.to_string()))?;
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    async fn get_to_file(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<(), TransportError> {
        let resp = self.client.get(url).send().await.map_err(|e| TransportError::Http(e.to_string()))?;
        let total = resp.content_length();

        let mut file = tokio::fs::File::create(dest).await?;
        let mut received: u64 = 0;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Http(e.to_string()))?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if let Some(cb) = &on_progress {
                cb(received, total);
            }
        }
        file.flush().await?;
        Ok(())
    }
}
