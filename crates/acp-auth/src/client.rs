//! Two-step challenge/proof sign-in against `<base>/sign_in` (spec §4.7).

use std::time::Duration;

use acp_crypto::ecdsa::ecdsa_sha256_sign;
use acp_crypto::public_key_pem_from_cert;
use acp_transport::HttpBackend;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::state::{AuthSession, AuthState};

const DEFAULT_MAX_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_secs(6);

pub struct AuthClient {
    base_url: String,
    key_pem: String,
    cert_pem: String,
    max_retries: u32,
    state: AuthState,
}

impl AuthClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, key_pem: impl Into<String>, cert_pem: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            key_pem: key_pem.into(),
            cert_pem: cert_pem.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            state: AuthState::default(),
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn session(&self) -> AuthSession {
        self.state.snapshot()
    }

    pub async fn sign_in(&self, http: &dyn HttpBackend, agent_id: &str) -> Result<AuthSession, AuthError> {
        let request_id = Uuid::new_v4().simple().to_string();
        let url = format!("{}/sign_in", self.base_url.trim_end_matches('/'));

        let challenge_body = json!({ "agent_id": agent_id, "request_id": request_id });
        let challenge_resp = self.post_with_retries(http, &url, &challenge_body).await?;

        if let Some(signature) = challenge_resp.get("signature").and_then(Value::as_str) {
            if challenge_resp.get("nonce").is_none() {
                debug!(agent_id, "sign-in short-circuited: server already holds a valid signature");
                return self.finish(signature.to_string(), &challenge_resp);
            }
        }

        let nonce = challenge_resp
            .get("nonce")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Parse("challenge response missing nonce".to_string()))?;

        let sig_hex = ecdsa_sha256_sign(&self.key_pem, nonce.as_bytes())
            .map_err(|e| AuthError::Crypto(e.to_string()))?;
        let public_key_pem =
            public_key_pem_from_cert(&self.cert_pem).map_err(|e| AuthError::Crypto(e.to_string()))?;

        let proof_body = json!({
            "agent_id": agent_id,
            "request_id": request_id,
            "nonce": nonce,
            "public_key": public_key_pem,
            "cert": self.cert_pem,
            "signature": sig_hex,
        });
        let proof_resp = self.post_with_retries(http, &url, &proof_body).await?;

        let signature = proof_resp
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Parse("proof response missing signature".to_string()))?
            .to_string();
        self.finish(signature, &proof_resp)
    }

    fn finish(&self, signature: String, resp: &Value) -> Result<AuthSession, AuthError> {
        let server_ip = resp
            .get("server_ip")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Parse("response missing server_ip".to_string()))?
            .to_string();
        let port = resp
            .get("port")
            .and_then(Value::as_u64)
            .ok_or_else(|| AuthError::Parse("response missing port".to_string()))? as u16;
        let sign_cookie = resp.get("sign_cookie").and_then(Value::as_u64).unwrap_or(0);

        self.state.set_signed_in(signature, server_ip, port, sign_cookie);
        Ok(self.state.snapshot())
    }

    pub async fn sign_out(&self, http: &dyn HttpBackend, agent_id: &str) -> Result<(), AuthError> {
        let signature = self.state.snapshot().signature;
        let url = format!("{}/sign_out", self.base_url.trim_end_matches('/'));
        let body = json!({ "agent_id": agent_id, "signature": signature });

        let result = http.post_json(&url, &body).await;
        self.state.clear();
        if let Err(e) = result {
            warn!(agent_id, error = %e, "sign_out request failed; local signature cleared anyway");
        }
        Ok(())
    }

    /// Retries up to `max_retries` times on HTTP failure only; parse and
    /// crypto failures are fatal and never retried (spec §4.7).
    async fn post_with_retries(&self, http: &dyn HttpBackend, url: &str, body: &Value) -> Result<Value, AuthError> {
        let mut attempt = 0;
        loop {
            match http.post_json(url, body).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "sign-in request failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(AuthError::Http(e.to_string())),
            }
        }
    }
}
