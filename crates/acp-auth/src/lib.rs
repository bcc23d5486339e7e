//! Two-step challenge/proof sign-in against the ACP access point, and
//! sign-out, per spec §4.7.

pub mod client;
pub mod error;
pub mod state;

pub use client::AuthClient;
pub use error::AuthError;
pub use state::AuthSession;

#[cfg(test)]
mod tests {
    use super::*;
    use acp_crypto::csr::generate_csr;
    use acp_crypto::ecdsa::generate_ec_p384_key;
    use acp_transport::{HttpBackend, MultipartFile, ProgressCallback, TransportError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Mutex;

    struct ScriptedHttp {
        responses: Mutex<Vec<Result<Value, String>>>,
    }

    #[async_trait]
    impl HttpBackend for ScriptedHttp {
        async fn post_json(&self, _url: &str, _body: &Value) -> Result<Value, TransportError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(TransportError::Http("no more scripted responses".to_string()));
            }
            match responses.remove(0) {
                Ok(v) => Ok(v),
                Err(e) => Err(TransportError::Http(e)),
            }
        }

        async fn post_multipart(
            &self,
            _url: &str,
            _fields: &[(String, String)],
            _file: &MultipartFile,
            _on_progress: Option<ProgressCallback>,
        ) -> Result<Value, TransportError> {
            unimplemented!("not used by auth tests")
        }

        async fn get(&self, _url: &str) -> Result<Vec<u8>, TransportError> {
            unimplemented!("not used by auth tests")
        }

        async fn get_to_file(
            &self,
            _url: &str,
            _dest: &Path,
            _on_progress: Option<ProgressCallback>,
        ) -> Result<(), TransportError> {
            unimplemented!("not used by auth tests")
        }
    }

    fn self_signed_material() -> (String, String) {
        let key_pem = generate_ec_p384_key().unwrap();
        let cert_pem =
            acp_crypto::cert::generate_self_signed_cert("alice.aid.pub", &key_pem).unwrap();
        (key_pem, cert_pem)
    }

    fn csr_only_material() -> (String, String) {
        // A CSR PEM, not a certificate -- used to exercise the proof step's
        // fatal-failure path when `public_key_pem_from_cert` is handed
        // something that isn't a `CERTIFICATE` block.
        let key_pem = generate_ec_p384_key().unwrap();
        let csr_pem = generate_csr("alice.aid.pub", &key_pem).unwrap();
        (key_pem, csr_pem)
    }

    #[tokio::test]
    async fn two_step_sign_in_succeeds() {
        let (key_pem, cert_pem) = self_signed_material();
        let http = ScriptedHttp {
            responses: Mutex::new(vec![
                Ok(json!({"nonce": "abc123"})),
                Ok(json!({"signature": "sig-final", "server_ip": "10.0.0.1", "port": 9000, "sign_cookie": 42})),
            ]),
        };

        let auth = AuthClient::new("https://ap.example", key_pem, cert_pem);
        let result = auth.sign_in(&http, "alice.aid.pub").await;

        assert!(result.is_ok());
        let session = auth.session();
        assert!(session.signed_in);
        assert_eq!(session.signature.as_deref(), Some("sig-final"));
        assert_eq!(session.sign_cookie, Some(42));
    }

    #[tokio::test]
    async fn proof_step_crypto_failure_is_fatal_not_retried() {
        let (key_pem, csr_pem) = csr_only_material();
        let http = ScriptedHttp {
            responses: Mutex::new(vec![Ok(json!({"nonce": "abc123"}))]),
        };

        let auth = AuthClient::new("https://ap.example", key_pem, csr_pem);
        let result = auth.sign_in(&http, "alice.aid.pub").await;

        // The proof step calls `public_key_pem_from_cert` on a bare CSR PEM,
        // which is not a certificate -- this fails fast with a crypto error
        // rather than retrying.
        assert!(matches!(result, Err(AuthError::Crypto(_))));
    }

    #[tokio::test]
    async fn challenge_response_with_signature_already_present_skips_proof_step() {
        let (key_pem, cert_pem) = self_signed_material();
        let http = ScriptedHttp {
            responses: Mutex::new(vec![Ok(
                json!({"signature": "already-signed", "server_ip": "10.0.0.1", "port": 9000, "sign_cookie": 7}),
            )]),
        };

        let auth = AuthClient::new("https://ap.example", key_pem, cert_pem);
        let result = auth.sign_in(&http, "alice.aid.pub").await;

        assert!(result.is_ok());
        assert_eq!(auth.session().signature.as_deref(), Some("already-signed"));
    }

    #[tokio::test]
    async fn http_failure_is_retried_then_surfaced() {
        let (key_pem, cert_pem) = self_signed_material();
        let http = ScriptedHttp { responses: Mutex::new(vec![]) };
        let auth = AuthClient::new("https://ap.example", key_pem, cert_pem).with_max_retries(0);

        let result = auth.sign_in(&http, "alice.aid.pub").await;
        assert!(matches!(result, Err(AuthError::Http(_))));
    }

    #[tokio::test]
    async fn sign_out_clears_cached_signature_even_on_http_failure() {
        let (key_pem, cert_pem) = self_signed_material();
        let http = ScriptedHttp { responses: Mutex::new(vec![]) };
        let auth = AuthClient::new("https://ap.example", key_pem, cert_pem);

        auth.sign_out(&http, "alice.aid.pub").await.unwrap();
        assert!(!auth.session().signed_in);
    }
}
