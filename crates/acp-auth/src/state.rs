//! Credentials cached after a successful sign-in. Set atomically — every
//! field updates together under one lock acquisition (spec §4.7).

use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    pub signature: Option<String>,
    pub server_ip: Option<String>,
    pub port: Option<u16>,
    pub sign_cookie: Option<u64>,
    pub signed_in: bool,
}

#[derive(Default)]
pub struct AuthState {
    inner: RwLock<AuthSession>,
}

impl AuthState {
    pub fn snapshot(&self) -> AuthSession {
        self.inner.read().clone()
    }

    pub fn set_signed_in(&self, signature: String, server_ip: String, port: u16, sign_cookie: u64) {
        let mut guard = self.inner.write();
        *guard = AuthSession {
            signature: Some(signature),
            server_ip: Some(server_ip),
            port: Some(port),
            sign_cookie: Some(sign_cookie),
            signed_in: true,
        };
    }

    pub fn clear(&self) {
        *self.inner.write() = AuthSession::default();
    }
}
