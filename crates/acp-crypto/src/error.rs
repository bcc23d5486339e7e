//! Crypto failures are treated as fatal by every caller (spec §4.2 "Failure
//! policy"): no silent fallback, no retry inside this crate.

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGen(String),
    #[error("PEM encode/decode failed: {0}")]
    Pem(String),
    #[error("PKCS#8 encode/decode failed: {0}")]
    Pkcs8(String),
    #[error("CSR generation failed: {0}")]
    Csr(String),
    #[error("certificate parse failed: {0}")]
    Certificate(String),
    #[error("signing failed: {0}")]
    Sign(String),
    #[error("signature verification failed")]
    VerifyFailed,
    #[error("AEAD operation failed: {0}")]
    Aead(String),
    #[error("wrong password or corrupt key file")]
    WrongPassword,
}
