//! ECDSA P-384 keypair management and the SHA-256-over-P-384 signature used
//! to prove possession of the AID's private key during sign-in (spec §4.7).
//!
//! Note: pairing P-384 with SHA-256 (rather than the conventional SHA-384)
//! is an explicit requirement of `ecdsa_sha256_sign` in spec §4.2 — it is
//! cryptographically valid, just non-default, and kept exactly as specified.

use ecdsa::signature::DigestSigner;
use p384::ecdsa::{Signature, SigningKey};
use p384::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use p384::SecretKey;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Generate a fresh, unencrypted PKCS#8 PEM-encoded P-384 private key.
pub fn generate_ec_p384_key() -> Result<String, CryptoError> {
    let secret_key = SecretKey::random(&mut rand_core::OsRng);
    secret_key
        .to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| CryptoError::Pkcs8(e.to_string()))
}

/// Sign `data` with the P-384 private key `key_pem` (unencrypted PKCS#8 PEM)
/// using SHA-256 as the digest, returning a lowercase hex DER signature.
pub fn ecdsa_sha256_sign(key_pem: &str, data: &[u8]) -> Result<String, CryptoError> {
    let secret_key =
        SecretKey::from_pkcs8_pem(key_pem).map_err(|e| CryptoError::Pkcs8(e.to_string()))?;
    let signing_key = SigningKey::from(secret_key);
    let digest = Sha256::new_with_prefix(data);
    let signature: Signature = signing_key
        .try_sign_digest(digest)
        .map_err(|e| CryptoError::Sign(e.to_string()))?;
    Ok(hex::encode(signature.to_der().as_bytes()))
}

/// Verify a hex-encoded DER ECDSA signature produced by [`ecdsa_sha256_sign`].
pub fn ecdsa_sha256_verify(public_key_pem: &str, data: &[u8], signature_hex: &str) -> Result<(), CryptoError> {
    use ecdsa::signature::DigestVerifier;
    use p384::ecdsa::VerifyingKey;
    use p384::pkcs8::DecodePublicKey;

    let verifying_key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|e| CryptoError::Pkcs8(e.to_string()))?;
    let sig_bytes = hex::decode(signature_hex).map_err(|e| CryptoError::Sign(e.to_string()))?;
    let signature =
        Signature::from_der(&sig_bytes).map_err(|e| CryptoError::Sign(e.to_string()))?;
    let digest = Sha256::new_with_prefix(data);
    verifying_key
        .verify_digest(digest, &signature)
        .map_err(|_| CryptoError::VerifyFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let key_pem = generate_ec_p384_key().unwrap();
        let secret_key = SecretKey::from_pkcs8_pem(&key_pem).unwrap();
        let public_key_pem = secret_key
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let sig_hex = ecdsa_sha256_sign(&key_pem, b"nonce-value").unwrap();
        ecdsa_sha256_verify(&public_key_pem, b"nonce-value", &sig_hex).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let key_pem = generate_ec_p384_key().unwrap();
        let secret_key = SecretKey::from_pkcs8_pem(&key_pem).unwrap();
        let public_key_pem = secret_key
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let sig_hex = ecdsa_sha256_sign(&key_pem, b"nonce-value").unwrap();
        assert!(ecdsa_sha256_verify(&public_key_pem, b"different-nonce", &sig_hex).is_err());
    }
}
