//! Ed25519 keypair generation and signing. Not on the ACP hot path (that's
//! ECDSA P-384); kept available for consumers that need a faster signature
//! scheme for their own application messages (spec §4.2).

use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::CryptoError;

pub fn generate_ed25519_key() -> Result<String, CryptoError> {
    let signing_key = SigningKey::generate(&mut rand_core::OsRng);
    signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| CryptoError::Pkcs8(e.to_string()))
}

pub fn ed25519_sign(key_pem: &str, data: &[u8]) -> Result<String, CryptoError> {
    let signing_key =
        SigningKey::from_pkcs8_pem(key_pem).map_err(|e| CryptoError::Pkcs8(e.to_string()))?;
    let signature = signing_key.sign(data);
    Ok(hex::encode(signature.to_bytes()))
}

pub fn ed25519_verify(public_key_pem: &str, data: &[u8], signature_hex: &str) -> Result<(), CryptoError> {
    use ed25519_dalek::pkcs8::DecodePublicKey;

    let verifying_key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|e| CryptoError::Pkcs8(e.to_string()))?;
    let sig_bytes = hex::decode(signature_hex).map_err(|e| CryptoError::Sign(e.to_string()))?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| CryptoError::Sign("signature is not 64 bytes".to_string()))?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_array);
    verifying_key
        .verify(data, &signature)
        .map_err(|_| CryptoError::VerifyFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::EncodePublicKey;

    #[test]
    fn sign_and_verify_round_trip() {
        let key_pem = generate_ed25519_key().unwrap();
        let signing_key = SigningKey::from_pkcs8_pem(&key_pem).unwrap();
        let public_key_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let sig_hex = ed25519_sign(&key_pem, b"hello").unwrap();
        ed25519_verify(&public_key_pem, b"hello", &sig_hex).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let key_pem = generate_ed25519_key().unwrap();
        let signing_key = SigningKey::from_pkcs8_pem(&key_pem).unwrap();
        let public_key_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let sig_hex = ed25519_sign(&key_pem, b"hello").unwrap();
        assert!(ed25519_verify(&public_key_pem, b"goodbye", &sig_hex).is_err());
    }
}
