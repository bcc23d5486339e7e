//! Identity and message-authentication primitives for the ACP SDK: P-384
//! key generation and signing, CSR issuance, AES-256-GCM session payload
//! sealing, encrypted-at-rest key storage, and the occasional Ed25519
//! signature for consumers that want one.

pub mod aead;
pub mod cert;
pub mod csr;
pub mod ecdsa;
pub mod ed25519;
pub mod error;
pub mod hash;
pub mod pem_store;

pub use aead::{aes_gcm_decrypt, aes_gcm_encrypt};
pub use cert::public_key_pem_from_cert;
pub use csr::generate_csr;
pub use ecdsa::{ecdsa_sha256_sign, ecdsa_sha256_verify, generate_ec_p384_key};
pub use ed25519::{ed25519_sign, ed25519_verify, generate_ed25519_key};
pub use error::CryptoError;
pub use hash::{random_bytes, sha256_hex};
pub use pem_store::{load_private_key, save_private_key};
