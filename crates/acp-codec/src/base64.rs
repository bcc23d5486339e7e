//! Standard (padded) base64, thin wrapper over the `base64` crate kept here
//! so every framing layer goes through one codec surface.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_pads() {
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
        assert_eq!(base64_decode("Zm9v").unwrap(), b"foo");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(base64_decode("not base64!!").is_err());
    }
}
