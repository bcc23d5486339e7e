//! IEEE 802.3 (zlib) CRC32, table-driven via `crc32fast` (which implements
//! the same polynomial the WSS binary framer's header field expects).

pub fn crc32_ieee(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_test_vectors() {
        assert_eq!(crc32_ieee(b""), 0);
        assert_eq!(crc32_ieee(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32_ieee(b"The quick brown fox jumps over the lazy dog"), 0x414F_A339);
    }

    #[test]
    fn single_bit_flip_changes_the_checksum() {
        let original = b"agentcp-payload".to_vec();
        let mut flipped = original.clone();
        flipped[0] ^= 0x01;
        assert_ne!(crc32_ieee(&original), crc32_ieee(&flipped));
    }
}
