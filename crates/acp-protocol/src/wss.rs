//! 28-byte binary WebSocket envelope used for stream traffic (spec §4.6):
//!
//! ```text
//! u8 magic1=0x4D | u8 magic2=0x55 | u16 version(=0x0101) | u32 flags
//! u16 msg_type   | u32 msg_seq    | u8 content_type      | u8 compressed
//! u32 reserved   | u32 crc32      | u32 payload_length
//! ```

use acp_codec::{crc32_ieee, zlib_compress, zlib_decompress, ZLIB_COMPRESS_THRESHOLD};

pub const HEADER_LEN: usize = 28;
const MAGIC1: u8 = 0x4D;
const MAGIC2: u8 = 0x55;
const VERSION: u16 = 0x0101;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WssFrameError {
    #[error("frame shorter than the 28-byte header")]
    Truncated,
    #[error("bad magic bytes")]
    BadMagic,
    #[error("payload_length does not match remaining bytes")]
    LengthMismatch,
    #[error("crc32 mismatch")]
    CrcMismatch,
    #[error("decompression failed: {0}")]
    Decompress(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WssHeader {
    pub flags: u32,
    pub msg_type: u16,
    pub msg_seq: u32,
    pub content_type: u8,
    pub reserved: u32,
}

/// Encode `payload` under `header`, compressing it first when it is at
/// least [`ZLIB_COMPRESS_THRESHOLD`] bytes.
#[must_use]
pub fn encode_wss_frame(header: &WssHeader, payload: &[u8]) -> Vec<u8> {
    let (body, compressed) = if payload.len() >= ZLIB_COMPRESS_THRESHOLD {
        match zlib_compress(payload) {
            Ok(compressed_body) => (compressed_body, true),
            Err(_) => (payload.to_vec(), false),
        }
    } else {
        (payload.to_vec(), false)
    };
    let crc32 = crc32_ieee(&body);

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(MAGIC1);
    out.push(MAGIC2);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&header.flags.to_be_bytes());
    out.extend_from_slice(&header.msg_type.to_be_bytes());
    out.extend_from_slice(&header.msg_seq.to_be_bytes());
    out.push(header.content_type);
    out.push(u8::from(compressed));
    out.extend_from_slice(&header.reserved.to_be_bytes());
    out.extend_from_slice(&crc32.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Decode a frame produced by [`encode_wss_frame`], returning the header and
/// the original (decompressed) payload.
pub fn decode_wss_frame(frame: &[u8]) -> Result<(WssHeader, Vec<u8>), WssFrameError> {
    if frame.len() < HEADER_LEN {
        return Err(WssFrameError::Truncated);
    }
    if frame[0] != MAGIC1 || frame[1] != MAGIC2 {
        return Err(WssFrameError::BadMagic);
    }

    let flags = u32::from_be_bytes(frame[4..8].try_into().unwrap());
    let msg_type = u16::from_be_bytes(frame[8..10].try_into().unwrap());
    let msg_seq = u32::from_be_bytes(frame[10..14].try_into().unwrap());
    let content_type = frame[14];
    let compressed = frame[15] != 0;
    let reserved = u32::from_be_bytes(frame[16..20].try_into().unwrap());
    let crc32 = u32::from_be_bytes(frame[20..24].try_into().unwrap());
    let payload_length = u32::from_be_bytes(frame[24..28].try_into().unwrap()) as usize;

    let body = &frame[HEADER_LEN..];
    if body.len() != payload_length {
        return Err(WssFrameError::LengthMismatch);
    }
    if crc32_ieee(body) != crc32 {
        return Err(WssFrameError::CrcMismatch);
    }

    let payload = if compressed {
        zlib_decompress(body, body.len() * 4).map_err(|e| WssFrameError::Decompress(e.to_string()))?
    } else {
        body.to_vec()
    };

    Ok((
        WssHeader { flags, msg_type, msg_seq, content_type, reserved },
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> WssHeader {
        WssHeader { flags: 0, msg_type: 1, msg_seq: 1, content_type: 0, reserved: 0 }
    }

    #[test]
    fn round_trips_small_uncompressed_payload() {
        let frame = encode_wss_frame(&header(), b"hello");
        let (hdr, payload) = decode_wss_frame(&frame).unwrap();
        assert_eq!(hdr, header());
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn round_trips_large_compressed_payload() {
        let payload = vec![b'x'; 2048];
        let frame = encode_wss_frame(&header(), &payload);
        let (_, decoded) = decode_wss_frame(&frame).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn flipping_a_payload_byte_is_detected() {
        let mut frame = encode_wss_frame(&header(), b"hello world");
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert_eq!(decode_wss_frame(&frame), Err(WssFrameError::CrcMismatch));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut frame = encode_wss_frame(&header(), b"hello");
        frame[0] = 0x00;
        assert_eq!(decode_wss_frame(&frame), Err(WssFrameError::BadMagic));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert_eq!(decode_wss_frame(&[0u8; 10]), Err(WssFrameError::Truncated));
    }
}
