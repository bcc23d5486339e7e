//! Zlib compression for the WSS binary framer (§4.6). Decompression follows
//! the spec's retry-grow policy: an undersized output buffer is doubled and
//! retried, up to 16x the original hint and 5 attempts total, matching a
//! fixed-buffer `uncompress()`-style C API rather than an auto-growing
//! writer.

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// Payloads shorter than this are sent uncompressed by callers (the WSS
/// binary framer); this module itself compresses/decompresses unconditionally
/// whenever asked.
pub const ZLIB_COMPRESS_THRESHOLD: usize = 512;

const MAX_ATTEMPTS: usize = 5;
const MAX_GROWTH_FACTOR: usize = 16;
const MIN_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ZlibError {
    #[error("zlib compression failed: {0}")]
    Compress(String),
    #[error("zlib decompression failed: {0}")]
    Decompress(String),
    #[error("zlib decompression did not converge after {attempts} attempts")]
    BufferExhausted { attempts: usize },
}

pub fn zlib_compress(data: &[u8]) -> Result<Vec<u8>, ZlibError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ZlibError::Compress(e.to_string()))?;
    encoder.finish().map_err(|e| ZlibError::Compress(e.to_string()))
}

/// Decompress `data`, growing the output buffer from `size_hint` up to
/// `size_hint * 16` across at most 5 attempts.
pub fn zlib_decompress(data: &[u8], size_hint: usize) -> Result<Vec<u8>, ZlibError> {
    let base = size_hint.max(MIN_BUFFER);
    let mut capacity = base;

    for attempt in 1..=MAX_ATTEMPTS {
        let mut decompress = Decompress::new(true);
        let mut out = vec![0u8; capacity];
        let status = decompress
            .decompress(data, &mut out, FlushDecompress::Finish)
            .map_err(|e| ZlibError::Decompress(e.to_string()))?;

        match status {
            Status::Ok | Status::StreamEnd => {
                out.truncate(decompress.total_out() as usize);
                return Ok(out);
            }
            Status::BufError => {
                if attempt == MAX_ATTEMPTS || capacity >= base * MAX_GROWTH_FACTOR {
                    return Err(ZlibError::BufferExhausted { attempts: attempt });
                }
                capacity = (capacity * 2).min(base * MAX_GROWTH_FACTOR);
            }
        }
    }
    Err(ZlibError::BufferExhausted { attempts: MAX_ATTEMPTS })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_payload() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = zlib_compress(&data).unwrap();
        let decompressed = zlib_decompress(&compressed, data.len() / 4).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn grows_the_output_buffer_when_the_initial_hint_is_too_small() {
        let data = vec![7u8; 8192];
        let compressed = zlib_compress(&data).unwrap();
        // Deliberately undersized hint forces at least one retry.
        let decompressed = zlib_decompress(&compressed, 16).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn garbage_input_fails_cleanly() {
        let result = zlib_decompress(b"not zlib data", 64);
        assert!(result.is_err());
    }
}
