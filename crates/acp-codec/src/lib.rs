//! Pure, side-effect-free codec primitives used by every ACP framing layer:
//! varints, big-endian integers, URL/base64/hex text encodings, CRC32, and
//! zlib compression with the retry-grow buffer policy the UDP/WSS framers
//! rely on.

pub mod base64;
pub mod crc32;
pub mod endian;
pub mod hex;
pub mod urlencode;
pub mod varint;
pub mod zlib;

pub use base64::{base64_decode, base64_encode};
pub use crc32::crc32_ieee;
pub use endian::{read_i64, read_u16, read_u32, read_u64, write_i64, write_u16, write_u32, write_u64, EndianError};
pub use hex::{hex_decode, hex_encode};
pub use urlencode::{url_decode, url_encode};
pub use varint::{decode_varint, encode_varint, write_varint};
pub use zlib::{zlib_compress, zlib_decompress, ZLIB_COMPRESS_THRESHOLD};
