//! Big-endian integer read/write helpers for the UDP and WSS binary framers.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndianError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
}

pub fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn read_u16(buf: &[u8]) -> Result<u16, EndianError> {
    let bytes: [u8; 2] = buf
        .get(..2)
        .ok_or(EndianError::TooShort { need: 2, have: buf.len() })?
        .try_into()
        .expect("slice length checked");
    Ok(u16::from_be_bytes(bytes))
}

pub fn read_u32(buf: &[u8]) -> Result<u32, EndianError> {
    let bytes: [u8; 4] = buf
        .get(..4)
        .ok_or(EndianError::TooShort { need: 4, have: buf.len() })?
        .try_into()
        .expect("slice length checked");
    Ok(u32::from_be_bytes(bytes))
}

pub fn read_u64(buf: &[u8]) -> Result<u64, EndianError> {
    let bytes: [u8; 8] = buf
        .get(..8)
        .ok_or(EndianError::TooShort { need: 8, have: buf.len() })?
        .try_into()
        .expect("slice length checked");
    Ok(u64::from_be_bytes(bytes))
}

pub fn read_i64(buf: &[u8]) -> Result<i64, EndianError> {
    let bytes: [u8; 8] = buf
        .get(..8)
        .ok_or(EndianError::TooShort { need: 8, have: buf.len() })?
        .try_into()
        .expect("slice length checked");
    Ok(i64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_u16_u32_u64_i64() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 0x1234);
        write_u32(&mut buf, 0xdead_beef);
        write_u64(&mut buf, 0x0102_0304_0506_0708);
        write_i64(&mut buf, -1);

        assert_eq!(read_u16(&buf[0..2]).unwrap(), 0x1234);
        assert_eq!(read_u32(&buf[2..6]).unwrap(), 0xdead_beef);
        assert_eq!(read_u64(&buf[6..14]).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(read_i64(&buf[14..22]).unwrap(), -1);
    }

    #[test]
    fn short_buffer_is_an_error_not_a_panic() {
        assert_eq!(read_u32(&[0, 1]), Err(EndianError::TooShort { need: 4, have: 2 }));
    }
}
