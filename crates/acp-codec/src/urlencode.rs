//! RFC 3986 `unreserved` percent-encoding: `A-Z a-z 0-9 - _ . ~` pass through
//! unescaped; everything else (including space) becomes `%XX`.

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

pub fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UrlDecodeError {
    #[error("truncated percent-escape at byte {0}")]
    Truncated(usize),
    #[error("invalid hex digits in percent-escape at byte {0}")]
    InvalidHex(usize),
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

pub fn url_decode(input: &str) -> Result<String, UrlDecodeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .ok_or(UrlDecodeError::Truncated(i))?;
                let hi = (hex[0] as char).to_digit(16).ok_or(UrlDecodeError::InvalidHex(i))?;
                let lo = (hex[1] as char).to_digit(16).ok_or(UrlDecodeError::InvalidHex(i))?;
                out.push(((hi << 4) | lo) as u8);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| UrlDecodeError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreserved_characters_pass_through() {
        let input = "alice.aid.pub-1_2~3";
        assert_eq!(url_encode(input), input);
    }

    #[test]
    fn reserved_characters_are_percent_escaped() {
        assert_eq!(url_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(url_decode("a%20b%2Fc").unwrap(), "a b/c");
    }

    #[test]
    fn round_trips_json_array_payloads() {
        let json = r#"[{"type":"text","content":"hi there"}]"#;
        let encoded = url_encode(json);
        assert_eq!(url_decode(&encoded).unwrap(), json);
    }

    #[test]
    fn truncated_escape_is_an_error() {
        assert_eq!(url_decode("abc%2"), Err(UrlDecodeError::Truncated(3)));
    }

    #[test]
    fn invalid_hex_digits_are_an_error() {
        assert_eq!(url_decode("%zz"), Err(UrlDecodeError::InvalidHex(0)));
    }
}
