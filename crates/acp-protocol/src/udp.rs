//! UDP heartbeat channel framing (spec §4.4):
//!
//! ```text
//! varint message_mask | varint message_seq | u16 message_type (BE) | u16 payload_size (BE) | payload
//! ```

use acp_codec::{decode_varint, encode_varint, read_u16, write_u16};

pub const HEARTBEAT_REQ: u16 = 513;
pub const HEARTBEAT_RESP: u16 = 258;
pub const INVITE_REQ: u16 = 259;
pub const INVITE_RESP: u16 = 516;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UdpFrameError {
    #[error("truncated frame")]
    Truncated,
    #[error("unknown message type {0}")]
    UnknownMessageType(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdpMessage {
    HeartbeatReq { agent_id: String, sign_cookie: u64 },
    HeartbeatResp { next_beat_ms: u64 },
    InviteReq {
        inviter_aid: String,
        invite_code: String,
        expires_at: i64,
        session_id: String,
        message_server: String,
    },
    InviteResp {
        agent_id: String,
        inviter_agent_id: String,
        session_id: String,
        sign_cookie: u64,
    },
}

impl UdpMessage {
    #[must_use]
    pub fn message_type(&self) -> u16 {
        match self {
            UdpMessage::HeartbeatReq { .. } => HEARTBEAT_REQ,
            UdpMessage::HeartbeatResp { .. } => HEARTBEAT_RESP,
            UdpMessage::InviteReq { .. } => INVITE_REQ,
            UdpMessage::InviteResp { .. } => INVITE_RESP,
        }
    }

    fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            UdpMessage::HeartbeatReq { agent_id, sign_cookie } => {
                write_varstring(&mut buf, agent_id);
                write_u64_be(&mut buf, *sign_cookie);
            }
            UdpMessage::HeartbeatResp { next_beat_ms } => {
                write_u64_be(&mut buf, *next_beat_ms);
            }
            UdpMessage::InviteReq {
                inviter_aid,
                invite_code,
                expires_at,
                session_id,
                message_server,
            } => {
                write_varstring(&mut buf, inviter_aid);
                write_varstring(&mut buf, invite_code);
                write_i64_be(&mut buf, *expires_at);
                write_varstring(&mut buf, session_id);
                write_varstring(&mut buf, message_server);
            }
            UdpMessage::InviteResp { agent_id, inviter_agent_id, session_id, sign_cookie } => {
                write_varstring(&mut buf, agent_id);
                write_varstring(&mut buf, inviter_agent_id);
                write_varstring(&mut buf, session_id);
                write_u64_be(&mut buf, *sign_cookie);
            }
        }
        buf
    }
}

fn write_varstring(buf: &mut Vec<u8>, s: &str) {
    acp_codec::write_varint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn read_varstring(buf: &[u8]) -> Result<(String, usize), UdpFrameError> {
    let (len, n) = decode_varint(buf);
    if n == 0 {
        return Err(UdpFrameError::Truncated);
    }
    let len = len as usize;
    let rest = &buf[n..];
    if rest.len() < len {
        return Err(UdpFrameError::Truncated);
    }
    let s = String::from_utf8_lossy(&rest[..len]).into_owned();
    Ok((s, n + len))
}

fn write_u64_be(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_i64_be(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn read_u64_be(buf: &[u8]) -> Result<u64, UdpFrameError> {
    let arr: [u8; 8] = buf.get(..8).ok_or(UdpFrameError::Truncated)?.try_into().unwrap();
    Ok(u64::from_be_bytes(arr))
}

fn read_i64_be(buf: &[u8]) -> Result<i64, UdpFrameError> {
    let arr: [u8; 8] = buf.get(..8).ok_or(UdpFrameError::Truncated)?.try_into().unwrap();
    Ok(i64::from_be_bytes(arr))
}

/// Encode `msg` as a full frame: `varint mask | varint seq | type | size | payload`.
#[must_use]
pub fn encode_udp_frame(msg: &UdpMessage, message_mask: u64, message_seq: u64) -> Vec<u8> {
    let payload = msg.encode_payload();
    let mut out = Vec::with_capacity(payload.len() + 16);
    acp_codec::write_varint(&mut out, message_mask);
    acp_codec::write_varint(&mut out, message_seq);
    write_u16(&mut out, msg.message_type());
    write_u16(&mut out, payload.len() as u16);
    out.extend_from_slice(&payload);
    out
}

/// Decode a frame produced by [`encode_udp_frame`], returning
/// `(message_mask, message_seq, message)`.
pub fn decode_udp_frame(buf: &[u8]) -> Result<(u64, u64, UdpMessage), UdpFrameError> {
    let (mask, n1) = decode_varint(buf);
    if n1 == 0 {
        return Err(UdpFrameError::Truncated);
    }
    let rest = &buf[n1..];
    let (seq, n2) = decode_varint(rest);
    if n2 == 0 {
        return Err(UdpFrameError::Truncated);
    }
    let rest = &rest[n2..];

    let message_type = read_u16(rest).map_err(|_| UdpFrameError::Truncated)?;
    let rest = &rest[2..];
    let payload_size = read_u16(rest).map_err(|_| UdpFrameError::Truncated)? as usize;
    let rest = &rest[2..];
    let payload = rest.get(..payload_size).ok_or(UdpFrameError::Truncated)?;

    let msg = decode_payload(message_type, payload)?;
    Ok((mask, seq, msg))
}

fn decode_payload(message_type: u16, payload: &[u8]) -> Result<UdpMessage, UdpFrameError> {
    match message_type {
        HEARTBEAT_REQ => {
            let (agent_id, n) = read_varstring(payload)?;
            let sign_cookie = read_u64_be(&payload[n..])?;
            Ok(UdpMessage::HeartbeatReq { agent_id, sign_cookie })
        }
        HEARTBEAT_RESP => {
            let next_beat_ms = read_u64_be(payload)?;
            Ok(UdpMessage::HeartbeatResp { next_beat_ms })
        }
        INVITE_REQ => {
            let (inviter_aid, n1) = read_varstring(payload)?;
            let (invite_code, n2) = read_varstring(&payload[n1..])?;
            let expires_at = read_i64_be(&payload[n1 + n2..])?;
            let (session_id, n3) = read_varstring(&payload[n1 + n2 + 8..])?;
            let (message_server, _n4) = read_varstring(&payload[n1 + n2 + 8 + n3..])?;
            Ok(UdpMessage::InviteReq {
                inviter_aid,
                invite_code,
                expires_at,
                session_id,
                message_server,
            })
        }
        INVITE_RESP => {
            let (agent_id, n1) = read_varstring(payload)?;
            let (inviter_agent_id, n2) = read_varstring(&payload[n1..])?;
            let (session_id, n3) = read_varstring(&payload[n1 + n2..])?;
            let sign_cookie = read_u64_be(&payload[n1 + n2 + n3..])?;
            Ok(UdpMessage::InviteResp { agent_id, inviter_agent_id, session_id, sign_cookie })
        }
        other => Err(UdpFrameError::UnknownMessageType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_req_round_trips() {
        let msg = UdpMessage::HeartbeatReq { agent_id: "alice.aid.pub".to_string(), sign_cookie: 42 };
        let frame = encode_udp_frame(&msg, 0, 7);
        let (mask, seq, decoded) = decode_udp_frame(&frame).unwrap();
        assert_eq!(mask, 0);
        assert_eq!(seq, 7);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn invite_req_round_trips() {
        let msg = UdpMessage::InviteReq {
            inviter_aid: "alice.aid.pub".to_string(),
            invite_code: "abc123".to_string(),
            expires_at: -1,
            session_id: "s1".to_string(),
            message_server: "wss://ap.example/session".to_string(),
        };
        let frame = encode_udp_frame(&msg, 1, 2);
        let (_, _, decoded) = decode_udp_frame(&frame).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert_eq!(decode_udp_frame(&[0x01]), Err(UdpFrameError::Truncated));
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let mut buf = Vec::new();
        acp_codec::write_varint(&mut buf, 0);
        acp_codec::write_varint(&mut buf, 0);
        write_u16(&mut buf, 9999);
        write_u16(&mut buf, 0);
        assert_eq!(decode_udp_frame(&buf), Err(UdpFrameError::UnknownMessageType(9999)));
    }
}
