//! Protocol message encoding

use super::constants::{capabilities, commands, MAX_PACKET_SIZE, MAX_PAYLOAD_LEN};
use super::message::{FrontendMessage, HandshakeResponse};
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a frontend message into a packet payload (no header)
pub fn encode_message(msg: &FrontendMessage) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();

    match msg {
        FrontendMessage::SslRequest {
            capabilities,
            collation,
        } => {
            encode_ssl_request(&mut buf, *capabilities, *collation);
        }
        FrontendMessage::HandshakeResponse(response) => {
            encode_handshake_response(&mut buf, response)?;
        }
        FrontendMessage::AuthData(data) => {
            buf.put_slice(data);
        }
        FrontendMessage::Query(query) => {
            buf.put_u8(commands::QUERY);
            buf.put(query.as_bytes());
        }
        FrontendMessage::Ping => {
            buf.put_u8(commands::PING);
        }
        FrontendMessage::Quit => {
            buf.put_u8(commands::QUIT);
        }
    }

    Ok(buf)
}

/// Frame a payload into one or more packets
///
/// Payloads of `MAX_PAYLOAD_LEN` bytes or more are split; a payload that is
/// an exact multiple of the limit is terminated by an empty packet. `seq` is
/// advanced once per packet written.
pub fn frame_packet(out: &mut BytesMut, payload: &[u8], seq: &mut u8) {
    let mut last_len = 0;

    for chunk in payload.chunks(MAX_PAYLOAD_LEN) {
        put_header(out, chunk.len(), seq);
        out.put_slice(chunk);
        last_len = chunk.len();
    }

    if payload.is_empty() || last_len == MAX_PAYLOAD_LEN {
        put_header(out, 0, seq);
    }
}

fn put_header(out: &mut BytesMut, len: usize, seq: &mut u8) {
    out.put_uint_le(len as u64, 3);
    out.put_u8(*seq);
    *seq = seq.wrapping_add(1);
}

fn encode_ssl_request(buf: &mut BytesMut, caps: u32, collation: u8) {
    buf.put_u32_le(caps | capabilities::SSL);
    buf.put_u32_le(MAX_PACKET_SIZE);
    buf.put_u8(collation);
    buf.put_bytes(0, 23);
}

fn encode_handshake_response(buf: &mut BytesMut, response: &HandshakeResponse) -> io::Result<()> {
    let mut caps = response.capabilities;
    if response.database.is_some() {
        caps |= capabilities::CONNECT_WITH_DB;
    } else {
        caps &= !capabilities::CONNECT_WITH_DB;
    }

    buf.put_u32_le(caps);
    buf.put_u32_le(MAX_PACKET_SIZE);
    buf.put_u8(response.collation);
    buf.put_bytes(0, 23);

    put_null_str(buf, &response.user)?;

    // SECURE_CONNECTION: one length byte, then the scramble
    let auth_len = u8::try_from(response.auth_response.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "auth response exceeds 255 bytes")
    })?;
    buf.put_u8(auth_len);
    buf.put_slice(&response.auth_response);

    if let Some(ref db) = response.database {
        put_null_str(buf, db)?;
    }
    if caps & capabilities::PLUGIN_AUTH != 0 {
        put_null_str(buf, &response.auth_plugin)?;
    }

    Ok(())
}

fn put_null_str(buf: &mut BytesMut, s: &str) -> io::Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "string contains a NUL byte",
        ));
    }
    buf.put(s.as_bytes());
    buf.put_u8(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::collations;

    fn response(database: Option<&str>) -> HandshakeResponse {
        HandshakeResponse {
            capabilities: capabilities::PROTOCOL_41
                | capabilities::SECURE_CONNECTION
                | capabilities::PLUGIN_AUTH,
            collation: collations::DEFAULT,
            user: "root".into(),
            auth_response: vec![0xAA; 20],
            database: database.map(String::from),
            auth_plugin: "mysql_native_password".into(),
        }
    }

    #[test]
    fn test_encode_query() {
        let msg = FrontendMessage::Query("SELECT 1".to_string());
        let buf = encode_message(&msg).unwrap();
        assert_eq!(buf[0], commands::QUERY);
        assert_eq!(&buf[1..], b"SELECT 1");
    }

    #[test]
    fn test_encode_ping_and_quit() {
        assert_eq!(&encode_message(&FrontendMessage::Ping).unwrap()[..], &[0x0E]);
        assert_eq!(&encode_message(&FrontendMessage::Quit).unwrap()[..], &[0x01]);
    }

    #[test]
    fn test_encode_ssl_request() {
        let msg = FrontendMessage::SslRequest {
            capabilities: capabilities::PROTOCOL_41,
            collation: collations::DEFAULT,
        };
        let buf = encode_message(&msg).unwrap();

        assert_eq!(buf.len(), 32);
        let caps = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_ne!(caps & capabilities::SSL, 0);
        assert_eq!(buf[8], collations::DEFAULT);
        assert!(buf[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_handshake_response_with_database() {
        let buf = encode_message(&FrontendMessage::HandshakeResponse(response(Some("test"))))
            .unwrap();

        let caps = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_ne!(caps & capabilities::CONNECT_WITH_DB, 0);

        let rest = &buf[32..];
        assert_eq!(&rest[..5], b"root\0");
        assert_eq!(rest[5], 20);
        assert_eq!(&rest[26..31], b"test\0");
        assert_eq!(&rest[31..], b"mysql_native_password\0");
    }

    #[test]
    fn test_encode_handshake_response_without_database() {
        let buf = encode_message(&FrontendMessage::HandshakeResponse(response(None))).unwrap();
        let caps = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_eq!(caps & capabilities::CONNECT_WITH_DB, 0);
        assert_eq!(&buf[32 + 26..], b"mysql_native_password\0");
    }

    #[test]
    fn test_encode_rejects_nul_in_user() {
        let mut r = response(None);
        r.user = "ro\0ot".into();
        assert!(encode_message(&FrontendMessage::HandshakeResponse(r)).is_err());
    }

    #[test]
    fn test_frame_small_packet() {
        let mut out = BytesMut::new();
        let mut seq = 3;
        frame_packet(&mut out, b"\x0e", &mut seq);
        assert_eq!(&out[..], &[1, 0, 0, 3, 0x0E]);
        assert_eq!(seq, 4);
    }

    #[test]
    fn test_frame_splits_large_payload() {
        let payload = vec![7u8; MAX_PAYLOAD_LEN + 10];
        let mut out = BytesMut::new();
        let mut seq = 0;
        frame_packet(&mut out, &payload, &mut seq);

        assert_eq!(&out[..4], &[0xFF, 0xFF, 0xFF, 0]);
        let second = 4 + MAX_PAYLOAD_LEN;
        assert_eq!(&out[second..second + 4], &[10, 0, 0, 1]);
        assert_eq!(seq, 2);
    }

    #[test]
    fn test_frame_exact_multiple_ends_with_empty_packet() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN];
        let mut out = BytesMut::new();
        let mut seq = 0;
        frame_packet(&mut out, &payload, &mut seq);
        assert_eq!(out.len(), 4 + MAX_PAYLOAD_LEN + 4);
        assert_eq!(&out[out.len() - 4..], &[0, 0, 0, 1]);
    }
}
