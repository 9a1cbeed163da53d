//! Protocol message decoding

use super::constants::{capabilities as caps, headers, PROTOCOL_VERSION};
use super::message::{
    AuthReply, ColumnDefinition, CommandReply, EofPacket, ErrorPacket, Handshake, OkPacket,
    RowPacket,
};
use bytes::{Bytes, BytesMut};
use std::io;

/// Maximum logical payload (1 GiB), matching the server's `max_allowed_packet` ceiling.
///
/// Split payloads are reassembled up to this size; anything larger is
/// rejected before allocation.
pub const MAX_MESSAGE_LENGTH: usize = 1_073_741_824;

/// One wire packet
#[derive(Debug, Clone)]
pub struct Packet {
    /// Sequence id
    pub seq: u8,
    /// Payload
    pub payload: Bytes,
}

/// Decode one packet from the front of `data`
///
/// Returns the packet and the number of bytes consumed. The caller advances
/// the buffer. An incomplete packet yields `UnexpectedEof`.
pub fn decode_packet(data: &BytesMut) -> io::Result<(Packet, usize)> {
    if data.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete packet header",
        ));
    }

    let len = u32::from_le_bytes([data[0], data[1], data[2], 0]) as usize;
    let seq = data[3];

    if data.len() < 4 + len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete packet body",
        ));
    }

    let payload = Bytes::copy_from_slice(&data[4..4 + len]);
    Ok((Packet { seq, payload }, 4 + len))
}

/// Bounds-checked little-endian reader over a payload
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub(crate) fn take(&mut self, n: usize, what: &str) -> io::Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated {}", what),
            ));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn u8(&mut self, what: &str) -> io::Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn u16(&mut self, what: &str) -> io::Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self, what: &str) -> io::Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Length-encoded integer; `None` is the NULL marker (0xFB)
    pub(crate) fn lenenc_int(&mut self, what: &str) -> io::Result<Option<u64>> {
        let first = self.u8(what)?;
        let value = match first {
            0x00..=0xFA => u64::from(first),
            0xFB => return Ok(None),
            0xFC => u64::from(self.u16(what)?),
            0xFD => {
                let b = self.take(3, what)?;
                u64::from(u32::from_le_bytes([b[0], b[1], b[2], 0]))
            }
            0xFE => {
                let b = self.take(8, what)?;
                u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            0xFF => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid length-encoded integer in {}", what),
                ))
            }
        };
        Ok(Some(value))
    }

    /// Length-encoded string; `None` is SQL NULL
    pub(crate) fn lenenc_bytes(&mut self, what: &str) -> io::Result<Option<&'a [u8]>> {
        match self.lenenc_int(what)? {
            None => Ok(None),
            Some(len) => {
                let len = usize::try_from(len).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("{} too long", what))
                })?;
                self.take(len, what).map(Some)
            }
        }
    }

    pub(crate) fn lenenc_string(&mut self, what: &str) -> io::Result<String> {
        Ok(self
            .lenenc_bytes(what)?
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default())
    }

    pub(crate) fn null_str(&mut self, what: &str) -> io::Result<String> {
        let rest = &self.buf[self.pos..];
        let end = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("missing null terminator in {}", what),
            )
        })?;
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(s)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// Decode the initial handshake (protocol version 10)
pub fn decode_handshake(payload: &[u8]) -> io::Result<Handshake> {
    let mut c = Cursor::new(payload);

    let protocol_version = c.u8("protocol version")?;
    if protocol_version != PROTOCOL_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported protocol version: {}", protocol_version),
        ));
    }

    let server_version = c.null_str("server version")?;
    let connection_id = c.u32("connection id")?;
    let mut scramble = c.take(8, "auth plugin data")?.to_vec();
    c.u8("filler")?;
    let mut capabilities = u32::from(c.u16("capability flags")?);

    let mut collation = 0;
    let mut status = 0;
    let mut auth_plugin = None;

    if c.remaining() > 0 {
        collation = c.u8("character set")?;
        status = c.u16("status flags")?;
        capabilities |= u32::from(c.u16("capability flags")?) << 16;
        let auth_data_len = c.u8("auth plugin data length")? as usize;
        c.take(10, "reserved")?;

        if capabilities & caps::SECURE_CONNECTION != 0 {
            let part2_len = auth_data_len.saturating_sub(8).max(13);
            let available = c.remaining();
            let part2 = c.take(part2_len.min(available), "auth plugin data")?;
            // Trailing NUL is not part of the scramble
            let part2 = part2.strip_suffix(b"\0").unwrap_or(part2);
            scramble.extend_from_slice(part2);
        }

        if capabilities & caps::PLUGIN_AUTH != 0 {
            let rest = c.rest();
            let name = rest.strip_suffix(b"\0").unwrap_or(rest);
            auth_plugin = Some(String::from_utf8_lossy(name).into_owned());
        }
    }

    Ok(Handshake {
        protocol_version,
        server_version,
        connection_id,
        scramble,
        capabilities,
        collation,
        status,
        auth_plugin,
    })
}

/// Decode an OK packet (header 0x00, or 0xFE when it terminates rows)
pub fn decode_ok(payload: &[u8]) -> io::Result<OkPacket> {
    let mut c = Cursor::new(payload);
    let header = c.u8("OK header")?;
    if header != headers::OK && header != headers::EOF {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("not an OK packet: 0x{:02X}", header),
        ));
    }

    let affected_rows = c.lenenc_int("affected rows")?.unwrap_or(0);
    let last_insert_id = c.lenenc_int("last insert id")?.unwrap_or(0);
    let (status, warnings) = if c.remaining() >= 4 {
        (c.u16("status flags")?, c.u16("warnings")?)
    } else {
        (0, 0)
    };
    let info = String::from_utf8_lossy(c.rest()).into_owned();

    Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status,
        warnings,
        info,
    })
}

/// Decode an ERR packet
pub fn decode_error(payload: &[u8]) -> io::Result<ErrorPacket> {
    let mut c = Cursor::new(payload);
    let header = c.u8("ERR header")?;
    if header != headers::ERR {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("not an ERR packet: 0x{:02X}", header),
        ));
    }

    let code = c.u16("error code")?;
    let sql_state = if c.peek() == Some(b'#') {
        c.u8("SQL state marker")?;
        String::from_utf8_lossy(c.take(5, "SQL state")?).into_owned()
    } else {
        "HY000".to_string()
    };
    let message = String::from_utf8_lossy(c.rest()).into_owned();

    Ok(ErrorPacket {
        code,
        sql_state,
        message,
    })
}

/// Decode an EOF packet
pub fn decode_eof(payload: &[u8]) -> io::Result<EofPacket> {
    let mut c = Cursor::new(payload);
    c.u8("EOF header")?;
    if c.remaining() < 4 {
        return Ok(EofPacket::default());
    }
    Ok(EofPacket {
        warnings: c.u16("warnings")?,
        status: c.u16("status flags")?,
    })
}

/// Decode a reply received during authentication
pub fn decode_auth_reply(payload: &[u8]) -> io::Result<AuthReply> {
    match payload.first() {
        Some(&headers::OK) => Ok(AuthReply::Ok(decode_ok(payload)?)),
        Some(&headers::ERR) => Ok(AuthReply::Err(decode_error(payload)?)),
        Some(&headers::EOF) => {
            let mut c = Cursor::new(&payload[1..]);
            if c.remaining() == 0 {
                // Pre-4.1 switch request
                return Ok(AuthReply::Switch {
                    plugin: "mysql_old_password".into(),
                    data: Vec::new(),
                });
            }
            let plugin = c.null_str("auth plugin name")?;
            let data = c.rest();
            let data = data.strip_suffix(b"\0").unwrap_or(data).to_vec();
            Ok(AuthReply::Switch { plugin, data })
        }
        Some(&headers::AUTH_MORE_DATA) => Ok(AuthReply::MoreData(payload[1..].to_vec())),
        Some(other) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected authentication packet: 0x{:02X}", other),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "empty authentication packet",
        )),
    }
}

/// Decode the first reply to a command
pub fn decode_command_reply(payload: &[u8]) -> io::Result<CommandReply> {
    match payload.first() {
        Some(&headers::OK) => Ok(CommandReply::Ok(decode_ok(payload)?)),
        Some(&headers::ERR) => Ok(CommandReply::Err(decode_error(payload)?)),
        Some(&headers::LOCAL_INFILE) => Ok(CommandReply::LocalInfile(
            String::from_utf8_lossy(&payload[1..]).into_owned(),
        )),
        Some(_) => {
            let column_count = Cursor::new(payload)
                .lenenc_int("column count")?
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "NULL column count"))?;
            Ok(CommandReply::ResultSet { column_count })
        }
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "empty command reply",
        )),
    }
}

/// Decode a column definition
pub fn decode_column_definition(payload: &[u8]) -> io::Result<ColumnDefinition> {
    let mut c = Cursor::new(payload);

    c.lenenc_bytes("catalog")?;
    let schema = c.lenenc_string("schema")?;
    let table = c.lenenc_string("table")?;
    c.lenenc_bytes("original table")?;
    let name = c.lenenc_string("column name")?;
    c.lenenc_bytes("original column name")?;
    c.lenenc_int("fixed fields length")?;

    Ok(ColumnDefinition {
        schema,
        table,
        name,
        charset: c.u16("character set")?,
        column_length: c.u32("column length")?,
        column_type: c.u8("column type")?,
        flags: c.u16("column flags")?,
        decimals: c.u8("decimals")?,
    })
}

/// Decode a packet from the row section of a text result set
///
/// Rows carry exactly `columns` values.
pub fn decode_row(payload: &[u8], columns: usize) -> io::Result<RowPacket> {
    match payload.first() {
        // A row can also start with 0xFE when its first value is very long,
        // but such a row is never shorter than 9 bytes
        Some(&headers::EOF) if payload.len() < 9 => Ok(RowPacket::Eof(decode_eof(payload)?)),
        Some(&headers::ERR) => Ok(RowPacket::Err(decode_error(payload)?)),
        _ => {
            let mut c = Cursor::new(payload);
            let mut values = Vec::with_capacity(columns);
            for _ in 0..columns {
                values.push(c.lenenc_bytes("row value")?.map(Bytes::copy_from_slice));
            }
            if c.remaining() != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} trailing bytes after row", c.remaining()),
                ));
            }
            Ok(RowPacket::Row(values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::capabilities;

    fn handshake_payload(plugin: &str, scramble: &[u8; 20]) -> Vec<u8> {
        let caps = capabilities::PROTOCOL_41
            | capabilities::SECURE_CONNECTION
            | capabilities::PLUGIN_AUTH
            | capabilities::SSL;
        let mut p = vec![10];
        p.extend_from_slice(b"8.0.11-TiDB-v7.5.0\0");
        p.extend_from_slice(&42u32.to_le_bytes());
        p.extend_from_slice(&scramble[..8]);
        p.push(0);
        p.extend_from_slice(&(caps as u16).to_le_bytes());
        p.push(45);
        p.extend_from_slice(&2u16.to_le_bytes());
        p.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
        p.push(21);
        p.extend_from_slice(&[0; 10]);
        p.extend_from_slice(&scramble[8..]);
        p.push(0);
        p.extend_from_slice(plugin.as_bytes());
        p.push(0);
        p
    }

    #[test]
    fn test_decode_packet() {
        let data = BytesMut::from(&[3, 0, 0, 7, b'a', b'b', b'c', 0xFF][..]);
        let (packet, consumed) = decode_packet(&data).unwrap();
        assert_eq!(packet.seq, 7);
        assert_eq!(&packet.payload[..], b"abc");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_decode_packet_incomplete() {
        let data = BytesMut::from(&[5, 0, 0, 0, 1, 2][..]);
        let err = decode_packet(&data).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let data = BytesMut::from(&[5, 0][..]);
        assert_eq!(
            decode_packet(&data).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_decode_handshake() {
        let scramble: [u8; 20] = std::array::from_fn(|i| i as u8 + 1);
        let hs = decode_handshake(&handshake_payload("mysql_native_password", &scramble)).unwrap();

        assert_eq!(hs.protocol_version, 10);
        assert_eq!(hs.server_version, "8.0.11-TiDB-v7.5.0");
        assert_eq!(hs.connection_id, 42);
        assert_eq!(hs.scramble, scramble.to_vec());
        assert_eq!(hs.collation, 45);
        assert_eq!(hs.status, 2);
        assert!(hs.supports(capabilities::SSL));
        assert!(hs.supports(capabilities::PLUGIN_AUTH));
        assert_eq!(hs.auth_plugin.as_deref(), Some("mysql_native_password"));
    }

    #[test]
    fn test_decode_handshake_rejects_old_protocol() {
        let err = decode_handshake(&[9, b'x', 0]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_decode_handshake_truncated() {
        let scramble = [1u8; 20];
        let payload = handshake_payload("mysql_native_password", &scramble);
        assert!(decode_handshake(&payload[..20]).is_err());
    }

    #[test]
    fn test_decode_ok() {
        let ok = decode_ok(&[0x00, 0x03, 0xFC, 0x10, 0x27, 0x02, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(ok.affected_rows, 3);
        assert_eq!(ok.last_insert_id, 10_000);
        assert_eq!(ok.status, 2);
        assert_eq!(ok.warnings, 1);
        assert_eq!(ok.info, "");
    }

    #[test]
    fn test_decode_error_with_sql_state() {
        let mut payload = vec![0xFF, 0x15, 0x04, b'#'];
        payload.extend_from_slice(b"28000Access denied for user 'root'");
        let err = decode_error(&payload).unwrap();
        assert_eq!(err.code, 1045);
        assert_eq!(err.sql_state, "28000");
        assert_eq!(err.message, "Access denied for user 'root'");
        assert_eq!(
            err.to_string(),
            "1045 (28000): Access denied for user 'root'"
        );
    }

    #[test]
    fn test_decode_error_without_sql_state() {
        let mut payload = vec![0xFF, 0x69, 0x04];
        payload.extend_from_slice(b"Host is not allowed");
        let err = decode_error(&payload).unwrap();
        assert_eq!(err.code, 1129);
        assert_eq!(err.sql_state, "HY000");
    }

    #[test]
    fn test_decode_auth_switch() {
        let mut payload = vec![0xFE];
        payload.extend_from_slice(b"caching_sha2_password\0");
        payload.extend_from_slice(&[9; 20]);
        payload.push(0);
        match decode_auth_reply(&payload).unwrap() {
            AuthReply::Switch { plugin, data } => {
                assert_eq!(plugin, "caching_sha2_password");
                assert_eq!(data, vec![9; 20]);
            }
            other => panic!("expected Switch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_auth_more_data() {
        match decode_auth_reply(&[0x01, 0x03]).unwrap() {
            AuthReply::MoreData(data) => assert_eq!(data, vec![0x03]),
            other => panic!("expected MoreData, got {:?}", other),
        }
        assert!(decode_auth_reply(&[0x42]).is_err());
        assert!(decode_auth_reply(&[]).is_err());
    }

    #[test]
    fn test_decode_command_reply() {
        assert!(matches!(
            decode_command_reply(&[0x00, 0, 0, 2, 0, 0, 0]).unwrap(),
            CommandReply::Ok(_)
        ));
        assert!(matches!(
            decode_command_reply(&[0x02]).unwrap(),
            CommandReply::ResultSet { column_count: 2 }
        ));
        assert!(matches!(
            decode_command_reply(&[0xFB, b'f']).unwrap(),
            CommandReply::LocalInfile(_)
        ));
    }

    #[test]
    fn test_decode_column_definition() {
        let mut p = Vec::new();
        for s in ["def", "information_schema", "COLUMNS", "COLUMNS", "COLUMN_NAME", "COLUMN_NAME"] {
            p.push(s.len() as u8);
            p.extend_from_slice(s.as_bytes());
        }
        p.push(0x0C);
        p.extend_from_slice(&45u16.to_le_bytes());
        p.extend_from_slice(&256u32.to_le_bytes());
        p.push(0xFD);
        p.extend_from_slice(&1u16.to_le_bytes());
        p.push(0);
        p.extend_from_slice(&[0, 0]);

        let col = decode_column_definition(&p).unwrap();
        assert_eq!(col.schema, "information_schema");
        assert_eq!(col.table, "COLUMNS");
        assert_eq!(col.name, "COLUMN_NAME");
        assert_eq!(col.charset, 45);
        assert_eq!(col.column_length, 256);
        assert_eq!(col.column_type, 0xFD);
        assert_eq!(col.flags, 1);
    }

    #[test]
    fn test_decode_row_with_null() {
        let payload = [0x02, b'i', b'd', 0xFB, 0x00];
        match decode_row(&payload, 3).unwrap() {
            RowPacket::Row(values) => {
                assert_eq!(values[0].as_deref(), Some(&b"id"[..]));
                assert_eq!(values[1], None);
                assert_eq!(values[2].as_deref(), Some(&b""[..]));
            }
            other => panic!("expected Row, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_row_eof_and_err() {
        match decode_row(&[0xFE, 0, 0, 0x08, 0], 1).unwrap() {
            RowPacket::Eof(eof) => assert_eq!(eof.status, 0x08),
            other => panic!("expected Eof, got {:?}", other),
        }
        assert!(matches!(
            decode_row(&[0xFF, 0x01, 0x00], 1).unwrap(),
            RowPacket::Err(_)
        ));
    }

    #[test]
    fn test_decode_row_column_mismatch() {
        assert!(decode_row(&[0x01, b'a', 0x01, b'b'], 1).is_err());
        assert!(decode_row(&[0x01, b'a'], 2).is_err());
    }

    #[test]
    fn test_lenenc_int_forms() {
        let mut c = Cursor::new(&[0xFD, 0x01, 0x02, 0x03]);
        assert_eq!(c.lenenc_int("x").unwrap(), Some(0x030201));
        let mut c = Cursor::new(&[0xFE, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(c.lenenc_int("x").unwrap(), Some(1));
        let mut c = Cursor::new(&[0xFF]);
        assert!(c.lenenc_int("x").is_err());
    }
}
