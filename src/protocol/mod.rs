//! MySQL client/server protocol implementation
//!
//! This module implements the subset of the protocol needed to bootstrap a
//! TiDB connection:
//! * Handshake v10 and HandshakeResponse41
//! * SSLRequest and the in-place TLS upgrade
//! * Authentication exchanges (switch requests, more-data continuations)
//! * COM_QUERY with text result sets, COM_PING, COM_QUIT
//!
//! Prepared statements and the binary row protocol are not supported.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use decode::{
    decode_auth_reply, decode_column_definition, decode_command_reply, decode_eof, decode_error,
    decode_handshake, decode_ok, decode_packet, decode_row, Packet, MAX_MESSAGE_LENGTH,
};
pub use encode::{encode_message, frame_packet};
pub use message::{
    AuthReply, ColumnDefinition, CommandReply, EofPacket, ErrorPacket, FrontendMessage, Handshake,
    HandshakeResponse, OkPacket, RowPacket,
};
