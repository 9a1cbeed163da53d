//! Protocol message types

use bytes::Bytes;

/// Frontend message (client → server)
#[derive(Debug, Clone)]
pub enum FrontendMessage {
    /// SSLRequest (truncated handshake response asking for TLS)
    SslRequest {
        /// Client capability flags
        capabilities: u32,
        /// Connection collation id
        collation: u8,
    },

    /// HandshakeResponse41
    HandshakeResponse(HandshakeResponse),

    /// Raw authentication data (auth switch response, more-data reply)
    AuthData(Vec<u8>),

    /// COM_QUERY
    Query(String),

    /// COM_PING
    Ping,

    /// COM_QUIT
    Quit,
}

/// HandshakeResponse41 fields
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    /// Client capability flags
    pub capabilities: u32,
    /// Connection collation id
    pub collation: u8,
    /// Username
    pub user: String,
    /// Scrambled password (plugin specific)
    pub auth_response: Vec<u8>,
    /// Initial database; only sent with `CONNECT_WITH_DB`
    pub database: Option<String>,
    /// Authentication plugin the response was computed with
    pub auth_plugin: String,
}

/// Initial handshake (protocol version 10)
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Protocol version
    pub protocol_version: u8,
    /// Server version string
    pub server_version: String,
    /// Connection (thread) id
    pub connection_id: u32,
    /// Authentication scramble (nonce)
    pub scramble: Vec<u8>,
    /// Server capability flags
    pub capabilities: u32,
    /// Server default collation id
    pub collation: u8,
    /// Server status flags
    pub status: u16,
    /// Default authentication plugin
    pub auth_plugin: Option<String>,
}

impl Handshake {
    /// Whether the server advertises a capability
    pub fn supports(&self, flag: u32) -> bool {
        self.capabilities & flag != 0
    }
}

/// OK packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    /// Rows changed by the statement
    pub affected_rows: u64,
    /// Last generated auto-increment value
    pub last_insert_id: u64,
    /// Server status flags
    pub status: u16,
    /// Warning count
    pub warnings: u16,
    /// Human-readable status information
    pub info: String,
}

/// ERR packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPacket {
    /// MySQL error number
    pub code: u16,
    /// SQLSTATE, `HY000` when the server sent none
    pub sql_state: String,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ErrorPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.sql_state, self.message)
    }
}

impl From<ErrorPacket> for crate::Error {
    fn from(packet: ErrorPacket) -> Self {
        crate::Error::Server {
            code: packet.code,
            sql_state: packet.sql_state,
            message: packet.message,
        }
    }
}

/// EOF packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EofPacket {
    /// Warning count
    pub warnings: u16,
    /// Server status flags
    pub status: u16,
}

/// Column definition (Protocol::ColumnDefinition41)
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    /// Schema name
    pub schema: String,
    /// Virtual table name
    pub table: String,
    /// Virtual column name
    pub name: String,
    /// Column character set
    pub charset: u16,
    /// Maximum column length
    pub column_length: u32,
    /// Column type byte
    pub column_type: u8,
    /// Column flags
    pub flags: u16,
    /// Decimal digits
    pub decimals: u8,
}

/// Reply during the authentication phase
#[derive(Debug, Clone)]
pub enum AuthReply {
    /// Authenticated
    Ok(OkPacket),
    /// Rejected
    Err(ErrorPacket),
    /// Server asks to restart authentication with another plugin
    Switch {
        /// Plugin name
        plugin: String,
        /// New scramble
        data: Vec<u8>,
    },
    /// Plugin-specific continuation data
    MoreData(Vec<u8>),
}

/// First reply to a command
#[derive(Debug, Clone)]
pub enum CommandReply {
    /// Statement completed without a result set
    Ok(OkPacket),
    /// Statement failed
    Err(ErrorPacket),
    /// Result set with this many columns follows
    ResultSet {
        /// Column count
        column_count: u64,
    },
    /// Server requests a local file
    LocalInfile(String),
}

/// Packet inside a result set's row section
#[derive(Debug, Clone)]
pub enum RowPacket {
    /// Text row; `None` is SQL NULL
    Row(Vec<Option<Bytes>>),
    /// End of rows
    Eof(EofPacket),
    /// Error while producing rows
    Err(ErrorPacket),
}
