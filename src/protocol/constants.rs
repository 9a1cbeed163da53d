//! MySQL client/server protocol constants

/// Handshake protocol version 10
pub const PROTOCOL_VERSION: u8 = 10;

/// Largest payload carried by a single packet; longer payloads are split
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

/// `max_packet_size` advertised in the handshake response (16 MiB)
pub const MAX_PACKET_SIZE: u32 = 1 << 24;

/// Capability flags
pub mod capabilities {
    /// New, more secure passwords
    pub const LONG_PASSWORD: u32 = 0x0000_0001;
    /// Longer column flags
    pub const LONG_FLAG: u32 = 0x0000_0004;
    /// Database name in the handshake response
    pub const CONNECT_WITH_DB: u32 = 0x0000_0008;
    /// 4.1 protocol
    pub const PROTOCOL_41: u32 = 0x0000_0200;
    /// Switch to TLS after the SSL request
    pub const SSL: u32 = 0x0000_0800;
    /// Transaction status in OK packets
    pub const TRANSACTIONS: u32 = 0x0000_2000;
    /// 4.1 authentication
    pub const SECURE_CONNECTION: u32 = 0x0000_8000;
    /// Multiple result sets
    pub const MULTI_RESULTS: u32 = 0x0002_0000;
    /// Pluggable authentication
    pub const PLUGIN_AUTH: u32 = 0x0008_0000;
}

/// Command bytes
pub mod commands {
    /// Close the connection
    pub const QUIT: u8 = 0x01;
    /// Text protocol query
    pub const QUERY: u8 = 0x03;
    /// Liveness check
    pub const PING: u8 = 0x0E;
}

/// First payload byte of generic response packets
pub mod headers {
    /// OK packet
    pub const OK: u8 = 0x00;
    /// Authentication needs more data (caching_sha2_password)
    pub const AUTH_MORE_DATA: u8 = 0x01;
    /// LOCAL INFILE request, or NULL column value in a text row
    pub const LOCAL_INFILE: u8 = 0xFB;
    /// EOF packet, or auth switch request during authentication
    pub const EOF: u8 = 0xFE;
    /// ERR packet
    pub const ERR: u8 = 0xFF;
}

/// Server status flags
pub mod status {
    /// Another result set follows
    pub const MORE_RESULTS_EXISTS: u16 = 0x0008;
}

/// Column type bytes that matter to text decoding
pub mod column_types {
    /// TIMESTAMP
    pub const TIMESTAMP: u8 = 0x07;
    /// DATE
    pub const DATE: u8 = 0x0A;
    /// DATETIME
    pub const DATETIME: u8 = 0x0C;
    /// NEWDATE (internal, but seen on some servers)
    pub const NEWDATE: u8 = 0x0E;

    /// Whether values of this type carry a date
    pub fn is_temporal(column_type: u8) -> bool {
        matches!(column_type, TIMESTAMP | DATE | DATETIME | NEWDATE)
    }
}

/// caching_sha2_password "more data" status bytes
pub mod caching_sha2 {
    /// Fast authentication succeeded; an OK packet follows
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;
    /// Server wants the full password
    pub const PERFORM_FULL_AUTH: u8 = 0x04;
}

/// Collation ids sent in the handshake
pub mod collations {
    /// utf8mb4_general_ci
    pub const DEFAULT: u8 = 45;

    const KNOWN: &[(&str, u8)] = &[
        ("latin1_swedish_ci", 8),
        ("ascii_general_ci", 11),
        ("utf8_general_ci", 33),
        ("utf8mb4_general_ci", 45),
        ("utf8mb4_bin", 46),
        ("binary", 63),
        ("utf8_bin", 83),
        ("utf8mb4_unicode_ci", 224),
        ("utf8mb4_0900_ai_ci", 255),
    ];

    /// Look up a collation id by name
    pub fn id(name: &str) -> Option<u8> {
        KNOWN
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
    }

}
