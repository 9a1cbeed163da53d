//! Process configuration
//!
//! Configuration is read once at startup from environment variables and is
//! immutable afterwards.

mod env;

pub use env::{
    RawConfig, DB_DSN, DB_HOST, DB_NAME, DB_PASS, DB_PORT, DB_USER, TIDB_TLS, TIDB_TLS_CA,
    TIDB_TLS_SERVERNAME,
};
