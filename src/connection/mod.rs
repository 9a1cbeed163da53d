//! Connection management
//!
//! This module handles:
//! * Transport abstraction (TCP vs Unix socket)
//! * Connection lifecycle (handshake, TLS upgrade, auth, commands)
//! * State machine enforcement
//! * Named TLS trust profiles
//! * Text value decoding

mod conn;
mod registry;
mod state;
mod tls;
mod transport;
mod value;

pub use conn::{Address, Connection, ConnectionConfig, QueryResult, TlsMode};
pub use registry::{RegisteredProfile, TlsRegistry, PROFILE_NAME, RESERVED_NAMES};
pub use state::ConnectionState;
pub use tls::{parse_server_name, RootSource, TlsVersion, TrustProfile, TrustProfileBuilder};
pub use transport::Transport;
pub use value::{Location, Value};
