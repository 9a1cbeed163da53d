//! # tidb-bootstrap
//!
//! Connection bootstrapping for TiDB over the MySQL client protocol.
//!
//! At startup the crate:
//! - resolves connection settings from the environment
//! - assembles and normalizes a MySQL-driver style connection descriptor
//! - registers a named TLS trust profile when transport security is requested
//! - opens the connection and reconciles the schema of the known entities
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tidb_bootstrap::{bootstrap, migrate, RawConfig};
//!
//! #[tokio::main]
//! async fn main() -> tidb_bootstrap::Result<()> {
//!     let raw = RawConfig::from_env();
//!     let started = bootstrap(&raw, &migrate::entities()).await?;
//!
//!     let users = started.database.query("SELECT id, email FROM users").await?;
//!     println!("{} users", users.rows.len());
//!
//!     started.database.close().await
//! }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod migrate;
pub mod protocol;
pub mod startup;

pub use client::Database;
pub use config::RawConfig;
pub use descriptor::{normalize, AssembledDescriptor, Descriptor, NormalizedDescriptor};
pub use error::{Error, ErrorCategory, Result};
pub use startup::{bootstrap, resolve, Bootstrapped};
