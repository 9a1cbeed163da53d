//! Environment resolution

/// Database user
pub const DB_USER: &str = "DB_USER";
/// Database password
pub const DB_PASS: &str = "DB_PASS";
/// Database host
pub const DB_HOST: &str = "DB_HOST";
/// Database port
pub const DB_PORT: &str = "DB_PORT";
/// Database name
pub const DB_NAME: &str = "DB_NAME";
/// Full descriptor override
pub const DB_DSN: &str = "DB_DSN";
/// Enables TLS when exactly `true`
pub const TIDB_TLS: &str = "TIDB_TLS";
/// Peer name used for certificate verification
pub const TIDB_TLS_SERVERNAME: &str = "TIDB_TLS_SERVERNAME";
/// PEM bundle of trusted roots
pub const TIDB_TLS_CA: &str = "TIDB_TLS_CA";

const DEFAULT_USER: &str = "root";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "4000";
const DEFAULT_DATABASE: &str = "test";

/// Raw configuration as read from the environment
///
/// Values are not validated. Malformed hosts or ports only surface later,
/// when the assembled descriptor is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfig {
    /// Username (default `root`)
    pub user: String,
    /// Password (default empty)
    pub password: String,
    /// Host (default `127.0.0.1`)
    pub host: String,
    /// Port (default `4000`)
    pub port: String,
    /// Database name (default `test`)
    pub database: String,
    /// Full descriptor override; short-circuits field composition
    pub dsn: Option<String>,
    /// TLS requested through the flag
    pub tls_enabled: bool,
    /// Explicit peer name for certificate verification
    pub tls_server_name: Option<String>,
    /// CA bundle path; `None` means system roots
    pub tls_ca_path: Option<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl RawConfig {
    /// Resolve from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary lookup function
    ///
    /// Empty values are treated the same as absent ones, except for the
    /// password, which is taken as-is.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let or_default =
            |key: &str, default: &str| non_empty(key).unwrap_or_else(|| default.to_string());

        Self {
            user: or_default(DB_USER, DEFAULT_USER),
            password: lookup(DB_PASS).unwrap_or_default(),
            host: or_default(DB_HOST, DEFAULT_HOST),
            port: or_default(DB_PORT, DEFAULT_PORT),
            database: or_default(DB_NAME, DEFAULT_DATABASE),
            dsn: non_empty(DB_DSN),
            tls_enabled: lookup(TIDB_TLS).as_deref() == Some("true"),
            tls_server_name: non_empty(TIDB_TLS_SERVERNAME),
            tls_ca_path: non_empty(TIDB_TLS_CA),
        }
    }
}
