//! Descriptor parsing and canonical formatting
//!
//! Grammar:
//! * `[user[:password]@][net[(addr)]]/dbname[?param1=value1&paramN=valueN]`
//!
//! Examples:
//! * `root:@tcp(127.0.0.1:4000)/test?charset=utf8mb4&parseTime=true`
//! * `app:secret@tcp([::1]:4000)/shop`
//! * `root@unix(/tmp/mysql.sock)/test`

use crate::connection::{
    Address, ConnectionConfig, Location, TlsMode, TlsRegistry, TrustProfile, RESERVED_NAMES,
};
use crate::protocol::constants::collations;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default MySQL protocol port, used when a TCP address has none
pub const DEFAULT_PORT: u16 = 3306;

const DEFAULT_UNIX_ADDR: &str = "/tmp/mysql.sock";

/// Parameters interpreted by the client rather than sent as system variables
pub mod params {
    /// Comma-separated list of character sets to try with `SET NAMES`
    pub const CHARSET: &str = "charset";
    /// Connection collation
    pub const COLLATION: &str = "collation";
    /// Decode DATE, DATETIME and TIMESTAMP columns as timestamps
    pub const PARSE_TIME: &str = "parseTime";
    /// Time zone for decoded timestamps: `Local`, `UTC`, or `±HH:MM`
    pub const LOC: &str = "loc";
    /// `true`, `false`, `preferred`, or a registered trust profile name
    pub const TLS: &str = "tls";
    /// Dial timeout
    pub const TIMEOUT: &str = "timeout";
    /// Permit sending cleartext passwords without TLS
    pub const ALLOW_CLEARTEXT_PASSWORDS: &str = "allowCleartextPasswords";

    /// All client-side parameters
    pub const DRIVER: [&str; 7] = [
        CHARSET,
        COLLATION,
        PARSE_TIME,
        LOC,
        TLS,
        TIMEOUT,
        ALLOW_CLEARTEXT_PASSWORDS,
    ];
}

/// Network type of the address segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// TCP over IPv4 or IPv6
    Tcp,
    /// TCP over IPv4 only
    Tcp4,
    /// TCP over IPv6 only
    Tcp6,
    /// Unix domain socket
    Unix,
}

impl Network {
    /// Whether this is one of the TCP variants
    pub fn is_tcp(&self) -> bool {
        !matches!(self, Self::Unix)
    }

    fn default_addr(&self) -> String {
        match self {
            Self::Unix => DEFAULT_UNIX_ADDR.to_string(),
            Self::Tcp6 => format!("[::1]:{}", DEFAULT_PORT),
            Self::Tcp | Self::Tcp4 => format!("127.0.0.1:{}", DEFAULT_PORT),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Tcp4 => write!(f, "tcp4"),
            Self::Tcp6 => write!(f, "tcp6"),
            Self::Unix => write!(f, "unix"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            "unix" => Ok(Self::Unix),
            _ => Err(Error::Config(format!(
                "unknown network '{}': expected tcp, tcp4, tcp6, or unix",
                s
            ))),
        }
    }
}

/// Interpreted value of the `tls` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsParam {
    /// Plaintext
    Disabled,
    /// TLS with system roots, verified against the dialed host
    SystemRoots,
    /// TLS with system roots when the server supports it
    Preferred,
    /// Named, registered trust profile
    Profile(String),
}

impl TlsParam {
    fn parse(value: &str, registry: &TlsRegistry) -> Result<Self> {
        if let Some(enabled) = parse_bool(value) {
            return Ok(if enabled { Self::SystemRoots } else { Self::Disabled });
        }
        match value {
            "preferred" => Ok(Self::Preferred),
            "skip-verify" => Err(Error::Config(
                "tls=skip-verify is not supported; register a trust profile with the server's CA instead"
                    .into(),
            )),
            name if registry.contains(name) => Ok(Self::Profile(name.to_string())),
            name => Err(Error::Config(format!(
                "TLS profile '{}' is not registered",
                name
            ))),
        }
    }

    fn from_validated(value: &str) -> Self {
        match parse_bool(value) {
            Some(true) => Self::SystemRoots,
            Some(false) => Self::Disabled,
            None if value == "preferred" => Self::Preferred,
            None => Self::Profile(value.to_string()),
        }
    }
}

/// Parsed connection descriptor
///
/// Parameters are kept in a sorted map, so formatting is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Username
    pub user: String,
    /// Password
    pub password: String,
    /// Network type
    pub net: Network,
    /// `host:port` for TCP, socket path for Unix
    pub addr: String,
    /// Database name
    pub database: String,
    params: BTreeMap<String, String>,
}

impl Descriptor {
    /// Parse a descriptor.
    ///
    /// The registry is consulted for `tls=<name>`: a descriptor naming a
    /// profile that has not been registered does not parse.
    pub fn parse(dsn: &str, registry: &TlsRegistry) -> Result<Self> {
        let parts = split_descriptor(dsn)?;

        let (user, password) = match parts.userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (user.to_string(), pass.to_string()),
                None => (info.to_string(), String::new()),
            },
            None => (String::new(), String::new()),
        };

        let net: Network = parts.net.parse()?;
        let addr = match parts.addr {
            Some(addr) if !addr.is_empty() => {
                if net.is_tcp() {
                    ensure_port(addr)?
                } else {
                    addr.to_string()
                }
            }
            _ => net.default_addr(),
        };

        let (database, query) = match parts.tail.split_once('?') {
            Some((db, q)) => (db.to_string(), q),
            None => (parts.tail.to_string(), ""),
        };

        let mut params = BTreeMap::new();
        for pair in query.split('&') {
            // Pairs without '=' carry nothing
            if let Some((key, value)) = pair.split_once('=') {
                if !key.is_empty() {
                    params.insert(key.to_string(), value.to_string());
                }
            }
        }
        validate_params(&params, registry)?;

        Ok(Self {
            user,
            password,
            net,
            addr,
            database,
            params,
        })
    }

    /// Look up a parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Iterate parameters in canonical order
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn set_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    /// Interpreted `tls` parameter
    pub fn tls(&self) -> TlsParam {
        self.param(params::TLS)
            .map(TlsParam::from_validated)
            .unwrap_or(TlsParam::Disabled)
    }

    /// Host and port of a TCP address
    pub fn host_port(&self) -> Option<(&str, u16)> {
        if !self.net.is_tcp() {
            return None;
        }
        let (host, port) = split_host_port(&self.addr)?;
        Some((host, port.parse().ok()?))
    }

    /// Canonical string form
    pub fn format(&self) -> String {
        self.format_with_password(&self.password)
    }

    /// Canonical form with the password masked, for logs
    pub fn redacted(&self) -> String {
        if self.password.is_empty() {
            self.format()
        } else {
            self.format_with_password("***")
        }
    }

    fn format_with_password(&self, password: &str) -> String {
        let mut out = String::with_capacity(64);
        if !self.user.is_empty() || !password.is_empty() {
            out.push_str(&self.user);
            out.push(':');
            out.push_str(password);
            out.push('@');
        }
        out.push_str(&format!("{}({})/{}", self.net, self.addr, self.database));

        let mut sep = '?';
        for (key, value) in &self.params {
            out.push(sep);
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            sep = '&';
        }
        out
    }

    /// Build a connection configuration, resolving `tls` against the registry
    pub fn to_config(&self, registry: &TlsRegistry) -> Result<ConnectionConfig> {
        let address = match self.net {
            Network::Unix => Address::Unix(PathBuf::from(&self.addr)),
            _ => {
                let (host, port) = self.host_port().ok_or_else(|| {
                    Error::Config(format!("invalid TCP address '{}'", self.addr))
                })?;
                Address::Tcp {
                    host: host.to_string(),
                    port,
                }
            }
        };

        let tls = match self.tls() {
            TlsParam::Disabled => TlsMode::Disabled,
            TlsParam::SystemRoots => TlsMode::Required(TrustProfile::builder().build()?.into()),
            TlsParam::Preferred => TlsMode::Preferred(TrustProfile::builder().build()?.into()),
            TlsParam::Profile(name) => TlsMode::Required(registry.get(&name).ok_or_else(|| {
                Error::Config(format!("TLS profile '{}' is not registered", name))
            })?),
        };

        let mut config = ConnectionConfig::new(address, &self.user, &self.database)
            .password(&self.password)
            .tls(tls);

        if let Some(charset) = self.param(params::CHARSET) {
            config = config.charsets(charset.split(',').map(str::trim));
        }
        if let Some(name) = self.param(params::COLLATION) {
            config = config.collation(name)?;
        }
        if let Some(timeout) = self.param(params::TIMEOUT) {
            config = config.connect_timeout(parse_duration(timeout)?);
        }
        if let Some(allow) = self.param(params::ALLOW_CLEARTEXT_PASSWORDS) {
            config.allow_cleartext_passwords = parse_bool(allow).unwrap_or(false);
        }
        config.parse_time = self
            .param(params::PARSE_TIME)
            .and_then(parse_bool)
            .unwrap_or(false);
        config.loc = self
            .param(params::LOC)
            .and_then(Location::parse)
            .unwrap_or_default();

        for (key, value) in self.params() {
            if !params::DRIVER.contains(&key) {
                config = config.system_variable(key, value);
            }
        }

        Ok(config)
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

pub(crate) struct Parts<'a> {
    pub(crate) userinfo: Option<&'a str>,
    pub(crate) net: &'a str,
    pub(crate) addr: Option<&'a str>,
    /// Everything after the database slash
    pub(crate) tail: &'a str,
}

/// Split a descriptor into its segments
///
/// The database slash is the last `/`, the userinfo ends at the last `@`
/// before it, and the address opens at the first `(` after that. A password
/// may therefore contain any of `@`, `/`, `(` and `)`.
pub(crate) fn split_descriptor(dsn: &str) -> Result<Parts<'_>> {
    if dsn.is_empty() {
        return Ok(Parts {
            userinfo: None,
            net: "",
            addr: None,
            tail: "",
        });
    }

    let slash = dsn
        .rfind('/')
        .ok_or_else(|| Error::Config("missing the slash separating the database name".into()))?;
    let (head, tail) = (&dsn[..slash], &dsn[slash + 1..]);

    let (userinfo, location) = match head.rfind('@') {
        Some(at) => (Some(&head[..at]), &head[at + 1..]),
        None => (None, head),
    };

    let unbalanced = || Error::Config("unbalanced parentheses in network address".into());
    let (net, addr) = match location.find('(') {
        Some(open) => {
            let inner = &location[open + 1..];
            let addr = match inner.strip_suffix(')') {
                Some(addr) => addr,
                None if inner.contains(')') => return Err(unbalanced()),
                None => {
                    return Err(Error::Config(
                        "network address not terminated (missing closing parenthesis)".into(),
                    ))
                }
            };
            if addr.contains(['(', ')']) {
                return Err(unbalanced());
            }
            (&location[..open], Some(addr))
        }
        None if location.contains(')') => return Err(unbalanced()),
        None => (location, None),
    };

    Ok(Parts {
        userinfo,
        net,
        addr,
        tail,
    })
}

/// Split `host:port`, honoring bracketed IPv6 literals
pub(crate) fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let end = rest.find(']')?;
        let port = rest[end + 1..].strip_prefix(':')?;
        return Some((&rest[..end], port));
    }
    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') {
        // Bare IPv6 literal
        return None;
    }
    Some((host, port))
}

fn ensure_port(addr: &str) -> Result<String> {
    match split_host_port(addr) {
        Some((_, port)) => {
            port.parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port in address '{}'", addr)))?;
            Ok(addr.to_string())
        }
        None if addr.contains(':') && !addr.starts_with('[') => {
            Ok(format!("[{}]:{}", addr, DEFAULT_PORT))
        }
        None if addr.starts_with('[') => {
            if addr.ends_with(']') {
                Ok(format!("{}:{}", addr, DEFAULT_PORT))
            } else {
                Err(Error::Config(format!("invalid address '{}'", addr)))
            }
        }
        None => Ok(format!("{}:{}", addr, DEFAULT_PORT)),
    }
}

fn validate_params(params: &BTreeMap<String, String>, registry: &TlsRegistry) -> Result<()> {
    for (key, value) in params {
        match key.as_str() {
            params::PARSE_TIME | params::ALLOW_CLEARTEXT_PASSWORDS => {
                parse_bool(value).ok_or_else(|| {
                    Error::Config(format!("invalid bool value for {}: '{}'", key, value))
                })?;
            }
            params::TLS => {
                TlsParam::parse(value, registry)?;
            }
            params::TIMEOUT => {
                parse_duration(value)?;
            }
            params::COLLATION => {
                collations::id(value)
                    .ok_or_else(|| Error::Config(format!("unknown collation '{}'", value)))?;
            }
            params::LOC => {
                Location::parse(value).ok_or_else(|| {
                    Error::Config(format!(
                        "unknown loc '{}': expected Local, UTC, or an offset such as +08:00",
                        value
                    ))
                })?;
            }
            params::CHARSET if value.is_empty() => {
                return Err(Error::Config(format!("{} must not be empty", key)));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Parse a boolean parameter value
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "True" => Some(true),
        "0" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Parse a duration such as `500ms`, `10s`, `1m30s`, or `2h`
pub fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = || Error::Config(format!("invalid duration '{}'", value));

    if value == "0" {
        return Ok(Duration::ZERO);
    }
    if value.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "h" => amount.checked_mul(3600).map(Duration::from_secs),
            _ => return Err(invalid()),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// Whether `name` has built-in meaning as a `tls` value
pub fn is_reserved_tls_value(name: &str) -> bool {
    RESERVED_NAMES.contains(&name) || parse_bool(name).is_some()
}
