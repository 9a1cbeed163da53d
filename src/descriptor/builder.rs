//! Descriptor assembly from raw configuration

use crate::config::RawConfig;
use super::parse::split_descriptor;
use crate::connection::PROFILE_NAME;

/// Where an assembled descriptor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSource {
    /// Taken verbatim from the override variable
    Override,
    /// Composed from individual fields
    Composed,
}

/// First-pass descriptor, not yet parsed
///
/// Nothing about the contents is validated here; syntax errors surface when
/// the descriptor is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDescriptor {
    text: String,
    source: DescriptorSource,
}

impl AssembledDescriptor {
    /// Assemble from raw configuration
    ///
    /// A non-empty override wins. Otherwise the individual fields are
    /// composed with `charset=utf8mb4`, `parseTime=true` and `loc=Local`,
    /// plus `tls=tidb` when the TLS flag is set.
    pub fn assemble(raw: &RawConfig) -> Self {
        if let Some(dsn) = raw.dsn.as_deref().filter(|d| !d.is_empty()) {
            return Self {
                text: dsn.to_string(),
                source: DescriptorSource::Override,
            };
        }

        let mut text = format!(
            "{}:{}@tcp({}:{})/{}?charset=utf8mb4&parseTime=true&loc=Local",
            raw.user, raw.password, raw.host, raw.port, raw.database
        );
        if raw.tls_enabled {
            text.push_str("&tls=");
            text.push_str(PROFILE_NAME);
        }

        Self {
            text,
            source: DescriptorSource::Composed,
        }
    }

    /// Raw text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Origin of the text
    pub fn source(&self) -> DescriptorSource {
        self.source
    }

    /// Whether the query string contains `tls=<name>`
    pub fn requests_profile(&self, name: &str) -> bool {
        let Some((_, query)) = self.text.split_once('?') else {
            return false;
        };
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .any(|(key, value)| key == "tls" && value == name)
    }

    /// Host portion of a TCP address segment
    ///
    /// Segments are located the way the parser locates them, so a password
    /// containing `(` is never mistaken for the address. Returns `None` for
    /// Unix sockets and for text without an address segment.
    pub fn peer_host(&self) -> Option<String> {
        let parts = split_descriptor(&self.text).ok()?;
        if !parts.net.is_empty() && !parts.net.starts_with("tcp") {
            return None;
        }

        let addr = parts.addr?;
        let host = match addr.strip_prefix('[') {
            Some(rest) => rest.split(']').next()?,
            None => addr.split(':').next()?,
        };

        (!host.is_empty()).then(|| host.to_string())
    }
}

impl AsRef<str> for AssembledDescriptor {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
