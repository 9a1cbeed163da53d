//! TLS trust profiles for secure connections to TiDB.
//!
//! A [`TrustProfile`] bundles the minimum protocol version, the peer name used
//! for certificate verification, and the trusted roots, compiled into a rustls
//! `ClientConfig`. Profiles are registered by name in a
//! [`TlsRegistry`](super::TlsRegistry) and looked up when a descriptor
//! references them through its `tls` parameter.

use crate::{Error, Result};
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use rustls_pemfile::Item;
use rustls_pki_types::ServerName;
use std::fs;
use std::sync::Arc;

static TLS12_AND_UP: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Lowest TLS protocol version a profile will negotiate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.2 (1.3 is still preferred when the server offers it)
    #[default]
    Tls12,
    /// TLS 1.3 only
    Tls13,
}

impl TlsVersion {
    fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            Self::Tls12 => TLS12_AND_UP,
            Self::Tls13 => TLS13_ONLY,
        }
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tls12 => write!(f, "TLSv1.2"),
            Self::Tls13 => write!(f, "TLSv1.3"),
        }
    }
}

/// Where a profile's trusted roots came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSource {
    /// Platform certificate store
    System,
    /// Bundled Mozilla roots (platform store was empty)
    Bundled,
    /// PEM bundle on disk
    CaFile(String),
}

/// Compiled TLS trust profile.
///
/// # Examples
///
/// ```ignore
/// use tidb_bootstrap::connection::TrustProfile;
///
/// // System roots, verify against the dialed host
/// let profile = TrustProfile::builder().build()?;
///
/// // Custom CA and an explicit peer name
/// let profile = TrustProfile::builder()
///     .ca_cert_path("/etc/tidb/ca.pem")
///     .server_name("gateway01.us-east-1.prod.aws.tidbcloud.com")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TrustProfile {
    min_version: TlsVersion,
    server_name: Option<ServerName<'static>>,
    roots: RootSource,
    root_count: usize,
    client_config: Arc<ClientConfig>,
}

impl TrustProfile {
    /// Create a new trust profile builder.
    pub fn builder() -> TrustProfileBuilder {
        TrustProfileBuilder::default()
    }

    /// Get the rustls ClientConfig for this profile.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Minimum negotiated protocol version.
    pub fn min_version(&self) -> TlsVersion {
        self.min_version
    }

    /// Explicit peer name, if one was configured or inferred.
    pub fn server_name(&self) -> Option<&ServerName<'static>> {
        self.server_name.as_ref()
    }

    /// Origin of the trusted roots.
    pub fn roots(&self) -> &RootSource {
        &self.roots
    }

    /// Number of trust anchors in the root store.
    pub fn root_count(&self) -> usize {
        self.root_count
    }

    /// Name to present for SNI and certificate verification.
    ///
    /// Uses the profile's peer name when set, otherwise the host that was
    /// actually dialed.
    pub fn server_name_for(&self, dialed_host: &str) -> Result<ServerName<'static>> {
        match &self.server_name {
            Some(name) => Ok(name.clone()),
            None => parse_server_name(dialed_host),
        }
    }
}

impl std::fmt::Debug for TrustProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustProfile")
            .field("min_version", &self.min_version)
            .field("server_name", &self.server_name)
            .field("roots", &self.roots)
            .field("root_count", &self.root_count)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for [`TrustProfile`].
#[derive(Debug, Default)]
pub struct TrustProfileBuilder {
    min_version: TlsVersion,
    server_name: Option<String>,
    ca_cert_path: Option<String>,
}

impl TrustProfileBuilder {
    /// Set the minimum protocol version (default: TLS 1.2).
    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self
    }

    /// Set the peer name used for certificate verification.
    ///
    /// When unset, the certificate is verified against the dialed host.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Set the path to a PEM bundle of trusted roots.
    ///
    /// If not set, system root certificates are used.
    pub fn ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Build the trust profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if:
    /// - the CA file cannot be read
    /// - the CA file is not valid PEM or holds no usable certificate
    /// - the peer name is not a valid DNS name or IP address
    pub fn build(self) -> Result<TrustProfile> {
        let server_name = self
            .server_name
            .as_deref()
            .map(parse_server_name)
            .transpose()?;

        let (root_store, roots) = match &self.ca_cert_path {
            Some(ca_path) => (load_custom_ca(ca_path)?, RootSource::CaFile(ca_path.clone())),
            None => load_system_roots(),
        };
        let root_count = root_store.len();

        let client_config = Arc::new(
            ClientConfig::builder_with_protocol_versions(self.min_version.protocol_versions())
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );

        Ok(TrustProfile {
            min_version: self.min_version,
            server_name,
            roots,
            root_count,
            client_config,
        })
    }
}

/// Load the platform roots, falling back to the bundled Mozilla set.
fn load_system_roots() -> (RootCertStore, RootSource) {
    let result = rustls_native_certs::load_native_certs();

    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(result.certs);
    if ignored > 0 || !result.errors.is_empty() {
        tracing::debug!(
            added,
            ignored,
            errors = result.errors.len(),
            "some system root certificates could not be loaded"
        );
    }

    if store.is_empty() {
        tracing::warn!("no system root certificates found, using bundled roots");
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        return (store, RootSource::Bundled);
    }

    (store, RootSource::System)
}

/// Load a custom CA bundle from a PEM file.
fn load_custom_ca(ca_path: &str) -> Result<RootCertStore> {
    let ca_cert_data = fs::read(ca_path).map_err(|e| {
        Error::Tls(format!(
            "failed to read CA certificate file '{}': {}",
            ca_path, e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut root_store = RootCertStore::empty();

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                root_store.add(cert).map_err(|e| {
                    Error::Tls(format!("invalid CA certificate in '{}': {}", ca_path, e))
                })?;
            }
            // Keys and CRLs may share the bundle
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Tls(format!(
                    "failed to parse CA certificate from '{}'",
                    ca_path
                )));
            }
        }
    }

    if root_store.is_empty() {
        return Err(Error::Tls(format!(
            "no valid certificates found in '{}'",
            ca_path
        )));
    }

    Ok(root_store)
}

/// Parse a host into a TLS server name (SNI).
///
/// Accepts DNS names and IP literals; brackets around IPv6 literals and a
/// trailing dot are stripped.
pub fn parse_server_name(hostname: &str) -> Result<ServerName<'static>> {
    let trimmed = hostname
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.');

    if trimmed.is_empty() || trimmed.len() > 253 {
        return Err(Error::Tls(format!(
            "invalid server name for TLS: '{}'",
            hostname
        )));
    }

    ServerName::try_from(trimmed.to_string())
        .map_err(|_| Error::Tls(format!("invalid server name for TLS: '{}'", hostname)))
}
