//! Startup sequence
//!
//! Resolves configuration into a normalized descriptor, registering the TLS
//! trust profile first when one is needed, then connects and reconciles the
//! schema. Every failure is returned to the caller; nothing here exits the
//! process.

use crate::client::Database;
use crate::config::RawConfig;
use crate::connection::{TlsRegistry, TrustProfile, PROFILE_NAME};
use crate::descriptor::{normalize, AssembledDescriptor, NormalizedDescriptor};
use crate::migrate::EntityShape;
use crate::Result;
use std::sync::Arc;
use tracing::Instrument;

/// Outcome of a successful startup
#[derive(Debug, Clone)]
pub struct Bootstrapped {
    /// Connected, reconciled database handle
    pub database: Database,
    /// Trust profiles registered during startup, read-only from here on
    pub registry: Arc<TlsRegistry>,
    /// Descriptor the connection was opened with
    pub descriptor: NormalizedDescriptor,
}

/// Whether the TLS trust profile must be registered
pub fn tls_required(raw: &RawConfig, assembled: &AssembledDescriptor) -> bool {
    raw.tls_enabled || assembled.requests_profile(PROFILE_NAME)
}

/// Build the trust profile for `assembled`
///
/// The peer name comes from the explicit override, otherwise from the host
/// in the descriptor's address segment. Without either, verification falls
/// back to whatever host is dialed.
pub fn trust_profile(raw: &RawConfig, assembled: &AssembledDescriptor) -> Result<TrustProfile> {
    let mut builder = TrustProfile::builder();

    match raw.tls_server_name.clone().or_else(|| assembled.peer_host()) {
        Some(name) => builder = builder.server_name(name),
        None => tracing::warn!(
            "no TLS server name configured or inferable; verifying against the dialed host"
        ),
    }
    if let Some(ref ca) = raw.tls_ca_path {
        builder = builder.ca_cert_path(ca.as_str());
    }

    builder.build()
}

/// Resolve `raw` into a normalized descriptor
///
/// Registers the `tidb` trust profile in `registry` when TLS is requested,
/// strictly before the descriptor is parsed. No connection is attempted, so
/// CA and descriptor errors surface here without touching the network.
pub fn resolve(raw: &RawConfig, registry: &mut TlsRegistry) -> Result<NormalizedDescriptor> {
    let assembled = AssembledDescriptor::assemble(raw);
    tracing::debug!(source = ?assembled.source(), "assembled descriptor");

    if tls_required(raw, &assembled) {
        let profile = trust_profile(raw, &assembled)?;
        tracing::info!(
            profile = PROFILE_NAME,
            server_name = ?profile.server_name(),
            roots = ?profile.roots(),
            "TLS enabled"
        );
        let handle = registry.register(PROFILE_NAME, profile)?;
        normalize(&assembled, registry, Some(&handle))
    } else {
        normalize(&assembled, registry, None)
    }
}

/// Run the full startup sequence
///
/// Configuration, TLS registration and normalization, then connect and
/// reconcile `entities`.
pub async fn bootstrap(raw: &RawConfig, entities: &[EntityShape]) -> Result<Bootstrapped> {
    async {
        let mut registry = TlsRegistry::new();
        let descriptor = resolve(raw, &mut registry)?;
        tracing::info!(descriptor = %descriptor.redacted(), "connecting");

        let database = Database::open(&descriptor, &registry).await?;
        let server_version = database.server_version().await;
        let tls = database.is_tls().await;
        tracing::info!(server_version = %server_version, tls, "connected");

        let report = database.reconcile(entities).await?;
        tracing::info!(changes = report.statements.len(), "schema reconciled");

        Ok(Bootstrapped {
            database,
            registry: Arc::new(registry),
            descriptor,
        })
    }
    .instrument(tracing::info_span!("bootstrap"))
    .await
}
