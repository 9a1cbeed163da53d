//! Named trust profile registry
//!
//! Descriptors reference trust profiles by name (`tls=<name>`). The registry
//! owns those profiles; it is filled once during startup and shared read-only
//! afterwards.

use super::tls::TrustProfile;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Name the startup sequence registers its trust profile under.
pub const PROFILE_NAME: &str = "tidb";

/// `tls` parameter values with built-in meaning; never registrable.
///
/// Boolean spellings (`1`, `TRUE`, ...) are reserved as well.
pub const RESERVED_NAMES: [&str; 4] = ["true", "false", "skip-verify", "preferred"];

/// Proof that a profile was registered.
///
/// Only [`TlsRegistry::register`] can create one, so code that holds a
/// `RegisteredProfile` knows the name resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredProfile {
    name: String,
}

impl RegisteredProfile {
    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Mapping from profile name to trust profile
#[derive(Debug, Default)]
pub struct TlsRegistry {
    profiles: HashMap<String, Arc<TrustProfile>>,
}

impl TlsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile under `name`
    ///
    /// Fails with [`Error::Tls`] if the name is empty, reserved, or already
    /// registered. Profiles are never replaced.
    pub fn register(&mut self, name: &str, profile: TrustProfile) -> Result<RegisteredProfile> {
        if name.is_empty() {
            return Err(Error::Tls("profile name must not be empty".into()));
        }
        if crate::descriptor::is_reserved_tls_value(name) {
            return Err(Error::Tls(format!("profile name '{}' is reserved", name)));
        }
        if self.profiles.contains_key(name) {
            return Err(Error::Tls(format!(
                "profile '{}' is already registered",
                name
            )));
        }

        tracing::debug!(
            profile = name,
            min_version = %profile.min_version(),
            server_name = ?profile.server_name(),
            "registered trust profile"
        );
        self.profiles.insert(name.to_string(), Arc::new(profile));
        Ok(RegisteredProfile {
            name: name.to_string(),
        })
    }

    /// Look up a profile
    pub fn get(&self, name: &str) -> Option<Arc<TrustProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut v: Vec<String> = self.profiles.keys().cloned().collect();
        v.sort();
        v
    }

    /// Number of registered profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
