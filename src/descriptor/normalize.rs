//! Descriptor normalization

use super::parse::{params, Descriptor};
use crate::connection::{RegisteredProfile, TlsRegistry};
use crate::Result;

/// Canonical descriptor, guaranteed to carry `parseTime=true`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDescriptor {
    descriptor: Descriptor,
    canonical: String,
}

impl NormalizedDescriptor {
    /// Canonical text
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Structured fields
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Canonical text with the password masked
    pub fn redacted(&self) -> String {
        self.descriptor.redacted()
    }
}

impl AsRef<str> for NormalizedDescriptor {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

/// Parse, enforce required parameters, and re-serialize canonically
///
/// `parseTime` is forced to `true` whatever the input said. When `profile`
/// is given, `tls` is forced to its name, replacing any other value. Holding
/// a [`RegisteredProfile`] proves the name is already in `registry`, so the
/// forced parameter always resolves.
///
/// Normalizing a normalized descriptor returns byte-identical text.
pub fn normalize(
    input: impl AsRef<str>,
    registry: &TlsRegistry,
    profile: Option<&RegisteredProfile>,
) -> Result<NormalizedDescriptor> {
    let mut descriptor = Descriptor::parse(input.as_ref(), registry)?;

    descriptor.set_param(params::PARSE_TIME, "true");
    if let Some(profile) = profile {
        descriptor.set_param(params::TLS, profile.name());
    }

    let canonical = descriptor.format();
    Ok(NormalizedDescriptor {
        descriptor,
        canonical,
    })
}
