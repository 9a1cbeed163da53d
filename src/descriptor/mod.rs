//! Connection descriptors
//!
//! This module handles:
//! * Assembling a descriptor from raw configuration
//! * Parsing the `user:password@net(addr)/db?params` grammar
//! * Normalizing to a canonical, deterministic form

mod builder;
mod normalize;
mod parse;

pub use builder::{AssembledDescriptor, DescriptorSource};
pub use normalize::{normalize, NormalizedDescriptor};
pub use parse::{
    is_reserved_tls_value, params, parse_bool, parse_duration, Descriptor, Network, TlsParam,
    DEFAULT_PORT,
};
