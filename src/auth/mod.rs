//! Authentication plugins

pub mod scramble;

pub use scramble::{clear_password, scramble_native, scramble_sha256, AuthPlugin};
