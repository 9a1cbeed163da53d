//! Password scrambles for the MySQL authentication plugins
//!
//! * `mysql_native_password`: `SHA1(pw) XOR SHA1(nonce || SHA1(SHA1(pw)))`
//! * `caching_sha2_password`: `SHA256(pw) XOR SHA256(SHA256(SHA256(pw)) || nonce)`
//! * `mysql_clear_password`: the password itself, NUL-terminated
//!
//! An empty password produces an empty scramble.

use crate::{Error, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Supported authentication plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    /// SHA-1 challenge/response
    NativePassword,
    /// SHA-256 challenge/response with a server-side cache
    CachingSha2Password,
    /// Password in the clear; only acceptable over TLS
    ClearPassword,
}

impl AuthPlugin {
    /// Plugin name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::NativePassword => "mysql_native_password",
            Self::CachingSha2Password => "caching_sha2_password",
            Self::ClearPassword => "mysql_clear_password",
        }
    }

    /// Look up a plugin by wire name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "mysql_native_password" => Ok(Self::NativePassword),
            "caching_sha2_password" => Ok(Self::CachingSha2Password),
            "mysql_clear_password" => Ok(Self::ClearPassword),
            other => Err(Error::Authentication(format!(
                "unsupported authentication plugin '{}'",
                other
            ))),
        }
    }

    /// Response to the server's nonce
    pub fn respond(&self, password: &str, nonce: &[u8]) -> Vec<u8> {
        match self {
            Self::NativePassword => scramble_native(password, nonce),
            Self::CachingSha2Password => scramble_sha256(password, nonce),
            Self::ClearPassword => clear_password(password),
        }
    }
}

impl std::fmt::Display for AuthPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `mysql_native_password` scramble
pub fn scramble_native(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);

    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(stage2);
    let mask = hasher.finalize();

    xor(&stage1, &mask)
}

/// `caching_sha2_password` scramble
pub fn scramble_sha256(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);

    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(nonce);
    let mask = hasher.finalize();

    xor(&stage1, &mask)
}

/// Cleartext password response (password followed by NUL)
pub fn clear_password(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() + 1);
    out.extend_from_slice(password.as_bytes());
    out.push(0);
    out
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}
