//! Stable per-process device identifier
//!
//! The storefront requires the same device identifier on every call of
//! a session. Deriving it from host network hardware does not survive
//! ephemeral or virtualized deployments, so the identifier is derived
//! from a configured seed instead, with the hostname as fallback.

use sha2::{Digest, Sha256};

/// Derive the device identifier from a seed.
///
/// Normalized to uppercase hex with no separators, 12 characters.
/// The same seed always yields the same identifier; nothing about it
/// is secret.
#[must_use]
pub fn device_guid(seed: Option<&str>) -> String {
    let seed = match seed {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => std::env::var("HOSTNAME").unwrap_or_else(|_| "ipaforge".to_string()),
    };

    let digest = Sha256::digest(seed.as_bytes());
    hex::encode_upper(&digest[..6])
}
