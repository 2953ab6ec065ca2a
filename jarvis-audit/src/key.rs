//! HMAC key sourcing.
//!
//! Primary: `JARVIS_AUDIT_KEY` environment variable. Fallback: a key
//! derived from machine-identifying data, so repeated runs on the same
//! host chain consistently without persisting a key to disk. This
//! fallback is NOT cryptographically strong — it exists for local
//! development, not as a substitute for setting the environment
//! variable in any deployment that matters.

use sha2::{Digest, Sha256};

const ENV_KEY: &str = "JARVIS_AUDIT_KEY";

/// Resolve the HMAC key: the environment variable if set, otherwise a
/// SHA-256 digest of machine-identifying data.
pub fn load_key() -> Vec<u8> {
    if let Ok(key) = std::env::var(ENV_KEY) {
        if !key.is_empty() {
            return key.into_bytes();
        }
    }

    let hostname = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string());
    let machine_id = format!("{hostname}-{}-jarvis-audit", std::env::consts::ARCH);

    let mut hasher = Sha256::new();
    hasher.update(machine_id.as_bytes());
    hasher.finalize().to_vec()
}

/// A stable, non-secret fingerprint for `key` — the first 16 hex
/// characters of its SHA-256 digest. Lets an exported audit bundle name
/// which key it was signed with without revealing the key itself.
pub fn fingerprint(key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hex::encode(hasher.finalize())[..16].to_string()
}
