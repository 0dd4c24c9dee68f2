//! Content fingerprints for failures.
//!
//! A fingerprint is the deduplication key for archived stack traces: identical
//! failures (same kind, message, frames and causes) always map to the same
//! value, across runs and processes. The canonical byte encoding is
//! length-prefixed so that no two distinct failures share an encoding.

use serde::{Deserialize, Serialize};

use crate::failure::Failure;

/// Domain separation tag mixed into every fingerprint.
const FINGERPRINT_DOMAIN: &[u8] = b"opslog-stacktrace-v1";

/// Filename-safe content hash of a failure (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint from raw digest bytes.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Hex string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives a fingerprint from a failure's content.
///
/// Implementations must be pure: the same content yields the same fingerprint
/// in every process, and no well-formed failure may cause a panic.
pub trait FingerprintCalculator: Send + Sync {
    fn fingerprint(&self, failure: &Failure) -> Fingerprint;
}

/// BLAKE3 over the canonical encoding (256 bits). The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Fingerprint;

impl FingerprintCalculator for Blake3Fingerprint {
    fn fingerprint(&self, failure: &Failure) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&canonical_bytes(failure));
        Fingerprint::from_digest(hasher.finalize().as_bytes())
    }
}

/// SHA-256 over the canonical encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprint;

impl FingerprintCalculator for Sha256Fingerprint {
    fn fingerprint(&self, failure: &Failure) -> Fingerprint {
        use sha2::{Digest, Sha256};

        let digest = Sha256::digest(canonical_bytes(failure));
        Fingerprint::from_digest(&digest)
    }
}

/// Selectable fingerprint algorithm (configuration surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl FingerprintAlgorithm {
    /// Calculator implementing this algorithm.
    pub fn calculator(self) -> Box<dyn FingerprintCalculator> {
        match self {
            FingerprintAlgorithm::Blake3 => Box::new(Blake3Fingerprint),
            FingerprintAlgorithm::Sha256 => Box::new(Sha256Fingerprint),
        }
    }
}

impl std::str::FromStr for FingerprintAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blake3" => Ok(FingerprintAlgorithm::Blake3),
            "sha256" | "sha-256" => Ok(FingerprintAlgorithm::Sha256),
            other => Err(format!(
                "unknown fingerprint algorithm '{}' (expected blake3 or sha256)",
                other
            )),
        }
    }
}

/// Canonical encoding of a failure and its cause chain.
///
/// Layout per failure, outermost first:
/// `len(kind) kind | 0 or 1 len(message) message | frame count | (len(symbol) symbol 0|1 len(location) location)*`,
/// terminated by the number of causes dropped by the depth bound.
pub fn canonical_bytes(failure: &Failure) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(FINGERPRINT_DOMAIN);

    for link in failure.chain() {
        put_str(&mut out, &link.kind);
        put_opt_str(&mut out, link.message.as_deref());
        put_len(&mut out, link.frames.len());
        for frame in &link.frames {
            put_str(&mut out, &frame.symbol);
            put_opt_str(&mut out, frame.location.as_deref());
        }
    }

    put_len(&mut out, failure.truncated_causes());
    out
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_len(out, s.len());
    out.extend_from_slice(s.as_bytes());
}

fn put_opt_str(out: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            out.push(1);
            put_str(out, s);
        }
        None => out.push(0),
    }
}
