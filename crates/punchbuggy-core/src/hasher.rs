use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest algorithm used to detect unchanged backups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    /// 32-bit rolling checksum, for hosts without a cryptographic digest.
    Fallback,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Fallback => "fallback",
        }
    }
}

/// Fingerprints serialized snapshot text. Digests are compared for equality
/// only and carry no security weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn hash(&self, text: &str) -> String {
        match self.algorithm {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(text.as_bytes())),
            HashAlgorithm::Fallback => fallback_checksum(text),
        }
    }
}

/// `hash = hash * 31 + unit` over UTF-16 code units, wrapped to 32 bits.
/// The `fallback-` prefix keeps these apart from hex digests. Only the
/// magnitude is rendered, so `h` and `-h` share a digest and no digest
/// carries a `-` after the prefix.
pub fn fallback_checksum(text: &str) -> String {
    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    format!("fallback-{}", hash.unsigned_abs())
}
