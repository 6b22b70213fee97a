//! Hash sources for allowing specific inline scripts and styles.

use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Digest algorithms CSP accepts in hash sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn prefix(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Parses `sha256` / `sha384` / `sha512`, ignoring ASCII case.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Raw digest size in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    fn digest(&self, content: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(content).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(content).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(content).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Builds the quoted hash source (`'sha256-…'`) for an inline block.
///
/// `content` must be the exact text between the opening and closing tags,
/// whitespace included, or browsers will compute a different digest.
pub fn hash_source(algorithm: HashAlgorithm, content: &[u8]) -> String {
    let encoded = general_purpose::STANDARD.encode(algorithm.digest(content));
    format!("'{}-{}'", algorithm.prefix(), encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest_of_empty_input() {
        assert_eq!(
            hash_source(HashAlgorithm::Sha256, b""),
            "'sha256-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU='"
        );
    }

    #[test]
    fn test_encoded_digest_lengths() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512] {
            let source = hash_source(algorithm, b"console.log('hi')");
            let encoded = source
                .trim_matches('\'')
                .strip_prefix(&format!("{}-", algorithm.prefix()))
                .unwrap();
            let decoded = general_purpose::STANDARD.decode(encoded).unwrap();
            assert_eq!(decoded.len(), algorithm.digest_len());
        }
    }

    #[test]
    fn test_prefix_parsing() {
        assert_eq!(
            HashAlgorithm::from_prefix("SHA384"),
            Some(HashAlgorithm::Sha384)
        );
        assert_eq!(HashAlgorithm::from_prefix("sha1"), None);
        assert_eq!(HashAlgorithm::Sha512.to_string(), "sha512");
    }
}
