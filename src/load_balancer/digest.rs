//! Ring position hashing.
//!
//! Positions are the leading 128 bits of a cryptographic digest, read as a
//! big-endian unsigned integer.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::load_balancer::StrategyError;

/// Digest used to place keys and backends on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    /// SHA-256 truncated to its first 16 bytes.
    Sha256,
}

impl HashAlgorithm {
    /// Ring position of `salt + key`.
    pub fn position(&self, salt: &str, key: &str) -> u128 {
        let mut bytes = [0u8; 16];
        match self {
            HashAlgorithm::Md5 => {
                let mut hasher = Md5::new();
                hasher.update(salt.as_bytes());
                hasher.update(key.as_bytes());
                bytes.copy_from_slice(&hasher.finalize());
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(salt.as_bytes());
                hasher.update(key.as_bytes());
                bytes.copy_from_slice(&hasher.finalize()[..16]);
            }
        }
        u128::from_be_bytes(bytes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(StrategyError::UnsupportedDigest(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
