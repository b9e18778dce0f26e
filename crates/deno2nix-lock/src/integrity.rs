//! Normalization of content hashes.
//!
//! Lock files and registry metadata use three spellings for a digest: SRI strings
//! (`sha512-<base64>`, `sha256-<base64>`) and bare lowercase hex SHA-256. Nix wants
//! an algorithm-tagged base64 value, so everything is normalized to that.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use thiserror::Error;

const HEX_SHA256_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("unknown integrity format: '{0}'")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Attribute name used by `fetchurl` for this algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the digest was spelled before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrityEncoding {
    HexSha256,
    SriSha256,
    SriSha512,
}

/// A digest normalized to base64, tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Integrity {
    pub encoding: IntegrityEncoding,
    pub value: String,
}

impl Integrity {
    pub fn decode(raw: &str) -> Result<Self, IntegrityError> {
        if let Some(value) = raw.strip_prefix("sha512-") {
            return Ok(Self {
                encoding: IntegrityEncoding::SriSha512,
                value: value.to_owned(),
            });
        }
        if let Some(value) = raw.strip_prefix("sha256-") {
            return Ok(Self {
                encoding: IntegrityEncoding::SriSha256,
                value: value.to_owned(),
            });
        }
        if is_lower_hex_sha256(raw) {
            let bytes =
                hex::decode(raw).map_err(|_| IntegrityError::UnknownFormat(raw.to_owned()))?;
            return Ok(Self {
                encoding: IntegrityEncoding::HexSha256,
                value: STANDARD.encode(bytes),
            });
        }
        Err(IntegrityError::UnknownFormat(raw.to_owned()))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self.encoding {
            IntegrityEncoding::HexSha256 | IntegrityEncoding::SriSha256 => HashAlgorithm::Sha256,
            IntegrityEncoding::SriSha512 => HashAlgorithm::Sha512,
        }
    }
}

fn is_lower_hex_sha256(raw: &str) -> bool {
    raw.len() == HEX_SHA256_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
