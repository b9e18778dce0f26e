use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// The only `version` value of `deno.lock` this crate understands.
pub const SUPPORTED_LOCK_VERSION: &str = "5";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to read lock file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse lock file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported lock version: {0}, expected {SUPPORTED_LOCK_VERSION}")]
    UnsupportedVersion(String),
}

/// A decoded `deno.lock` v5 document.
///
/// Sections that are absent from the file decode as empty maps. Maps are ordered,
/// so iterating a section always visits keys in lexicographic order regardless of
/// how the file was written.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockManifest {
    pub version: String,
    #[serde(default)]
    pub specifiers: BTreeMap<String, String>,
    #[serde(default)]
    pub jsr: BTreeMap<String, JsrPackage>,
    #[serde(default)]
    pub npm: BTreeMap<String, NpmPackage>,
    #[serde(default)]
    pub remote: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JsrPackage {
    #[serde(default)]
    pub integrity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NpmPackage {
    #[serde(default)]
    pub integrity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpu: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub bin: bool,
    #[serde(default)]
    pub scripts: bool,
}

impl LockManifest {
    pub fn is_empty(&self) -> bool {
        self.npm.is_empty() && self.jsr.is_empty() && self.remote.is_empty()
    }
}

/// Decode lock file text.
///
/// The version tag is checked before the sections are typed, so a lock written
/// in an older layout is reported as an unsupported version rather than as a
/// shape mismatch deep inside one of its sections.
pub fn decode_lock_str(input: &str) -> Result<LockManifest, LockError> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    match value.get("version") {
        Some(serde_json::Value::String(v)) if v == SUPPORTED_LOCK_VERSION => {}
        Some(serde_json::Value::String(v)) => {
            return Err(LockError::UnsupportedVersion(v.clone()));
        }
        Some(other) => return Err(LockError::UnsupportedVersion(other.to_string())),
        None => return Err(LockError::UnsupportedVersion("unknown".to_owned())),
    }
    Ok(serde_json::from_value(value)?)
}

pub fn read_lock_file(path: impl AsRef<Path>) -> Result<LockManifest, LockError> {
    let content = fs::read_to_string(path)?;
    decode_lock_str(&content)
}
