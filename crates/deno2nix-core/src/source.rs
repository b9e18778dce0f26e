use deno2nix_lock::{Integrity, PackageName, Version};
use serde::Serialize;
use std::fmt;

/// Lock section a source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Npm,
    /// jsr package fetched through the npm compatibility mirror.
    Jsr,
    Remote,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Npm => "npm",
            SourceKind::Jsr => "jsr",
            SourceKind::Remote => "remote",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetchable artifact with its pinned hash and cache placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub kind: SourceKind,
    pub name: String,
    pub package_name: PackageName,
    pub version: Version,
    /// Directory under the cache root the archive is unpacked into. Empty for
    /// remote files, which are not placed in the registry cache.
    pub registry_path: String,
    pub url: String,
    pub integrity: Integrity,
}

impl SourceRecord {
    /// `packageName-version`, the deduplication and sort key.
    pub fn key(&self) -> String {
        format!("{}-{}", self.package_name, self.version)
    }
}
