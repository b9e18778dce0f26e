//! Per-family resolution policies.
//!
//! Every policy turns one lock entry into a [`SourceRecord`] or a [`SkipReason`].
//! Skips are never fatal: the caller logs them and moves on to the next entry.

use crate::source::{SourceKind, SourceRecord};
use deno2nix_lock::{
    parse_npm_key, Integrity, IntegrityEncoding, IntegrityError, JsrKey, NpmPackage, PackageName,
    Version,
};
use deno2nix_registry::{MetadataSource, RegistryConfig, RegistryError};
use thiserror::Error;

const REMOTE_DEFAULT_VERSION: &str = "0.0.0";
const REMOTE_DEFAULT_FILENAME: &str = "remote";

#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("could not parse {kind} package key: {key}")]
    InvalidKey { kind: SourceKind, key: String },
    #[error("no integrity recorded for {0}")]
    MissingIntegrity(String),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("could not fetch mirror metadata for {package}: {source}")]
    Lookup {
        package: String,
        #[source]
        source: RegistryError,
    },
    #[error("invalid remote URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Resolution policies, bound to the registry endpoints of one run.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry_url: String,
    registry_host: String,
    mirror_host: String,
}

impl Resolver {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            registry_url: config.registry_url.trim_end_matches('/').to_owned(),
            registry_host: config.registry_host()?,
            mirror_host: config.mirror_host()?,
        })
    }

    /// Tarball URL following the npm registry's path convention.
    pub fn npm_tarball_url(&self, name: &PackageName, version: &Version) -> String {
        match name.scope_and_name() {
            Some((scope, pkg)) => format!(
                "{}/@{scope}/{pkg}/-/{pkg}-{version}.tgz",
                self.registry_url
            ),
            None => format!("{}/{name}/-/{name}-{version}.tgz", self.registry_url),
        }
    }

    pub fn resolve_npm(&self, key: &str, package: &NpmPackage) -> Result<SourceRecord, SkipReason> {
        let parsed = parse_npm_key(key).ok_or_else(|| SkipReason::InvalidKey {
            kind: SourceKind::Npm,
            key: key.to_owned(),
        })?;
        let raw = package
            .integrity
            .as_deref()
            .ok_or_else(|| SkipReason::MissingIntegrity(key.to_owned()))?;
        let integrity = Integrity::decode(raw)?;

        Ok(SourceRecord {
            kind: SourceKind::Npm,
            name: parsed.name.to_string(),
            registry_path: format!("{}/{}/{}", self.registry_host, parsed.name, parsed.version),
            url: self.npm_tarball_url(&parsed.name, &parsed.version),
            package_name: parsed.name,
            version: parsed.version,
            integrity,
        })
    }

    /// Resolve a jsr package through the mirror.
    ///
    /// The lock's own jsr hash covers jsr's file manifest, not the tarball the
    /// mirror serves, so the pinned URL and integrity come from the mirror's
    /// metadata for `@jsr/<scope>__<name>`.
    pub fn resolve_jsr(
        &self,
        key: &JsrKey,
        source: &dyn MetadataSource,
    ) -> Result<SourceRecord, SkipReason> {
        let mirror_name = key.mirror_name();
        let dist = source
            .fetch_dist(&mirror_name, &key.version)
            .map_err(|e| SkipReason::Lookup {
                package: format!("{mirror_name}@{}", key.version),
                source: e,
            })?;
        let integrity = Integrity::decode(&dist.integrity)?;
        let full_name = key.full_name();

        Ok(SourceRecord {
            kind: SourceKind::Jsr,
            name: full_name.to_string(),
            package_name: full_name,
            version: key.version.clone(),
            registry_path: format!("{}/{mirror_name}/{}", self.mirror_host, key.version),
            url: dist.tarball,
            integrity,
        })
    }

    pub fn resolve_remote(&self, raw_url: &str, hash: &str) -> Result<SourceRecord, SkipReason> {
        let invalid = |reason: String| SkipReason::InvalidUrl {
            url: raw_url.to_owned(),
            reason,
        };
        let parsed = url::Url::parse(raw_url).map_err(|e| invalid(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("missing host".to_owned()))?;
        let filename = parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .unwrap_or(REMOTE_DEFAULT_FILENAME);
        let integrity = Integrity::decode(hash)?;
        if integrity.encoding != IntegrityEncoding::HexSha256 {
            return Err(IntegrityError::UnknownFormat(hash.to_owned()).into());
        }
        let name = format!("remote:{host}/{filename}");

        Ok(SourceRecord {
            kind: SourceKind::Remote,
            package_name: PackageName::from(name.as_str()),
            name,
            version: Version::from(remote_version(raw_url)),
            registry_path: String::new(),
            url: raw_url.to_owned(),
            integrity,
        })
    }
}

/// First `@<digits and dots>` run in a URL, e.g. `0.167.0` in
/// `https://deno.land/std@0.167.0/fs/mod.ts`.
pub fn remote_version(url: &str) -> &str {
    for (at, _) in url.match_indices('@') {
        let tail = &url[at + 1..];
        let end = tail
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(tail.len());
        if end > 0 {
            return &tail[..end];
        }
    }
    REMOTE_DEFAULT_VERSION
}
