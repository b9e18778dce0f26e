use crate::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An npm-style package document (`GET /<package>`), reduced to what is needed
/// to pin a tarball. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageMetadata {
    #[serde(default)]
    pub versions: BTreeMap<String, VersionMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionMetadata {
    #[serde(default)]
    pub dist: Option<Dist>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dist {
    #[serde(default)]
    pub tarball: Option<String>,
    #[serde(default)]
    pub integrity: Option<String>,
}

/// Pinned location and hash of one published tarball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistInfo {
    pub tarball: String,
    pub integrity: String,
}

impl PackageMetadata {
    pub fn from_slice(data: &[u8]) -> Result<Self, RegistryError> {
        serde_json::from_slice(data)
            .map_err(|e| RegistryError::Serialization(format!("invalid package metadata: {e}")))
    }

    /// Select the dist block of `version`. A version without a complete
    /// `dist.tarball` + `dist.integrity` pair is reported as missing dist info.
    pub fn dist_for(&self, package: &str, version: &str) -> Result<DistInfo, RegistryError> {
        let entry = self
            .versions
            .get(version)
            .ok_or_else(|| RegistryError::VersionNotFound {
                package: package.to_owned(),
                version: version.to_owned(),
            })?;
        let missing = || RegistryError::MissingDist {
            package: package.to_owned(),
            version: version.to_owned(),
        };
        let dist = entry.dist.as_ref().ok_or_else(missing)?;
        match (&dist.tarball, &dist.integrity) {
            (Some(tarball), Some(integrity)) => Ok(DistInfo {
                tarball: tarball.clone(),
                integrity: integrity.clone(),
            }),
            _ => Err(missing()),
        }
    }
}
