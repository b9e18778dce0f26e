//! Registry access for deno2nix.
//!
//! This crate holds the endpoints the generator talks about (`RegistryConfig`),
//! the serde model of npm-style package metadata documents, and the one network
//! capability the pipeline needs: asking the JSR npm mirror for the tarball URL
//! and integrity of a single package version (`MetadataSource`). The HTTP
//! implementation lives in [`http`]; tests substitute their own sources.

pub mod config;
pub mod http;
pub mod metadata;

pub use config::RegistryConfig;
pub use http::HttpMetadataSource;
pub use metadata::{Dist, DistInfo, PackageMetadata, VersionMetadata};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("version {version} of {package} not found in registry metadata")]
    VersionNotFound { package: String, version: String },
    #[error("no dist info for {package}@{version}")]
    MissingDist { package: String, version: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("registry config error: {0}")]
    Config(String),
    #[error("lookup deadline exceeded before requesting {0}")]
    DeadlineExceeded(String),
}

/// Source of per-version distribution metadata for mirror packages.
pub trait MetadataSource: Send + Sync {
    /// Look up the tarball URL and integrity string of `package` at `version`.
    fn fetch_dist(&self, package: &str, version: &str) -> Result<DistInfo, RegistryError>;
}
