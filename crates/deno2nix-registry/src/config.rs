use crate::RegistryError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";
pub const DEFAULT_MIRROR_URL: &str = "https://npm.jsr.io";
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

/// Endpoints and lookup limits.
///
/// Every field is optional in the TOML file; missing fields take the defaults
/// above. URLs are stored without a trailing slash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// npm registry used for tarball URLs of the `npm` section.
    pub registry_url: String,
    /// npm-compatible mirror serving `jsr` packages.
    pub mirror_url: String,
    pub max_concurrent_lookups: usize,
    pub request_timeout_secs: u64,
    /// Budget for all mirror lookups of one run.
    pub deadline_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_owned(),
            mirror_url: DEFAULT_MIRROR_URL.to_owned(),
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            deadline_secs: DEFAULT_DEADLINE_SECS,
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub fn with_registry_url(mut self, url: &str) -> Self {
        self.registry_url = url.trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_mirror_url(mut self, url: &str) -> Self {
        self.mirror_url = url.trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_max_concurrent_lookups(mut self, limit: usize) -> Self {
        self.max_concurrent_lookups = limit;
        self
    }

    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_deadline_secs(mut self, secs: u64) -> Self {
        self.deadline_secs = secs;
        self
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| RegistryError::Config(format!("invalid registry config: {e}")))?;
        config.registry_url = config.registry_url.trim_end_matches('/').to_owned();
        config.mirror_url = config.mirror_url.trim_end_matches('/').to_owned();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        self.registry_host()?;
        self.mirror_host()?;
        if self.max_concurrent_lookups == 0 {
            return Err(RegistryError::Config(
                "max_concurrent_lookups must be at least 1".to_owned(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RegistryError::Config(
                "request_timeout_secs must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Host of the npm registry, used as the first cache path component.
    pub fn registry_host(&self) -> Result<String, RegistryError> {
        host_of(&self.registry_url)
    }

    /// Host of the jsr mirror, used as the first cache path component.
    pub fn mirror_host(&self) -> Result<String, RegistryError> {
        host_of(&self.mirror_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn host_of(raw: &str) -> Result<String, RegistryError> {
    let parsed =
        url::Url::parse(raw).map_err(|e| RegistryError::Config(format!("invalid URL '{raw}': {e}")))?;
    parsed
        .host_str()
        .map(str::to_owned)
        .ok_or_else(|| RegistryError::Config(format!("URL '{raw}' has no host")))
}
