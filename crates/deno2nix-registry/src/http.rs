use crate::{DistInfo, MetadataSource, PackageMetadata, RegistryConfig, RegistryError};
use std::io::Read;
use std::time::{Duration, Instant};

/// Mirror metadata lookups over HTTP.
///
/// Issues `GET <mirror_url>/<package>` and picks the requested version out of
/// the returned package document. Each request is bounded by the configured
/// request timeout, shortened to whatever is left before the optional deadline.
/// Once the deadline has passed, lookups fail without touching the network.
pub struct HttpMetadataSource {
    base_url: String,
    agent: ureq::Agent,
    request_timeout: Duration,
    deadline: Option<Instant>,
}

impl HttpMetadataSource {
    pub fn new(config: &RegistryConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout()))
            .build()
            .into();
        Self {
            base_url: config.mirror_url.trim_end_matches('/').to_owned(),
            agent,
            request_timeout: config.request_timeout(),
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn url(&self, package: &str) -> String {
        format!("{}/{}", self.base_url, package)
    }

    /// Timeout for the next request, and whether the deadline is what bounds it.
    /// `None` once the deadline has passed.
    fn next_timeout(&self) -> Option<(Duration, bool)> {
        let Some(deadline) = self.deadline else {
            return Some((self.request_timeout, false));
        };
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            None
        } else if left < self.request_timeout {
            Some((left, true))
        } else {
            Some((self.request_timeout, false))
        }
    }

    fn do_get(&self, url: &str, timeout: Duration, capped: bool) -> Result<Vec<u8>, RegistryError> {
        let req = self
            .agent
            .get(url)
            .header("Accept", "application/json")
            .config()
            .timeout_global(Some(timeout))
            .build();
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RegistryError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RegistryError::Http(format!("HTTP {code} for {url}")));
            }
            Err(ureq::Error::Timeout(_)) if capped => {
                return Err(RegistryError::DeadlineExceeded(url.to_owned()));
            }
            Err(e) => {
                return Err(RegistryError::Http(e.to_string()));
            }
        };

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| {
                if capped && e.kind() == std::io::ErrorKind::TimedOut {
                    RegistryError::DeadlineExceeded(url.to_owned())
                } else {
                    RegistryError::Http(e.to_string())
                }
            })?;
        Ok(body)
    }
}

impl MetadataSource for HttpMetadataSource {
    fn fetch_dist(&self, package: &str, version: &str) -> Result<DistInfo, RegistryError> {
        let url = self.url(package);
        let Some((timeout, capped)) = self.next_timeout() else {
            return Err(RegistryError::DeadlineExceeded(url));
        };
        tracing::debug!("GET {url}");
        let body = self.do_get(&url, timeout, capped)?;
        PackageMetadata::from_slice(&body)?.dist_for(package, version)
    }
}
