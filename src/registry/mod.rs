//! Package index client.
//!
//! Provides an async client for the PyPI endpoints the pipeline needs:
//! - release metadata (declared dependencies and known vulnerabilities)
//! - the simple listing, for locating source distributions
//! - file downloads
//!
//! [`PypiIndex`] wraps the client with a private runtime so the synchronous
//! pipeline stages can call it.

mod cache;
mod pypi;

pub use cache::MetadataCache;
pub use pypi::{find_sdist_link, normalize_package_name, parse_metadata};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::RegistryConfig;
use crate::model::Vulnerability;
use crate::resolve::MetadataSource;

/// Errors that can occur while talking to the package index.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by registry")]
    RateLimited,
    #[error("not found on the index")]
    NotFound,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A `(name, version)` pair to query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for PackageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// Release metadata returned by the index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Dependency declaration strings (`requires_dist`).
    pub requires_dist: Vec<String>,
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Async client for one package index.
pub struct RegistryClient {
    http: reqwest::Client,
    index: Url,
    cache: MetadataCache,
    timeout: Duration,
}

impl RegistryClient {
    /// Create a new registry client with the given configuration.
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Self::with_cache(config, MetadataCache::new(config.cache_ttl_hours))
    }

    pub fn with_cache(config: &RegistryConfig, cache: MetadataCache) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pyreach/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Url::join replaces the last segment unless the base ends with '/'.
        let mut base = config.index_url.trim_end_matches('/').to_string();
        base.push('/');
        let index = Url::parse(&base).map_err(|e| RegistryError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            http,
            index,
            cache,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    /// Fetch release metadata, consulting the cache first.
    pub async fn metadata(&self, package: &PackageRef) -> Result<PackageMetadata, RegistryError> {
        if let Some(cached) = self.cache.get(&package.name, &package.version) {
            log::debug!("metadata cache hit for {}", package);
            return Ok(cached);
        }

        let metadata = pypi::fetch_metadata(
            &self.http,
            &self.index,
            &package.name,
            &package.version,
            self.timeout,
        )
        .await?;
        self.cache.set(&package.name, &package.version, &metadata);
        Ok(metadata)
    }

    /// Find the source distribution link of a release.
    pub async fn sdist_link(&self, package: &PackageRef) -> Result<Option<Url>, RegistryError> {
        let (page, html) =
            pypi::fetch_listing(&self.http, &self.index, &package.name, self.timeout).await?;
        Ok(find_sdist_link(&html, &page, &package.name, &package.version))
    }

    /// Download `url` into `dest`.
    pub async fn download(&self, url: Url, dest: &mut std::fs::File) -> Result<u64, RegistryError> {
        pypi::download(&self.http, url, dest, self.timeout).await
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.stats()
    }
}

/// Blocking facade over [`RegistryClient`].
pub struct PypiIndex {
    client: RegistryClient,
    runtime: tokio::runtime::Runtime,
    max_concurrent: usize,
}

impl PypiIndex {
    pub fn new(config: &RegistryConfig) -> anyhow::Result<Self> {
        Ok(Self::from_client(
            RegistryClient::new(config)?,
            config.max_concurrent_requests,
        )?)
    }

    pub fn from_client(client: RegistryClient, max_concurrent: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        Ok(Self {
            client,
            runtime,
            max_concurrent: max_concurrent.max(1),
        })
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    pub fn sdist_link(&self, package: &PackageRef) -> Result<Option<Url>, RegistryError> {
        self.runtime.block_on(self.client.sdist_link(package))
    }

    pub fn download(&self, url: Url, dest: &mut std::fs::File) -> Result<u64, RegistryError> {
        self.runtime.block_on(self.client.download(url, dest))
    }
}

impl MetadataSource for PypiIndex {
    /// Fetch all requests concurrently; results come back in request order.
    fn fetch_metadata(&self, requests: &[PackageRef]) -> Vec<Result<PackageMetadata, RegistryError>> {
        use futures::stream::{self, StreamExt};

        let client = &self.client;
        let results = self.runtime.block_on(
            stream::iter(requests)
                .map(|package| async move { client.metadata(package).await })
                .buffered(self.max_concurrent)
                .collect::<Vec<_>>(),
        );

        let (hits, misses) = client.cache_stats();
        log::debug!("metadata cache: {} hits, {} misses", hits, misses);
        results
    }
}
