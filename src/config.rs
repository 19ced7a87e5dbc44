//! Configuration file schema for pyreach.
//!
//! Every field is optional; a missing file means all defaults.

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File names probed by [`Config::discover`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["pyreach.yaml", ".pyreach.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub locate: LocateConfig,
    /// Directory for downloaded and extracted sources. A temporary
    /// directory is used when unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Look for a configuration file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// Load the explicit config, or a discovered one, or the defaults.
    pub fn load(explicit: Option<&Path>, search_dir: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(search_dir),
        };
        let config = match path {
            Some(p) => {
                log::info!("using config {}", p.display());
                Self::parse_file(&p)?
            }
            None => Self::default(),
        };
        validate(&config)?;
        Ok(config)
    }
}

/// Package index settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Base URL of the index (default: https://pypi.org/)
    #[serde(default = "default_index_url")]
    pub index_url: String,
    /// Request timeout in milliseconds (default: 10000)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// How long to cache metadata responses in hours; 0 disables (default: 24)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: u32,
    /// Upper bound on in-flight metadata requests (default: 8)
    #[serde(default = "default_concurrency")]
    pub max_concurrent_requests: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            timeout_ms: default_timeout(),
            cache_ttl_hours: default_cache_ttl(),
            max_concurrent_requests: default_concurrency(),
        }
    }
}

fn default_index_url() -> String {
    "https://pypi.org/".to_string()
}

fn default_timeout() -> u64 {
    10_000
}

fn default_cache_ttl() -> u32 {
    24
}

fn default_concurrency() -> usize {
    8
}

/// External per-function analyzer invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the symbol and path list.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_args() -> Vec<String> {
    vec!["function_parser.py".to_string()]
}

/// Definition lookup inside extracted sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocateConfig {
    /// File extension of source files, without the dot (default: py)
    #[serde(default = "default_suffix")]
    pub source_suffix: String,
    /// Text preceding a definition name (default: "def ")
    #[serde(default = "default_marker")]
    pub definition_marker: String,
    /// Glob patterns for paths to skip (e.g., "**/tests/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            source_suffix: default_suffix(),
            definition_marker: default_marker(),
            excluded_paths: Vec::new(),
        }
    }
}

fn default_suffix() -> String {
    "py".to_string()
}

fn default_marker() -> String {
    "def ".to_string()
}

impl LocateConfig {
    /// Compile `excluded_paths`. Returns `None` when there are none.
    pub fn glob_set(&self) -> anyhow::Result<Option<GlobSet>> {
        if self.excluded_paths.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid excluded_paths pattern {:?}", pattern))?;
            builder.add(glob);
        }
        Ok(Some(builder.build()?))
    }
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    let index = &config.registry.index_url;
    if !(index.starts_with("http://") || index.starts_with("https://")) {
        anyhow::bail!("invalid index_url {:?}, must be an http(s) URL", index);
    }

    if config.registry.max_concurrent_requests == 0 {
        anyhow::bail!("max_concurrent_requests must be at least 1");
    }

    if config.analyzer.program.trim().is_empty() {
        anyhow::bail!("analyzer program must not be empty");
    }

    if config.locate.definition_marker.is_empty() {
        anyhow::bail!("definition_marker must not be empty");
    }

    config.locate.glob_set()?;

    Ok(())
}
