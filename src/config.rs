//! Configuration parsing and validation.
//!
//! `wsk` reads an optional TOML file (`--config`, default
//! `./config/wsk.toml`). Every section and field has a default, so an empty
//! file is valid and a missing default file falls back to
//! [`Config::minimal`]. The connection settings are usually supplied through
//! the environment instead:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `WEAVIATE_URL` | `weaviate.url` |
//! | `WEAVIATE_API_KEY` | `weaviate.api_key` |
//!
//! ```toml
//! [weaviate]
//! url = "https://my-cluster.weaviate.cloud"
//! forward_provider_keys = true
//!
//! [client]
//! timeout_secs = 30
//! max_retries = 3
//!
//! [output]
//! format = "markdown"
//!
//! [search]
//! default_limit = 10
//! default_alpha = 0.7
//!
//! [import]
//! batch_size = 100
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config/wsk.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub weaviate: WeaviateConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeaviateConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Forward provider API keys found in the environment as vendor headers.
    #[serde(default = "default_true")]
    pub forward_provider_keys: bool,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            forward_provider_keys: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// `markdown` or `json`. `--json` on a command always wins.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "markdown".to_string()
}

impl OutputConfig {
    pub fn prefers_json(&self) -> bool {
        self.format == "json"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_alpha")]
    pub default_alpha: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_alpha: default_alpha(),
        }
    }
}

fn default_limit() -> usize {
    10
}
fn default_alpha() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

impl Config {
    /// Configuration with every default and no file behind it.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Apply `WEAVIATE_URL` / `WEAVIATE_API_KEY` from the environment.
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env("WEAVIATE_URL") {
            self.weaviate.url = Some(url);
        }
        if let Some(key) = non_empty_env("WEAVIATE_API_KEY") {
            self.weaviate.api_key = Some(key);
        }
    }

    /// The cluster URL, or an error telling the user how to set it.
    pub fn weaviate_url(&self) -> Result<&str> {
        match self.weaviate.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => bail!(
                "WEAVIATE_URL environment variable not set. \
                 Set it to your cluster URL (or set weaviate.url in the config file)."
            ),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.client.timeout_secs == 0 {
            bail!("client.timeout_secs must be > 0");
        }
        if self.import.batch_size < 1 {
            bail!("import.batch_size must be >= 1");
        }
        if self.search.default_limit < 1 {
            bail!("search.default_limit must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.search.default_alpha) {
            bail!("search.default_alpha must be in [0.0, 1.0]");
        }
        match self.output.format.as_str() {
            "markdown" | "json" => {}
            other => bail!(
                "Unknown output format: '{}'. Must be markdown or json.",
                other
            ),
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse and validate a configuration file. Environment overrides are not
/// applied here.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration for a command and apply environment overrides.
///
/// A missing file is only tolerated at the default path.
pub fn load_or_default(path: &Path) -> Result<Config> {
    let mut config = if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        tracing::debug!("no config file at {}, using defaults", path.display());
        Config::minimal()
    } else {
        load_config(path)?
    };
    config.apply_env();
    Ok(config)
}
