//! Configuration parsing and validation.
//!
//! Trendline is configured via a TOML file (default:
//! `config/trendline.toml`). The file is parsed into a [`Config`] and
//! validated by [`load_config`]. Every component receives the parts it
//! needs explicitly; nothing reads configuration from global state.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/trendline.sqlite"
//!
//! [pipeline]
//! version = "v1.0.0"
//! brief = "Spring campaign: soft pastel UI"
//!
//! [collect]
//! root = "./data/raw"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [trends]
//! root = "./data/raw/google_trends"
//! output_dir = "./outputs/trends"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub collect: Option<CollectConfig>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub trends: TrendsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Free-form brief handed to the topic analyzer.
    #[serde(default)]
    pub brief: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            brief: None,
        }
    }
}

fn default_version() -> String {
    "v1.0.0".to_string()
}

/// Filesystem collection: `<root>/<source>/*.json`.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}
fn default_max_title_chars() -> usize {
    300
}
fn default_max_content_chars() -> usize {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendsConfig {
    /// Directory of raw trend sample files. Trend analysis is skipped
    /// during `run` when unset.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_trends_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            root: None,
            output_dir: default_trends_output_dir(),
        }
    }
}

fn default_trends_output_dir() -> PathBuf {
    PathBuf::from("./outputs/trends")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.pipeline.version.trim().is_empty() {
        anyhow::bail!("pipeline.version must not be empty");
    }

    if let Some(collect) = &config.collect {
        if collect.max_title_chars == 0 {
            anyhow::bail!("collect.max_title_chars must be > 0");
        }
        if collect.max_content_chars == 0 {
            anyhow::bail!("collect.max_content_chars must be > 0");
        }
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    match config.logging.format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!(
            "Unknown logging format: '{}'. Must be text or json.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse("[db]\npath = \"./x.sqlite\"\n").unwrap();
        assert_eq!(config.pipeline.version, "v1.0.0");
        assert!(config.collect.is_none());
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.trends.output_dir, PathBuf::from("./outputs/trends"));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_collect_defaults() {
        let config = parse(
            r#"
            [db]
            path = "./x.sqlite"
            [collect]
            root = "./raw"
            "#,
        )
        .unwrap();
        let collect = config.collect.unwrap();
        assert_eq!(collect.include_globs, vec!["**/*.json"]);
        assert_eq!(collect.max_title_chars, 300);
        assert_eq!(collect.max_content_chars, 3000);
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let err = parse(
            r#"
            [db]
            path = "./x.sqlite"
            [embedding]
            provider = "openai"
            model = "text-embedding-3-small"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let err = parse(
            r#"
            [db]
            path = "./x.sqlite"
            [embedding]
            provider = "openai"
            dims = 8
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_rejects_unknown_provider_and_format() {
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"local\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[logging]\nformat = \"xml\"\n").is_err());
    }
}
