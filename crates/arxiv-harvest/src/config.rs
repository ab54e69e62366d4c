//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! below. [`load_config`] rejects values the pipeline cannot run with
//! (zero batch size, unknown provider, unsafe collection name) before any
//! connection is opened.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Table name for stored records; its FTS index is `{collection}_fts`.
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "arxiv_records".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarvestConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Pause between consecutive page requests. The arXiv API asks for 3s.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            category: default_category(),
            page_size: default_page_size(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}
fn default_category() -> String {
    "cs.AI".to_string()
}
fn default_page_size() -> i64 {
    100
}
fn default_request_delay_ms() -> u64 {
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
    /// Ollama endpoint; ignored by other providers.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    20
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
pub struct RetrievalConfig {
    /// Hard default for `count` when neither the caller nor the declared
    /// parameters supply one.
    #[serde(default = "default_count")]
    pub default_count: i64,
    #[serde(default = "default_max_count")]
    pub max_count: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: default_max_count(),
        }
    }
}

fn default_count() -> i64 {
    2
}
fn default_max_count() -> i64 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// `[A-Za-z_][A-Za-z0-9_]*`. The collection name is interpolated into SQL.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if !is_valid_identifier(&config.db.collection) {
        bail!(
            "db.collection '{}' must match [A-Za-z_][A-Za-z0-9_]*",
            config.db.collection
        );
    }

    if config.harvest.page_size <= 0 {
        bail!("harvest.page_size must be > 0");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.retrieval.max_count < 1 {
        bail!("retrieval.max_count must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/axh.sqlite"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.db.collection, "arxiv_records");
        assert_eq!(config.harvest.base_url, "http://export.arxiv.org/api/query");
        assert_eq!(config.harvest.category, "cs.AI");
        assert_eq!(config.harvest.page_size, 100);
        assert_eq!(config.harvest.request_delay_ms, 3000);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.embedding.batch_size, 20);
        assert_eq!(config.retrieval.default_count, 2);
        assert_eq!(config.retrieval.max_count, 50);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_rejects_unsafe_collection() {
        let toml = r#"
[db]
path = "x.sqlite"
collection = "records; DROP TABLE x"
"#;
        let err = parse_config(toml).unwrap_err();
        assert!(err.to_string().contains("db.collection"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let toml = format!("{}\n[embedding]\nbatch_size = 0\n", MINIMAL);
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_rejects_non_positive_page_size() {
        let toml = format!("{}\n[harvest]\npage_size = 0\n", MINIMAL);
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn test_enabled_provider_needs_model_and_dims() {
        let toml = format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL);
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let toml = format!(
            "{}\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
            MINIMAL
        );
        assert!(parse_config(&toml).is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        let toml = format!(
            "{}\n[embedding]\nprovider = \"magic\"\nmodel = \"m\"\ndims = 8\n",
            MINIMAL
        );
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_identifier_rule() {
        assert!(is_valid_identifier("arxiv_records"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/axh.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
