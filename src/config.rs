//! TOML configuration.
//!
//! ```toml
//! [wiki]
//! api_url = "https://tolkiengateway.net/w/api.php"
//! article_base = "https://tolkiengateway.net/wiki/"
//! source_name = "Tolkien Gateway"
//!
//! [graph]
//! base_uri = "http://tolkiengateway.net"
//!
//! [output]
//! path = "data/tolkien_pages_entities.ttl"
//!
//! [store]
//! endpoint = "http://localhost:3030"
//! dataset = "tolkienKG"
//!
//! [server]
//! bind = "127.0.0.1:5000"
//!
//! [queries.typed_entities]
//! description = "Entities and their rdf:type"
//! sparql = "SELECT ?entity ?type WHERE { ?entity a ?type } LIMIT 50"
//! ```
//!
//! Only `[wiki]` and `[graph]` are required; everything else has defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub wiki: WikiConfig,
    pub graph: GraphConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Named SELECT queries, served under `/api/queries/<name>`.
    #[serde(default)]
    pub queries: BTreeMap<String, NamedQuery>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WikiConfig {
    /// MediaWiki `api.php` URL.
    pub api_url: String,
    /// Prefix for article URLs, e.g. `https://tolkiengateway.net/wiki/`.
    #[serde(default)]
    pub article_base: Option<String>,
    /// Wiki name recorded as `dcterms:source`.
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub namespace: i64,
    /// `aplimit`; `None` sends `max`.
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_wiki_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_delay_ms() -> u64 {
    300
}
fn default_wiki_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("wiki-kg/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    32_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    /// Root of minted URIs; documents live under `<base_uri>/page/`,
    /// entities under `<base_uri>/resource/`.
    pub base_uri: String,
    #[serde(default = "default_describe_pages")]
    pub describe_pages: bool,
}

fn default_describe_pages() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/pages_entities.ttl")
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
    /// Readiness probes before giving up, one second apart.
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
    /// Files loaded first, in this order.
    #[serde(default)]
    pub load_files: Vec<PathBuf>,
    /// Extra files discovered under `load_root`, loaded after `load_files`
    /// in sorted order.
    #[serde(default)]
    pub load_globs: Vec<String>,
    #[serde(default = "default_load_root")]
    pub load_root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_store_endpoint(),
            dataset: default_dataset(),
            timeout_secs: default_store_timeout_secs(),
            ready_attempts: default_ready_attempts(),
            load_files: Vec::new(),
            load_globs: Vec::new(),
            load_root: default_load_root(),
        }
    }
}

fn default_store_endpoint() -> String {
    "http://localhost:3030".to_string()
}
fn default_dataset() -> String {
    "kg".to_string()
}
fn default_store_timeout_secs() -> u64 {
    60
}
fn default_ready_attempts() -> u32 {
    30
}
fn default_load_root() -> PathBuf {
    PathBuf::from(".")
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
    "127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    #[serde(default)]
    pub description: Option<String>,
    /// A SPARQL SELECT query.
    pub sparql: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate wiki
    if !is_http_url(&config.wiki.api_url) {
        anyhow::bail!(
            "wiki.api_url must be an http(s) URL, got '{}'",
            config.wiki.api_url
        );
    }
    if config.wiki.retry.max_attempts == 0 {
        anyhow::bail!("wiki.retry.max_attempts must be >= 1");
    }
    if let Some(size) = config.wiki.batch_size {
        if !(1..=5000).contains(&size) {
            anyhow::bail!("wiki.batch_size must be in [1, 5000], got {}", size);
        }
    }

    // Validate graph
    if !is_http_url(&config.graph.base_uri) {
        anyhow::bail!(
            "graph.base_uri must start with http:// or https://, got '{}'",
            config.graph.base_uri
        );
    }
    config.graph.base_uri = config.graph.base_uri.trim_end_matches('/').to_string();

    // Validate store
    if config.store.dataset.trim().is_empty() {
        anyhow::bail!("store.dataset must not be empty");
    }
    config.store.endpoint = config.store.endpoint.trim_end_matches('/').to_string();

    // Validate queries
    for (name, query) in &config.queries {
        if !is_query_name(name) {
            anyhow::bail!(
                "queries.{}: names may only use letters, digits, '_' and '-'",
                name
            );
        }
        if query.sparql.trim().is_empty() {
            anyhow::bail!("queries.{}.sparql must not be empty", name);
        }
    }

    Ok(config)
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Query names become URL path segments.
fn is_query_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
