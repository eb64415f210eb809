//! TOML-based configuration for CyberSense
//!
//! This module provides declarative configuration for the server, the
//! optional report-phrasing LLM, the document knowledge base, the
//! orchestration policy and every intelligence agent via a TOML file
//! (`cybersense.toml`).
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Secrets are never stored in the file; they are referenced by the name of
//! the environment variable that holds them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from cybersense.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CyberSenseConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Language model used to phrase the final report
    #[serde(default)]
    pub llm: LlmConfig,

    /// Document knowledge base consulted by the documentation agent
    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    #[serde(default)]
    pub agents: AgentsConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// When false, reports are rendered from the template only
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            base_url: default_ollama_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Directory of `.md` / `.txt` documents indexed at startup
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Chunk size in words
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks returned per retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("data/docs")
}

fn default_chunk_size() -> usize {
    200
}

fn default_chunk_overlap() -> usize {
    40
}

fn default_top_k() -> usize {
    3
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

// ============= Orchestration Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Dispatch planned agents concurrently instead of one by one
    #[serde(default)]
    pub parallel_fan_out: bool,

    /// Upper bound for one whole query, HTTP layer only
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            parallel_fan_out: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl OrchestrationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub documentation: DocumentationAgentConfig,

    #[serde(default)]
    pub web: WebAgentConfig,

    #[serde(default)]
    pub telegram: TelegramAgentConfig,
}

fn default_true() -> bool {
    true
}

fn default_agent_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationAgentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
}

impl Default for DocumentationAgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_agent_timeout(),
        }
    }
}

/// Kind of web source, used for relevance scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    CveDatabase,
    Government,
    News,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSourceConfig {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebAgentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,

    /// Query keywords that put this agent into the plan
    #[serde(default = "default_web_triggers")]
    pub triggers: Vec<String>,

    #[serde(default = "default_web_sources")]
    pub sources: Vec<WebSourceConfig>,
}

fn default_web_triggers() -> Vec<String> {
    ["website", "web", "url", "news", "leak", "breach", "cve"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_web_sources() -> Vec<WebSourceConfig> {
    let source = |name: &str, url: &str, kind| WebSourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        kind,
    };
    vec![
        source("NIST NVD", "https://nvd.nist.gov", SourceKind::CveDatabase),
        source(
            "CISA Alerts",
            "https://www.cisa.gov/news-events/alerts",
            SourceKind::Government,
        ),
        source("Krebs on Security", "https://krebsonsecurity.com", SourceKind::News),
        source("The Hacker News", "https://thehackernews.com", SourceKind::News),
        source(
            "BleepingComputer",
            "https://www.bleepingcomputer.com",
            SourceKind::News,
        ),
    ]
}

impl Default for WebAgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_agent_timeout(),
            triggers: default_web_triggers(),
            sources: default_web_sources(),
        }
    }
}

/// Kind of monitored channel, used for relevance scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    News,
    Cve,
    ThreatIntel,
    Breach,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    pub name: String,
    /// Public handle, e.g. `@cve_feed`
    pub handle: String,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramAgentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_telegram_triggers")]
    pub triggers: Vec<String>,

    /// Environment variable name containing the Bot API token
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    #[serde(default = "default_telegram_api")]
    pub api_base: String,

    /// Maximum posts read per channel
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,

    #[serde(default = "default_channels")]
    pub channels: Vec<TelegramChannelConfig>,
}

fn default_telegram_triggers() -> Vec<String> {
    ["telegram", "channel", "group", "chat", "message"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_channels() -> Vec<TelegramChannelConfig> {
    let channel = |name: &str, handle: &str, kind| TelegramChannelConfig {
        name: name.to_string(),
        handle: handle.to_string(),
        kind,
    };
    vec![
        channel("Security Alerts", "@security_alerts", ChannelKind::News),
        channel("CVE Feed", "@cve_feed", ChannelKind::Cve),
        channel("Threat Intel", "@threat_intel", ChannelKind::ThreatIntel),
        channel("Data Breach Monitor", "@breach_monitor", ChannelKind::Breach),
    ]
}

fn default_message_limit() -> usize {
    10
}

impl Default for TelegramAgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_agent_timeout(),
            triggers: default_telegram_triggers(),
            bot_token_env: default_bot_token_env(),
            api_base: default_telegram_api(),
            message_limit: default_message_limit(),
            channels: default_channels(),
        }
    }
}

impl TelegramAgentConfig {
    /// Resolve the bot token from the environment, if set
    pub fn bot_token(&self) -> Option<String> {
        std::env::var(&self.bot_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl CyberSenseConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: CyberSenseConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file when it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Render the configuration as a TOML document
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.log_level must not be empty".to_string(),
            ));
        }

        if self.llm.provider != "ollama" {
            return Err(ConfigError::ValidationError(format!(
                "Unknown llm.provider '{}'. Supported: ollama",
                self.llm.provider
            )));
        }
        validate_url("llm.base_url", &self.llm.base_url)?;
        validate_timeout("llm.timeout_secs", self.llm.timeout_secs)?;

        // RAG chunking
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k must be greater than 0".to_string(),
            ));
        }

        validate_timeout(
            "orchestration.request_timeout_secs",
            self.orchestration.request_timeout_secs,
        )?;

        // Documentation always runs first, so it cannot be switched off
        let docs = &self.agents.documentation;
        if !docs.enabled {
            return Err(ConfigError::ValidationError(
                "agents.documentation cannot be disabled".to_string(),
            ));
        }
        validate_timeout("agents.documentation.timeout_secs", docs.timeout_secs)?;

        let web = &self.agents.web;
        validate_timeout("agents.web.timeout_secs", web.timeout_secs)?;
        validate_triggers("agents.web.triggers", &web.triggers)?;
        for source in &web.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "agents.web.sources entries need a name".to_string(),
                ));
            }
            validate_url(&format!("agents.web.sources '{}'", source.name), &source.url)?;
        }

        let telegram = &self.agents.telegram;
        validate_timeout("agents.telegram.timeout_secs", telegram.timeout_secs)?;
        validate_triggers("agents.telegram.triggers", &telegram.triggers)?;
        validate_url("agents.telegram.api_base", &telegram.api_base)?;
        if telegram.message_limit == 0 {
            return Err(ConfigError::ValidationError(
                "agents.telegram.message_limit must be greater than 0".to_string(),
            ));
        }
        for channel in &telegram.channels {
            if !channel.handle.starts_with('@') || channel.handle.len() < 2 {
                return Err(ConfigError::ValidationError(format!(
                    "Telegram channel handle '{}' must look like @name",
                    channel.handle
                )));
            }
        }

        Ok(())
    }
}

fn validate_timeout(field: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{} must be greater than 0",
            field
        )));
    }
    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    reqwest::Url::parse(url)
        .map_err(|e| ConfigError::ValidationError(format!("{}: invalid URL '{}': {}", field, url, e)))?;
    Ok(())
}

fn validate_triggers(field: &str, triggers: &[String]) -> Result<(), ConfigError> {
    if triggers.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "{} must not contain empty keywords",
            field
        )));
    }
    Ok(())
}
