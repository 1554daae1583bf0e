use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "GAPFINDER_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable overriding the analysis model
const ENV_ANALYSIS_MODEL: &str = "ANALYSIS_MODEL";

/// Environment variable overriding the arXiv endpoint
const ENV_ARXIV_BASE_URL: &str = "ARXIV_BASE_URL";

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

/// Model provider settings, including the retry policy and the rate-limit gate size
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Per-attempt timeout
    pub timeout_secs: u64,
    /// Total attempts per prompt, first call included
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Simultaneous in-flight provider calls across all requests
    pub max_concurrent_requests: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 2000,
            timeout_secs: 60,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
            max_concurrent_requests: 4,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Topic-mode settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub default_max_papers: usize,
    pub max_papers_limit: usize,
    /// Per-request fan-out width
    pub concurrency: usize,
    /// Deadline for fetch plus every per-paper analysis
    pub deadline_secs: u64,
    /// Token Jaccard threshold used when grouping gaps across papers
    pub similarity_threshold: f64,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            default_max_papers: 10,
            max_papers_limit: 50,
            concurrency: 4,
            deadline_secs: 300,
            similarity_threshold: 0.6,
        }
    }
}

impl TopicConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// arXiv paper source settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: "http://export.arxiv.org/api/query".to_string(),
            timeout_secs: 30,
        }
    }
}

/// PDF upload settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub max_file_size: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub topic: TopicConfig,
    #[serde(default)]
    pub arxiv: ArxivConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
}

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub topic: TopicConfig,
    pub arxiv: ArxivConfig,
    pub pdf: PdfConfig,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Self {
            server: file.server,
            llm: file.llm,
            topic: file.topic,
            arxiv: file.arxiv,
            pdf: file.pdf,
        }
    }
}

impl Config {
    /// Load configuration from the config file, then apply environment overrides
    pub fn from_env() -> Self {
        let config_path = std::env::var(ENV_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config: Config = Self::load_config_file(&config_path)
            .unwrap_or_default()
            .into();

        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(model) = std::env::var(ENV_ANALYSIS_MODEL) {
            config.llm.model = model;
        }
        if let Ok(base_url) = std::env::var(ENV_ARXIV_BASE_URL) {
            config.arxiv.base_url = base_url;
        }

        config
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(ConfigFile::default());
                }

                match Self::parse_config(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    fn parse_config(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8001");
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.llm.timeout(), Duration::from_secs(60));
        assert_eq!(config.topic.default_max_papers, 10);
        assert_eq!(config.topic.max_papers_limit, 50);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
server:
  port: 9000
llm:
  model: gpt-4o
  max_attempts: 5
topic:
  similarity_threshold: 1.0
"#;
        let config: Config = Config::parse_config(yaml).unwrap().into();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_attempts, 5);
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.topic.similarity_threshold, 1.0);
        assert_eq!(config.topic.concurrency, 4);
        assert_eq!(config.pdf.max_file_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(Config::parse_config("llm: [not, a, map]").is_err());
    }
}
