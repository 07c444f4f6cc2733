use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use subtext_annotation::AnnotationConfig;

/// Application configuration.
///
/// Loaded from `config/default.toml` (optional), an optional override file
/// named by `SUBTEXT_CONFIG`, and `SUBTEXT__`-prefixed environment variables
/// (`SUBTEXT__SERVER__PORT=8080`), later sources winning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pipeline: AnnotationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Oracle backend selection and provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Backend name: "remote_llm" or "lexicon".
    pub backend: String,
    /// Ordered provider fallback chain for the remote_llm backend.
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Directory of JSON lexicon files for the lexicon backend.
    #[serde(default)]
    pub lexicon_dir: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: "remote_llm".to_string(),
            providers: Vec::new(),
            timeout_secs: 600,
            lexicon_dir: None,
        }
    }
}

/// One LLM provider entry. `kind` selects the wire shape: "openai",
/// "anthropic", or "gemini".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: String,
    pub model: String,
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL; omitted means the in-process cache.
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false));
        if let Ok(path) = std::env::var("SUBTEXT_CONFIG") {
            builder = builder.add_source(File::with_name(&path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("SUBTEXT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
