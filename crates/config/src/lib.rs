//! Configuration loading, validation, and management for Reflexion.
//!
//! Loads configuration from `~/.reflexion/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.reflexion/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Evidence lookup settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Reflexion loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Provider name (gemini, openai, openrouter, ollama, groq, ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request HTTP timeout
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_generation_timeout() -> u64 {
    120
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// "tavily" or "stub" (offline, deterministic results)
    #[serde(default = "default_search_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Issue the queries of one tool call concurrently
    #[serde(default = "default_true")]
    pub concurrent: bool,
}

fn default_search_provider() -> String {
    "tavily".into()
}
fn default_max_results() -> usize {
    5
}
fn default_search_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
            concurrent: true,
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("max_results", &self.max_results)
            .field("timeout_secs", &self.timeout_secs)
            .field("concurrent", &self.concurrent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool-execution rounds before the loop is forced to stop
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Who the model should act as in its prompts
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Budget for one whole run (draft + all rounds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_iterations() -> usize {
    3
}
fn default_persona() -> String {
    "expert researcher".into()
}
fn default_request_timeout() -> u64 {
    300
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            persona: default_persona(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins; "*" allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.reflexion/config.toml).
    ///
    /// Environment overrides:
    /// - `REFLEXION_API_KEY`, then `GOOGLE_API_KEY`, then `OPENAI_API_KEY`
    ///   for the generation key (only when the file sets none)
    /// - `TAVILY_API_KEY` for the search key
    /// - `REFLEXION_PROVIDER`, `REFLEXION_MODEL`, `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.generation.api_key.is_none() {
            self.generation.api_key = var("REFLEXION_API_KEY")
                .or_else(|| var("GOOGLE_API_KEY"))
                .or_else(|| var("OPENAI_API_KEY"));
        }

        if self.search.api_key.is_none() {
            self.search.api_key = var("TAVILY_API_KEY");
        }

        if let Some(provider) = var("REFLEXION_PROVIDER") {
            self.generation.provider = provider;
        }

        if let Some(model) = var("REFLEXION_MODEL") {
            self.generation.model = model;
        }

        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reflexion")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generation.timeout_secs == 0 || self.search.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least one second".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.request_timeout_secs must be at least 1".into(),
            ));
        }

        if !(1..=10).contains(&self.search.max_results) {
            return Err(ConfigError::ValidationError(
                "search.max_results must be between 1 and 10".into(),
            ));
        }

        Ok(())
    }

    /// Credentials the configured backends need but do not have.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.generation.api_key.is_none() && self.generation.provider != "ollama" {
            missing.push("generation.api_key (REFLEXION_API_KEY / GOOGLE_API_KEY)");
        }
        if self.search.api_key.is_none() && self.search.provider == "tavily" {
            missing.push("search.api_key (TAVILY_API_KEY)");
        }
        missing
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for reflexion_core::Error {
    fn from(e: ConfigError) -> Self {
        reflexion_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.request_timeout_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.generation.provider, config.generation.provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
[agent]
max_iterations = 5

[search]
provider = "stub"
"#,
        )
        .unwrap();
        assert_eq!(parsed.agent.max_iterations, 5);
        assert_eq!(parsed.agent.persona, "expert researcher");
        assert_eq!(parsed.search.provider, "stub");
        assert_eq!(parsed.search.max_results, 5);
        assert!(parsed.search.concurrent);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_results_bounded() {
        let mut config = AppConfig::default();
        config.search.max_results = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().generation.provider, "gemini");
    }

    #[test]
    fn load_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = 9100\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, 9100);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("GOOGLE_API_KEY", "g-key"),
            ("TAVILY_API_KEY", "t-key"),
            ("REFLEXION_MODEL", "gpt-4o"),
            ("PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.generation.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.search.api_key.as_deref(), Some("t-key"));
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.gateway.port, 9000);
        assert!(config.missing_credentials().is_empty());
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.generation.api_key = Some("from-file".into());
        config.apply_env(|k| (k == "REFLEXION_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.generation.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn missing_credentials_reported() {
        let config = AppConfig::default();
        let missing = config.missing_credentials();
        assert_eq!(missing.len(), 2);

        let mut offline = AppConfig::default();
        offline.generation.provider = "ollama".into();
        offline.search.provider = "stub".into();
        assert!(offline.missing_credentials().is_empty());
    }

    #[test]
    fn debug_output_redacts_keys() {
        let mut config = AppConfig::default();
        config.generation.api_key = Some("super-secret".into());
        config.search.api_key = Some("also-secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("also-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("8000"));
    }
}
