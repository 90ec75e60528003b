//! Provider router — selects the correct generation provider based on config.

use std::sync::Arc;

use reflexion_config::GenerationConfig;
use reflexion_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
///
/// A missing API key is not an error here; the provider reports
/// `NotConfigured` on first use so `doctor` and the health endpoint still work.
pub fn build_from_config(config: &GenerationConfig) -> Arc<dyn Provider> {
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    let api_key = match (&config.api_key, config.provider.as_str()) {
        (Some(key), _) => key.clone(),
        // Ollama doesn't need a real key
        (None, "ollama") => "ollama".into(),
        (None, _) => String::new(),
    };

    tracing::debug!(provider = %config.provider, base_url = %base_url, "Building provider");

    Arc::new(OpenAiCompatProvider::with_timeout(
        &config.provider,
        base_url,
        api_key,
        config.timeout(),
    ))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "gemini" | "google" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("gemini").contains("generativelanguage"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = GenerationConfig::default();
        let provider = build_from_config(&config);
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn build_respects_provider_override() {
        let config = GenerationConfig {
            provider: "ollama".into(),
            api_url: Some("http://gpu-box:11434/v1".into()),
            ..Default::default()
        };
        let provider = build_from_config(&config);
        assert_eq!(provider.name(), "ollama");
    }
}
