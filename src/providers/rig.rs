//! rig-core backed language-model caller.
//!
//! Supports Anthropic, OpenAI, Cohere, Gemini, Perplexity, DeepSeek, xAI,
//! Groq, and any OpenAI-compatible API. Every call runs at temperature 0
//! under a wall-clock timeout.

use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::constants::ENV_API_KEY;
use crate::models::ProviderName;

use super::{LlmCaller, ProviderError};

/// Build an agent from a rig-core client and prompt it once.
macro_rules! prompt_once {
    ($client:expr, $model:expr, $system:expr, $user:expr, $max_tokens:expr, $label:expr) => {{
        let mut builder = $client
            .agent($model)
            .temperature(0.0)
            .max_tokens($max_tokens);
        if let Some(system) = $system {
            builder = builder.preamble(system);
        }
        builder
            .build()
            .prompt($user)
            .await
            .map_err(|e| ProviderError::from_message(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key)
            .map_err(|e| ProviderError::Api(format!("failed to create {} client: {e}", $label)))
    }};
}

/// Calls the configured provider through rig-core.
pub struct RigCaller {
    config: ProviderConfig,
    timeout_secs: u64,
}

impl RigCaller {
    pub fn new(config: ProviderConfig, timeout_secs: u64) -> Result<Self, ProviderError> {
        if config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {ENV_API_KEY} or {}.",
                config.name,
                config.name.api_key_env_var()
            )));
        }
        if config.name.requires_base_url() && config.base_url.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "{} provider requires base_url to be set",
                config.name
            )));
        }
        Ok(Self {
            config,
            timeout_secs,
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing API key".to_string()))
    }

    fn openai_client(
        &self,
        api_key: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder.build().map_err(|e| {
            ProviderError::Api(format!(
                "failed to create {} client: {e}",
                self.config.name.label()
            ))
        })?;
        Ok(client)
    }

    async fn call_rig(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: u64,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let model = self.config.model.as_str();
        let label = self.config.name.label();

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::Api(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
            ProviderName::OpenAI | ProviderName::OpenAICompatible => {
                let client = self.openai_client(api_key)?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, label)?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, label)?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, label)?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, label)?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, label)?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, label)?;
                prompt_once!(client, model, system_prompt, prompt, max_tokens, label)
            }
        }
    }
}

#[async_trait]
impl LlmCaller for RigCaller {
    async fn call(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: u64,
    ) -> Result<String, ProviderError> {
        debug!(
            provider = %self.config.name,
            model = %self.config.model,
            prompt_chars = prompt.len(),
            max_tokens,
            "calling model"
        );
        tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.call_rig(prompt, system_prompt, max_tokens),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.timeout_secs))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: ProviderName, key: Option<&str>, base_url: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            name,
            model: "some-model".to_string(),
            base_url: base_url.map(str::to_string),
            api_key: key.map(str::to_string),
        }
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        let err = RigCaller::new(config(ProviderName::Anthropic, None, None), 180)
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        let msg = err.to_string();
        assert!(msg.contains("DIFFSIEVE_API_KEY"), "got: {msg}");
        assert!(msg.contains("ANTHROPIC_API_KEY"), "got: {msg}");
    }

    #[test]
    fn compatible_provider_needs_base_url() {
        let err = RigCaller::new(config(ProviderName::OpenAICompatible, Some("k"), None), 180)
            .err()
            .unwrap();
        assert!(err.to_string().contains("base_url"));

        assert!(RigCaller::new(
            config(
                ProviderName::OpenAICompatible,
                Some("k"),
                Some("https://llm.internal.example/v1")
            ),
            180
        )
        .is_ok());
    }

    #[test]
    fn configured_provider_builds() {
        assert!(RigCaller::new(config(ProviderName::Gemini, Some("k"), None), 30).is_ok());
    }
}
