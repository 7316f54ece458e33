use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionError, CompletionService};
use crate::error::{ConfigError, CoreError};
use crate::storage::CompletionConfig;

/// Keyring entry holding the completion API key.
pub const API_KEY_ENTRY: &str = "completion_api_key";
/// Environment variable checked before the keyring.
pub const API_KEY_ENV: &str = "PHONEJAIL_API_KEY";

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "phonejail";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat completions endpoint.
///
/// The prompt is sent as a single system message.
pub struct OpenAiCompletion {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletion")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompletion {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_timeout(endpoint, api_key, model, Duration::from_secs(30))
    }

    fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a client from config, resolving the API key from the
    /// environment and then the OS keyring.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingKey` when no key is stored anywhere.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CoreError> {
        let api_key = resolve_api_key()?;
        Ok(Self::with_timeout(
            config.base_url.clone(),
            api_key,
            config.model.clone(),
            config.request_timeout(),
        ))
    }

    /// Store the API key in the OS keyring.
    pub fn store_api_key(api_key: &str) -> Result<(), CoreError> {
        keyring_store::set(API_KEY_ENTRY, api_key).map_err(keyring_error)?;
        Ok(())
    }

    pub fn forget_api_key() -> Result<(), CoreError> {
        keyring_store::delete(API_KEY_ENTRY).map_err(keyring_error)?;
        Ok(())
    }
}

fn keyring_error(e: keyring::Error) -> ConfigError {
    ConfigError::InvalidValue {
        key: API_KEY_ENTRY.to_string(),
        message: e.to_string(),
    }
}

fn resolve_api_key() -> Result<String, ConfigError> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }
    match keyring_store::get(API_KEY_ENTRY).map_err(keyring_error)? {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingKey(API_KEY_ENTRY.to_string())),
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "system",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };
        debug!(endpoint = %self.endpoint, model = %self.model, "requesting completion");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(CompletionError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(CompletionError::RateLimited),
            other => return Err(CompletionError::Network(format!("HTTP {other}"))),
        }

        let text = resp
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("no choices".into()))
    }
}
