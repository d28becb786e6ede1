//! LLM client implementations
//!
//! OpenAI and Ollama backends behind the [`LlmClient`] trait, with
//! synchronous and streaming generation. Callers may override the model
//! per request; the configured model is the fallback.

use async_trait::async_trait;
use docchat_core::{ChatError, LlmClient, LlmConfig, LlmProvider, Result};
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// OpenAI API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: Message,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens: 2048,
            temperature: 0.1,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ChatError::Config("OpenAI API key required".to_string()))?;

        let mut client = Self::new(api_key.clone(), config.model.clone(), config.timeout_secs);
        client.max_tokens = config.max_tokens;
        client.temperature = config.temperature;
        if let Some(url) = &config.openai_base_url {
            client = client.with_base_url(url.clone());
        }
        Ok(client)
    }

    /// Set custom base URL (for Azure or compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request_body(&self, prompt: &str, model: Option<&str>, stream: bool) -> OpenAiRequest {
        OpenAiRequest {
            model: model.unwrap_or(&self.model).to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: stream.then_some(true),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let request = self.request_body(prompt, model, false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Generation(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Generation(format!("OpenAI error: {error_text}")));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("failed to parse response: {e}")))?;

        result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ChatError::Generation("no response generated".to_string()))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let request = self.request_body(prompt, model, true);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Generation(format!("stream request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Generation(format!(
                "OpenAI stream error: {error_text}"
            )));
        }

        let stream = response.bytes_stream();

        let mapped_stream = stream.filter_map(|result| async move {
            match result {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    // SSE format: data: {...}
                    let mut content = String::new();
                    for line in text.lines() {
                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                continue;
                            }
                            if let Ok(parsed) = serde_json::from_str::<StreamResponse>(data) {
                                if let Some(choice) = parsed.choices.first() {
                                    if let Some(c) = &choice.delta.content {
                                        content.push_str(c);
                                    }
                                }
                            }
                        }
                    }
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(content))
                    }
                }
                Err(e) => Some(Err(ChatError::Generation(format!("stream error: {e}")))),
            }
        });

        Ok(Box::pin(mapped_stream))
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OllamaResponse {
    response: String,
    done: bool,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: 2048,
            temperature: 0.1,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut client = Self::new(
            config.ollama_url.clone(),
            config.model.clone(),
            config.timeout_secs,
        );
        client.max_tokens = config.max_tokens;
        client.temperature = config.temperature;
        client
    }

    fn request_body(&self, prompt: &str, model: Option<&str>, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: model.unwrap_or(&self.model).to_string(),
            prompt: prompt.to_string(),
            options: OllamaOptions {
                num_predict: self.max_tokens,
                temperature: self.temperature,
            },
            stream: Some(stream),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let request = self.request_body(prompt, model, false);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Generation(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Generation(format!("Ollama error: {error_text}")));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("failed to parse Ollama response: {e}")))?;

        Ok(result.response)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let request = self.request_body(prompt, model, true);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Generation(format!("Ollama stream request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Generation(format!(
                "Ollama stream error: {error_text}"
            )));
        }

        let stream = response.bytes_stream();

        let mapped_stream = stream.filter_map(|result| async move {
            match result {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    // Ollama streams JSON objects, one per line
                    let mut content = String::new();
                    for line in text.lines() {
                        if let Ok(parsed) = serde_json::from_str::<OllamaResponse>(line) {
                            content.push_str(&parsed.response);
                        }
                    }
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(content))
                    }
                }
                Err(e) => Some(Err(ChatError::Generation(format!("stream error: {e}")))),
            }
        });

        Ok(Box::pin(mapped_stream))
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => {
            Ok(Box::new(OpenAiClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAiClient::new("test-key", "gpt-4o-mini", 30);
        assert_eq!(client.model, "gpt-4o-mini");
    }

    #[test]
    fn test_openai_model_override() {
        let client = OpenAiClient::new("test-key", "gpt-4o-mini", 30);
        let body = client.request_body("hi", Some("gpt-4o"), false);
        assert_eq!(body.model, "gpt-4o");
        let body = client.request_body("hi", None, false);
        assert_eq!(body.model, "gpt-4o-mini");
    }

    #[test]
    fn test_openai_request_carries_generation_settings() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAI,
            openai_api_key: Some("test-key".to_string()),
            max_tokens: 512,
            temperature: 0.7,
            ..Default::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap();
        let body = client.request_body("hi", None, false);
        assert_eq!(body.max_tokens, 512);
        assert_eq!(body.temperature, 0.7);
    }

    #[test]
    fn test_openai_base_url_from_config() {
        let config = LlmConfig {
            provider: LlmProvider::Azure,
            openai_api_key: Some("test-key".to_string()),
            openai_base_url: Some("https://azure.example.com/v1".to_string()),
            ..Default::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://azure.example.com/v1");
    }

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new("http://localhost:11434", "llama3", 30);
        assert_eq!(client.model, "llama3");
    }

    #[test]
    fn test_ollama_request_carries_generation_settings() {
        let config = LlmConfig {
            max_tokens: 256,
            temperature: 0.9,
            ..Default::default()
        };
        let client = OllamaClient::from_config(&config);
        let body = client.request_body("hi", None, true);
        assert_eq!(body.options.num_predict, 256);
        assert_eq!(body.options.temperature, 0.9);
        assert_eq!(body.stream, Some(true));
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            ..Default::default()
        };
        assert!(OpenAiClient::from_config(&config).is_err());
    }
}
