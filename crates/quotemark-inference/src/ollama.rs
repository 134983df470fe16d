//! Ollama inference backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use quotemark_core::logging::{component, subsystem};
use quotemark_core::{Error, GenerationBackend, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = quotemark_core::defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = quotemark_core::defaults::GEN_MODEL;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = quotemark_core::defaults::GEN_TIMEOUT_SECS;

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            GEN_TIMEOUT_SECS,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(base_url: String, gen_model: String, gen_timeout_secs: u64) -> Result<Self> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Ollama base_url must start with http:// or https://, got: {}",
                base_url
            )));
        }
        if gen_model.is_empty() {
            return Err(Error::Config(
                "Ollama generation model cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing Ollama backend: url={}, gen={}, timeout={}s",
            base_url, gen_model, gen_timeout_secs
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gen_model,
            gen_timeout_secs,
        })
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OLLAMA_BASE` | `http://127.0.0.1:11434` |
    /// | `OLLAMA_GEN_MODEL` | `qwen3:8b` |
    /// | `QUOTEMARK_GEN_TIMEOUT_SECS` | `120` |
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let timeout = std::env::var("QUOTEMARK_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GEN_TIMEOUT_SECS);

        Self::with_config(base_url, gen_model, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the generation model to use.
    pub fn set_gen_model(&mut self, model_name: String) {
        info!(
            "Switching generation model from {} to {}",
            self.gen_model, model_name
        );
        self.gen_model = model_name;
    }

    /// Internal generation method shared by all generate variants.
    ///
    /// Uses `/api/chat`, which keeps reasoning output of thinking models out
    /// of the message content.
    async fn generate_internal(
        &self,
        system: &str,
        prompt: &str,
        format: Option<serde_json::Value>,
    ) -> Result<String> {
        let start = Instant::now();

        debug!(
            structured = format.is_some(),
            "Starting generation via chat API"
        );

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let think = if format.is_some() { Some(false) } else { None };
        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            format,
            think,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(Duration::from_secs(self.gen_timeout_secs))
                } else {
                    Error::Inference(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Output constraint: a JSON schema object for structured generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    /// Disable thinking for models that support it.
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, prompt), fields(subsystem = subsystem::INFERENCE, component = component::OLLAMA, op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_internal("", prompt, None).await
    }

    #[instrument(skip(self, system, prompt, schema), fields(subsystem = subsystem::INFERENCE, component = component::OLLAMA, op = "generate_structured", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String> {
        self.generate_internal(system, prompt, Some(schema.clone()))
            .await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}
