//! Mock generation backend for deterministic testing.
//!
//! Responses are chosen by matching rules against the prompt; each rule can
//! carry its own simulated latency so tests can make an earlier request
//! finish after a later one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quotemark_inference::mock::MockGenerationBackend;
//! use quotemark_core::GenerationBackend;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backend = MockGenerationBackend::new()
//!     .with_rule("rent", r#"{"answer":"Monthly.","quote":"each month"}"#)
//!     .with_fixed_response(r#"{"answer":"No idea.","quote":""}"#);
//!
//! let raw = backend.generate("When is rent due?").await.unwrap();
//! assert!(raw.contains("each month"));
//! # }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quotemark_core::{Error, GenerationBackend, Result};

/// Mock generation backend for testing.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockRule {
    contains: String,
    response: String,
    latency_ms: u64,
}

#[derive(Debug, Clone)]
struct MockConfig {
    rules: Vec<MockRule>,
    default_response: String,
    latency_ms: u64,
    failure_rate: f64,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_response: r#"{"answer":"Mock response","quote":""}"#.to_string(),
            latency_ms: 0,
            failure_rate: 0.0,
        }
    }
}

impl MockGenerationBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Response used when no rule matches.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Respond with `response` when the prompt contains `contains`.
    ///
    /// Rules are checked in insertion order.
    pub fn with_rule(self, contains: impl Into<String>, response: impl Into<String>) -> Self {
        self.with_delayed_rule(contains, response, 0)
    }

    /// Like [`with_rule`](Self::with_rule) with an extra per-rule latency.
    pub fn with_delayed_rule(
        mut self,
        contains: impl Into<String>,
        response: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Arc::make_mut(&mut self.config).rules.push(MockRule {
            contains: contains.into(),
            response: response.into(),
            latency_ms,
        });
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Get number of generation calls of any kind.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        if self.config.failure_rate > 0.0 {
            rand::thread_rng().gen::<f64>() < self.config.failure_rate
        } else {
            false
        }
    }

    async fn respond(&self, operation: &str, prompt: &str) -> Result<String> {
        self.log_call(operation, prompt);

        let rule = self
            .config
            .rules
            .iter()
            .find(|r| prompt.contains(&r.contains));
        let latency = self.config.latency_ms + rule.map_or(0, |r| r.latency_ms);
        if latency > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(latency)).await;
        }

        if self.should_fail() {
            return Err(Error::Inference("Simulated failure for testing".to_string()));
        }

        Ok(rule
            .map(|r| r.response.clone())
            .unwrap_or_else(|| self.config.default_response.clone()))
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.respond("generate", prompt).await
    }

    async fn generate_structured(
        &self,
        _system: &str,
        prompt: &str,
        _schema: &serde_json::Value,
    ) -> Result<String> {
        self.respond("generate_structured", prompt).await
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
