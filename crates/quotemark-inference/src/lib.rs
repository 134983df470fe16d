//! # quotemark-inference
//!
//! Generation backends and the structured grounding contract for quotemark.
//!
//! This crate provides:
//! - The grounding prompt, response schema, and fail-closed response parser
//! - Ollama implementation of [`GenerationBackend`] (default feature)
//! - Deterministic mock backend (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `mock`: Enable [`mock::MockGenerationBackend`] for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use quotemark_inference::{grounding, OllamaBackend};
//!
//! #[tokio::main]
//! async fn main() -> quotemark_core::Result<()> {
//!     let backend = OllamaBackend::from_env()?;
//!     let answer = grounding::request_grounded_answer(
//!         &backend,
//!         "Who pays rent?",
//!         "The tenant shall pay rent.",
//!     )
//!     .await?;
//!     println!("{} ({:?})", answer.answer, answer.quote());
//!     Ok(())
//! }
//! ```

pub mod grounding;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use quotemark_core::*;

pub use grounding::{grounding_prompt, grounding_schema, parse_grounded_answer};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;
