//! # quotemark-session
//!
//! Conversation session for the quotemark grounding engine.
//!
//! A [`Session`] ties the pieces together: pages are indexed into a
//! [`FragmentStore`](quotemark_locate::FragmentStore) as they render, user
//! questions go to a [`GenerationBackend`](quotemark_core::GenerationBackend)
//! with the full document text, and the verbatim quote in each answer is
//! located and highlighted through a [`VisualLayer`](quotemark_core::VisualLayer).
//!
//! ```no_run
//! use std::sync::Arc;
//! use quotemark_inference::OllamaBackend;
//! use quotemark_session::{PlainTextDocument, Session, SessionConfig, TracingVisualLayer};
//!
//! # async fn run() -> quotemark_core::Result<()> {
//! let backend = Arc::new(OllamaBackend::from_env()?);
//! let (handle, _task) = Session::spawn(backend, TracingVisualLayer, SessionConfig::from_env()?);
//!
//! let document = PlainTextDocument::open("lease.txt").await?;
//! handle.load_source(&document).await?;
//!
//! let answer = handle.ask_and_wait("Who pays for repairs?").await?;
//! println!("{}", answer.text);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod history;
pub mod orchestrator;
pub mod session;
pub mod source;
pub mod visual;

pub use adapter::{GroundingAdapter, GroundingRequest, ReplyOutcome};
pub use config::{SessionConfig, StalePolicy};
pub use history::ConversationHistory;
pub use orchestrator::{HighlightOrchestrator, HighlightState, SettleOutcome, SettleTicket};
pub use session::{LoadId, Session, SessionHandle, SessionSnapshot};
pub use source::PlainTextDocument;
pub use visual::{RecordingVisualLayer, TracingVisualLayer};
