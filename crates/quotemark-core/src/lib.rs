//! # quotemark-core
//!
//! Core types, traits, and abstractions for the quotemark grounding engine.
//!
//! This crate provides the foundational data structures (fragments, pages,
//! locations, chat messages) and the trait seams (generation backend, visual
//! layer, document source) that the other quotemark crates depend on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{EventBus, SessionEvent};
pub use models::*;
pub use traits::*;
