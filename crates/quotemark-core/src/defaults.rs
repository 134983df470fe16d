//! Centralized default constants for quotemark.
//!
//! All crates and the CLI reference these constants instead of defining
//! their own magic numbers. Environment overrides are read by the
//! `from_env()` constructors of the config structs that use them.

// =============================================================================
// LOCATOR
// =============================================================================

/// The sliding buffer starts trimming once it holds more than this many
/// multiples of the quote length.
pub const TRIM_FACTOR: usize = 2;

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Delay between issuing a scroll command and applying the highlight.
pub const SCROLL_SETTLE_MS: u64 = 350;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model (Ollama).
pub const GEN_MODEL: &str = "qwen3:8b";

/// Timeout for a single grounding request (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// SESSION
// =============================================================================

/// Capacity of the session event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Capacity of the session command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Separator placed between pages when flattening a document for a prompt.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Model message appended when a grounding request fails.
pub const GROUNDING_FAILED_MESSAGE: &str =
    "Sorry, I could not answer that question about the document.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_factor_keeps_room_for_quote() {
        assert!(TRIM_FACTOR >= 2);
    }

    #[test]
    fn test_default_url_is_localhost() {
        assert!(OLLAMA_URL.starts_with("http://127.0.0.1"));
    }

    #[test]
    fn test_timeouts_non_zero() {
        assert!(GEN_TIMEOUT_SECS > 0);
        assert!(SCROLL_SETTLE_MS > 0);
    }
}
