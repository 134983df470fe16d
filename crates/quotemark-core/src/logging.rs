//! Structured logging schema for quotemark.
//!
//! Every event carries a `subsystem` field and, where it helps, a
//! `component` field. Their values come from the constants below so that
//! filters such as `subsystem="session"` match across crates.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Session unusable (document load failed, loop died) |
//! | WARN  | Recoverable issue (malformed response, timeout, stale reply) |
//! | INFO  | Lifecycle events (document loaded, request issued, highlight set) |
//! | DEBUG | Decision points (deferral, quote not found, trimming) |
//! | TRACE | Per-fragment iteration inside the locator |

/// Values of the `subsystem` field.
pub mod subsystem {
    pub const LOCATE: &str = "locate";
    pub const INFERENCE: &str = "inference";
    pub const SESSION: &str = "session";
    pub const VISUAL: &str = "visual";

    pub const ALL: &[&str] = &[LOCATE, INFERENCE, SESSION, VISUAL];
}

/// Values of the `component` field.
pub mod component {
    pub const STORE: &str = "store";
    pub const LOCATOR: &str = "locator";
    pub const GROUNDING: &str = "grounding";
    pub const OLLAMA: &str = "ollama";
    pub const ORCHESTRATOR: &str = "orchestrator";
    pub const ADAPTER: &str = "adapter";
    pub const SOURCE: &str = "source";
    pub const LOOP: &str = "loop";

    pub const ALL: &[&str] = &[
        STORE,
        LOCATOR,
        GROUNDING,
        OLLAMA,
        ORCHESTRATOR,
        ADAPTER,
        SOURCE,
        LOOP,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_values_unique() {
        for values in [subsystem::ALL, component::ALL] {
            let unique: HashSet<_> = values.iter().collect();
            assert_eq!(unique.len(), values.len());
        }
    }

    #[test]
    fn test_values_are_snake_case() {
        for value in subsystem::ALL.iter().chain(component::ALL) {
            assert!(
                value.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{value} is not snake_case"
            );
        }
    }
}
