//! Trait seams between the grounding core and its external collaborators.

use std::ops::RangeInclusive;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{ExtractedFragment, PageNumber, VisualHandle};

// =============================================================================
// GENERATION
// =============================================================================

/// Backend for text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate free text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate output constrained to a JSON schema.
    ///
    /// Returns the raw response body; callers validate it against the
    /// schema's shape themselves.
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// DOCUMENT SOURCE
// =============================================================================

/// Producer of paginated, fragmented document text.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Number of pages; fixed once the document is loaded.
    fn page_count(&self) -> PageNumber;

    /// Ordered fragments of one page, once it has been rendered.
    async fn extract_page(&self, page: PageNumber) -> Result<Vec<ExtractedFragment>>;
}

// =============================================================================
// VISUAL LAYER
// =============================================================================

/// Command sink for scroll and highlight side effects.
///
/// The core never inspects the rendering outcome.
pub trait VisualLayer: Send {
    fn scroll_into_view(&mut self, page: PageNumber);

    fn apply_highlight(
        &mut self,
        page: PageNumber,
        fragments: RangeInclusive<usize>,
        handles: &[VisualHandle],
    );

    fn clear_highlight(&mut self);
}

/// A visual command as issued, for recording and replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualCommand {
    ScrollIntoView {
        page: PageNumber,
    },
    ApplyHighlight {
        page: PageNumber,
        first_fragment: usize,
        last_fragment: usize,
        handles: Vec<VisualHandle>,
    },
    ClearHighlight,
}
