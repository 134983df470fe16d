//! Data model for paginated documents, quote locations and conversations.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1-based page number.
pub type PageNumber = u32;

/// Monotonically increasing identifier of a grounding request.
pub type RequestId = u64;

// =============================================================================
// FRAGMENTS & PAGES
// =============================================================================

/// Opaque reference to the visual element that renders a fragment.
///
/// The core never interprets the value; it is passed back to the visual
/// layer verbatim when highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualHandle(pub String);

impl VisualHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisualHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fragment as produced by text extraction, before it is placed on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFragment {
    pub text: String,
    pub handle: VisualHandle,
}

impl ExtractedFragment {
    pub fn new(text: impl Into<String>, handle: VisualHandle) -> Self {
        Self {
            text: text.into(),
            handle,
        }
    }
}

/// Smallest unit of indexed page text.
///
/// `index` is the 0-based position within the page and never changes while
/// the page's fragment list is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub index: usize,
    pub text: String,
    pub handle: VisualHandle,
}

/// Whether a page's visual elements exist for highlight application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    #[default]
    NotReady,
    Ready,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// An indexed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: PageNumber,
    pub fragments: Vec<Fragment>,
    pub readiness: Readiness,
}

impl Page {
    /// Build a page from extracted fragments, assigning positional indices.
    pub fn from_extracted(number: PageNumber, extracted: Vec<ExtractedFragment>) -> Self {
        let fragments = extracted
            .into_iter()
            .enumerate()
            .map(|(index, f)| Fragment {
                index,
                text: f.text,
                handle: f.handle,
            })
            .collect();
        Self {
            number,
            fragments,
            readiness: Readiness::Ready,
        }
    }

    /// Concatenation of all fragment texts in order.
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }

    /// Total byte length of the page text.
    pub fn text_len(&self) -> usize {
        self.fragments.iter().map(|f| f.text.len()).sum()
    }
}

// =============================================================================
// LOCATION
// =============================================================================

/// Where a quote was found: one page and an inclusive fragment range.
///
/// `start_offset` is the byte offset of the quote inside the first fragment;
/// `end_offset` is the exclusive byte offset where it ends inside the last
/// fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub page: PageNumber,
    pub first_fragment: usize,
    pub last_fragment: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Location {
    pub fn fragment_range(&self) -> RangeInclusive<usize> {
        self.first_fragment..=self.last_fragment
    }

    pub fn fragment_count(&self) -> usize {
        self.last_fragment - self.first_fragment + 1
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} fragments {}..={}",
            self.page, self.first_fragment, self.last_fragment
        )
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    /// Verbatim document excerpt backing the message. Absent, never empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    /// Grounding request this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>, request_id: RequestId) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            quote: None,
            request_id: Some(request_id),
            created_at: Utc::now(),
        }
    }

    /// Model message; an empty quote is stored as absent.
    pub fn model(
        text: impl Into<String>,
        quote: Option<String>,
        request_id: Option<RequestId>,
    ) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            quote: quote.filter(|q| !q.is_empty()),
            request_id,
            created_at: Utc::now(),
        }
    }
}

/// Structured payload returned by the generator for a grounding request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroundedAnswer {
    pub answer: String,
    /// Verbatim excerpt of the document, or empty when nothing applies.
    pub quote: String,
}

impl GroundedAnswer {
    /// The quote, if one was supplied.
    pub fn quote(&self) -> Option<&str> {
        if self.quote.is_empty() {
            None
        } else {
            Some(&self.quote)
        }
    }
}
