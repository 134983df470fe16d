//! Session event types, envelope, and event bus for the conversation surface.
//!
//! The session loop emits every externally visible state change (history
//! growth, highlight transitions, dropped responses) on a single broadcast
//! channel. Display surfaces subscribe independently.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{ChatMessage, Location, PageNumber, RequestId};

// ============================================================================
// Event Envelope
// ============================================================================

/// Wrapper adding ordering metadata to a [`SessionEvent`].
///
/// `sequence` is strictly increasing per bus, so consumers can detect gaps
/// after a `Lagged` receive error.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    /// Namespaced event type (e.g., `"history.appended"`).
    pub event_type: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub payload: SessionEvent,
}

// ============================================================================
// Session Event (domain payloads)
// ============================================================================

/// State change published by a grounding session.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"HighlightApplied","location":{...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A new document replaced the previous one.
    DocumentLoaded { page_count: PageNumber },
    /// A page's fragments were (re-)indexed.
    PageIndexed {
        page: PageNumber,
        fragment_count: usize,
    },
    /// A message was appended to the conversation history.
    HistoryAppended { index: usize, message: ChatMessage },
    /// The previous highlight was removed.
    HighlightCleared,
    /// The view was scrolled to the page of a located quote.
    HighlightScrolled { location: Location },
    /// The highlight mark was applied.
    HighlightApplied { location: Location },
    /// The highlight waits for the page to become ready.
    HighlightDeferred { location: Location },
    /// The quote does not occur verbatim in any indexed page.
    QuoteNotFound { quote_len: usize },
    /// A superseded generator response was discarded.
    StaleResponseDropped {
        request_id: RequestId,
        latest_request_id: RequestId,
    },
}

impl SessionEvent {
    /// Returns the event type name (matches the serde tag).
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::DocumentLoaded { .. } => "DocumentLoaded",
            SessionEvent::PageIndexed { .. } => "PageIndexed",
            SessionEvent::HistoryAppended { .. } => "HistoryAppended",
            SessionEvent::HighlightCleared => "HighlightCleared",
            SessionEvent::HighlightScrolled { .. } => "HighlightScrolled",
            SessionEvent::HighlightApplied { .. } => "HighlightApplied",
            SessionEvent::HighlightDeferred { .. } => "HighlightDeferred",
            SessionEvent::QuoteNotFound { .. } => "QuoteNotFound",
            SessionEvent::StaleResponseDropped { .. } => "StaleResponseDropped",
        }
    }

    /// Returns the namespaced event type for the envelope.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            SessionEvent::DocumentLoaded { .. } => "document.loaded",
            SessionEvent::PageIndexed { .. } => "page.indexed",
            SessionEvent::HistoryAppended { .. } => "history.appended",
            SessionEvent::HighlightCleared => "highlight.cleared",
            SessionEvent::HighlightScrolled { .. } => "highlight.scrolled",
            SessionEvent::HighlightApplied { .. } => "highlight.applied",
            SessionEvent::HighlightDeferred { .. } => "highlight.deferred",
            SessionEvent::QuoteNotFound { .. } => "quote.not_found",
            SessionEvent::StaleResponseDropped { .. } => "response.stale_dropped",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus for distributing session events.
///
/// Slow receivers that fall behind get a `Lagged` error and miss events.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
    sequence: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            sequence: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Dropped silently without subscribers.
    pub fn emit(&self, event: SessionEvent) {
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            event_type: event.namespaced_event_type(),
            occurred_at: Utc::now(),
            payload: event,
        };
        tracing::debug!(
            event_type = envelope.event_type,
            sequence = envelope.sequence,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
