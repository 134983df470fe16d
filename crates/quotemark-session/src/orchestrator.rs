//! Highlight and scroll orchestration.
//!
//! Owns the single active highlight. Each new quote clears the previous
//! highlight, locates the quote, scrolls to its page and hands back a
//! [`SettleTicket`]. Once the scroll has settled the caller presents the
//! ticket to [`HighlightOrchestrator::settle`], which applies the mark if the
//! page is ready or defers it until [`HighlightOrchestrator::page_ready`].
//!
//! Tickets carry a generation number; a newer quote or a [`reset`] bumps the
//! generation, so late tickets for superseded quotes are ignored.
//!
//! [`reset`]: HighlightOrchestrator::reset

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use quotemark_core::logging::{component, subsystem};
use quotemark_core::{EventBus, Location, PageNumber, SessionEvent, VisualLayer};
use quotemark_locate::{locate, FragmentStore};

/// Orchestrator state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HighlightState {
    #[default]
    Idle,
    /// A quote is being located.
    Scanning,
    /// A quote was located. `marked` is false until the highlight command
    /// has been issued, and again after the page was invalidated.
    Applied {
        location: Location,
        quote: String,
        marked: bool,
    },
}

impl HighlightState {
    pub fn location(&self) -> Option<&Location> {
        match self {
            HighlightState::Applied { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn is_marked(&self) -> bool {
        matches!(self, HighlightState::Applied { marked: true, .. })
    }
}

/// Permission to apply the highlight of one located quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleTicket {
    generation: u64,
    location: Location,
}

impl SettleTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

/// Result of [`HighlightOrchestrator::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Applied,
    /// Page not ready; the mark is applied when it becomes ready.
    Deferred,
    /// A newer quote or a reset superseded the ticket.
    Superseded,
}

/// Drives a [`VisualLayer`] so that at most one quote is highlighted.
pub struct HighlightOrchestrator<V> {
    visual: V,
    events: Arc<EventBus>,
    state: HighlightState,
    generation: u64,
    /// The settle delay for the current location has elapsed.
    settled: bool,
}

impl<V: VisualLayer> HighlightOrchestrator<V> {
    pub fn new(visual: V, events: Arc<EventBus>) -> Self {
        Self {
            visual,
            events,
            state: HighlightState::Idle,
            generation: 0,
            settled: false,
        }
    }

    pub fn state(&self) -> &HighlightState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn visual(&self) -> &V {
        &self.visual
    }

    /// Start highlighting `quote`, superseding whatever came before.
    ///
    /// Returns a ticket when the quote was located. The scroll command has
    /// already been issued at that point.
    pub fn new_quote(&mut self, quote: &str, store: &FragmentStore) -> Option<SettleTicket> {
        self.generation += 1;
        self.clear();
        self.state = HighlightState::Scanning;

        let Some(location) = locate(quote, store, store.page_count()) else {
            debug!(
                subsystem = subsystem::SESSION,
                component = component::ORCHESTRATOR,
                quote_len = quote.len(),
                "Quote not found in document"
            );
            self.state = HighlightState::Idle;
            self.events.emit(SessionEvent::QuoteNotFound {
                quote_len: quote.len(),
            });
            return None;
        };

        self.visual.scroll_into_view(location.page);
        self.state = HighlightState::Applied {
            location: location.clone(),
            quote: quote.to_string(),
            marked: false,
        };
        self.events.emit(SessionEvent::HighlightScrolled {
            location: location.clone(),
        });

        Some(SettleTicket {
            generation: self.generation,
            location,
        })
    }

    /// The scroll for `ticket` has settled; apply its highlight if possible.
    pub fn settle(&mut self, ticket: &SettleTicket, store: &FragmentStore) -> SettleOutcome {
        if ticket.generation != self.generation {
            debug!(
                subsystem = subsystem::SESSION,
                component = component::ORCHESTRATOR,
                ticket_generation = ticket.generation,
                generation = self.generation,
                "Ignoring superseded settle ticket"
            );
            return SettleOutcome::Superseded;
        }
        self.settled = true;

        if self.try_mark(store) {
            SettleOutcome::Applied
        } else {
            if let Some(location) = self.state.location() {
                self.events.emit(SessionEvent::HighlightDeferred {
                    location: location.clone(),
                });
            }
            SettleOutcome::Deferred
        }
    }

    /// `page` became ready; apply a highlight that was waiting for it.
    ///
    /// A re-rendered page may no longer hold the quote at the located
    /// fragments. The quote is then located again on that page, or the
    /// highlight is dropped and the state returns to `Idle`.
    ///
    /// Returns true if a highlight command was issued.
    pub fn page_ready(&mut self, page: PageNumber, store: &FragmentStore) -> bool {
        if !self.settled {
            return false;
        }
        let waiting = matches!(
            &self.state,
            HighlightState::Applied { location, marked: false, .. } if location.page == page
        );
        waiting && self.try_mark(store)
    }

    /// `page` is being re-rendered; its mark no longer exists visually.
    pub fn page_invalidated(&mut self, page: PageNumber) {
        if let HighlightState::Applied {
            location, marked, ..
        } = &mut self.state
        {
            if location.page == page {
                *marked = false;
            }
        }
    }

    /// Clear the highlight and return to `Idle`, invalidating any
    /// outstanding ticket.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.clear();
        self.state = HighlightState::Idle;
    }

    fn clear(&mut self) {
        if matches!(self.state, HighlightState::Applied { .. }) {
            self.visual.clear_highlight();
            self.events.emit(SessionEvent::HighlightCleared);
        }
        self.settled = false;
    }

    fn try_mark(&mut self, store: &FragmentStore) -> bool {
        let HighlightState::Applied {
            location,
            quote,
            marked,
        } = &mut self.state
        else {
            return false;
        };
        if *marked {
            return true;
        }
        if !store.readiness(location.page).is_ready() {
            return false;
        }
        if store.covered_text(location).as_deref() != Some(quote.as_str()) {
            let page = location.page;
            match locate(quote, store, store.page_count()).filter(|found| found.page == page) {
                Some(found) => {
                    debug!(
                        subsystem = subsystem::SESSION,
                        component = component::ORCHESTRATOR,
                        page,
                        first_fragment = found.first_fragment,
                        "Quote moved on re-rendered page"
                    );
                    *location = found;
                }
                None => {
                    warn!(
                        subsystem = subsystem::SESSION,
                        component = component::ORCHESTRATOR,
                        page,
                        "Quote no longer on re-rendered page, dropping highlight"
                    );
                    self.reset();
                    return false;
                }
            }
        }
        let Some(handles) = store.handles(location) else {
            warn!(
                subsystem = subsystem::SESSION,
                component = component::ORCHESTRATOR,
                page = location.page,
                "Located fragments no longer exist on re-rendered page"
            );
            return false;
        };

        self.visual
            .apply_highlight(location.page, location.fragment_range(), &handles);
        *marked = true;
        self.events.emit(SessionEvent::HighlightApplied {
            location: location.clone(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::RecordingVisualLayer;
    use quotemark_core::{ExtractedFragment, VisualCommand, VisualHandle};

    fn fragments(page: PageNumber, texts: &[&str]) -> Vec<ExtractedFragment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ExtractedFragment::new(*t, VisualHandle::new(format!("p{page}-f{i}"))))
            .collect()
    }

    fn store() -> FragmentStore {
        let mut store = FragmentStore::new(2);
        store
            .index_page(1, fragments(1, &["Hello ", "world", ", foo"]))
            .unwrap();
        store
            .index_page(2, fragments(2, &["The tenant ", "shall pay ", "rent."]))
            .unwrap();
        store
    }

    fn orchestrator() -> (HighlightOrchestrator<RecordingVisualLayer>, RecordingVisualLayer) {
        let visual = RecordingVisualLayer::new();
        let orch = HighlightOrchestrator::new(visual.clone(), Arc::new(EventBus::default()));
        (orch, visual)
    }

    #[test]
    fn test_found_quote_scrolls_then_marks_after_settle() {
        let store = store();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("world, foo", &store).unwrap();
        assert_eq!(visual.commands(), vec![VisualCommand::ScrollIntoView { page: 1 }]);
        assert!(!orch.state().is_marked());

        assert_eq!(orch.settle(&ticket, &store), SettleOutcome::Applied);
        assert!(orch.state().is_marked());
        assert_eq!(
            visual.commands().last().unwrap(),
            &VisualCommand::ApplyHighlight {
                page: 1,
                first_fragment: 1,
                last_fragment: 2,
                handles: vec![VisualHandle::new("p1-f1"), VisualHandle::new("p1-f2")],
            }
        );
    }

    #[test]
    fn test_not_found_issues_no_commands() {
        let store = store();
        let (mut orch, visual) = orchestrator();

        assert!(orch.new_quote("Quick Brown", &store).is_none());
        assert_eq!(orch.state(), &HighlightState::Idle);
        assert!(visual.commands().is_empty());
    }

    #[test]
    fn test_new_quote_clears_previous_highlight_first() {
        let store = store();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("Hello", &store).unwrap();
        orch.settle(&ticket, &store);
        visual.take();

        orch.new_quote("shall pay", &store).unwrap();
        assert_eq!(
            visual.commands(),
            vec![
                VisualCommand::ClearHighlight,
                VisualCommand::ScrollIntoView { page: 2 },
            ]
        );
    }

    #[test]
    fn test_not_found_after_highlight_leaves_nothing_marked() {
        let store = store();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("Hello", &store).unwrap();
        orch.settle(&ticket, &store);
        visual.take();

        assert!(orch.new_quote("absent", &store).is_none());
        assert_eq!(visual.commands(), vec![VisualCommand::ClearHighlight]);
        assert_eq!(orch.state(), &HighlightState::Idle);
    }

    #[test]
    fn test_second_quote_before_settle_wins() {
        let store = store();
        let (mut orch, visual) = orchestrator();

        let first = orch.new_quote("world", &store).unwrap();
        let second = orch.new_quote("rent.", &store).unwrap();

        assert_eq!(orch.settle(&first, &store), SettleOutcome::Superseded);
        assert_eq!(orch.settle(&second, &store), SettleOutcome::Applied);

        let highlights: Vec<_> = visual
            .commands()
            .into_iter()
            .filter(|c| matches!(c, VisualCommand::ApplyHighlight { .. }))
            .collect();
        assert_eq!(highlights.len(), 1);
        assert!(matches!(
            highlights[0],
            VisualCommand::ApplyHighlight { page: 2, first_fragment: 2, .. }
        ));
    }

    #[test]
    fn test_not_ready_page_defers_until_ready() {
        let mut store = store();
        store.invalidate_page(2).unwrap();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("tenant", &store).unwrap();
        assert_eq!(orch.settle(&ticket, &store), SettleOutcome::Deferred);
        assert!(!orch.state().is_marked());

        // A different page becoming ready does nothing.
        assert!(!orch.page_ready(1, &store));

        store
            .index_page(2, fragments(2, &["The tenant ", "shall pay ", "rent."]))
            .unwrap();
        assert!(orch.page_ready(2, &store));
        assert!(orch.state().is_marked());
        assert!(matches!(
            visual.commands().last(),
            Some(VisualCommand::ApplyHighlight { page: 2, .. })
        ));
    }

    #[test]
    fn test_page_ready_before_settle_waits_for_settle() {
        let store = store();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("tenant", &store).unwrap();
        assert!(!orch.page_ready(2, &store));
        assert_eq!(visual.commands().len(), 1);

        assert_eq!(orch.settle(&ticket, &store), SettleOutcome::Applied);
    }

    #[test]
    fn test_invalidated_page_is_remarked_when_ready_again() {
        let mut store = store();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("tenant", &store).unwrap();
        orch.settle(&ticket, &store);

        store.invalidate_page(2).unwrap();
        orch.page_invalidated(2);
        assert!(!orch.state().is_marked());

        store
            .index_page(2, fragments(2, &["The tenant ", "shall pay ", "rent."]))
            .unwrap();
        assert!(orch.page_ready(2, &store));

        let highlight_count = visual
            .commands()
            .iter()
            .filter(|c| matches!(c, VisualCommand::ApplyHighlight { .. }))
            .count();
        assert_eq!(highlight_count, 2);
    }

    #[test]
    fn test_reset_clears_and_invalidates_ticket() {
        let store = store();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("Hello", &store).unwrap();
        orch.reset();

        assert_eq!(orch.state(), &HighlightState::Idle);
        assert_eq!(orch.settle(&ticket, &store), SettleOutcome::Superseded);
        assert_eq!(visual.commands().last(), Some(&VisualCommand::ClearHighlight));
    }

    #[test]
    fn test_events_emitted_for_transitions() {
        let store = store();
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let mut orch = HighlightOrchestrator::new(RecordingVisualLayer::new(), events);

        let ticket = orch.new_quote("Hello", &store).unwrap();
        orch.settle(&ticket, &store);
        orch.new_quote("nowhere", &store);

        let types: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                "highlight.scrolled",
                "highlight.applied",
                "highlight.cleared",
                "quote.not_found",
            ]
        );
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(HighlightState::Idle).unwrap();
        assert_eq!(json["state"], "idle");
    }

    #[test]
    fn test_rerender_without_quote_drops_highlight() {
        let mut store = FragmentStore::new(1);
        store
            .index_page(1, fragments(1, &["alpha ", "needle ", "omega"]))
            .unwrap();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("needle", &store).unwrap();
        assert_eq!(orch.settle(&ticket, &store), SettleOutcome::Applied);

        store.invalidate_page(1).unwrap();
        orch.page_invalidated(1);
        store
            .index_page(1, fragments(1, &["totally ", "different ", "text"]))
            .unwrap();

        assert!(!orch.page_ready(1, &store));
        assert_eq!(orch.state(), &HighlightState::Idle);
        assert_eq!(visual.commands().last(), Some(&VisualCommand::ClearHighlight));
        let highlight_count = visual
            .commands()
            .iter()
            .filter(|c| matches!(c, VisualCommand::ApplyHighlight { .. }))
            .count();
        assert_eq!(highlight_count, 1);
    }

    #[test]
    fn test_rerender_with_shifted_quote_marks_new_fragments() {
        let mut store = FragmentStore::new(1);
        store
            .index_page(1, fragments(1, &["alpha ", "needle ", "omega"]))
            .unwrap();
        let (mut orch, visual) = orchestrator();

        let ticket = orch.new_quote("needle", &store).unwrap();
        orch.settle(&ticket, &store);

        store.invalidate_page(1).unwrap();
        orch.page_invalidated(1);
        store
            .index_page(1, fragments(1, &["new ", "alpha ", "needle ", "omega"]))
            .unwrap();

        assert!(orch.page_ready(1, &store));
        assert_eq!(orch.state().location().map(|l| l.first_fragment), Some(2));
        assert_eq!(
            visual.commands().last().unwrap(),
            &VisualCommand::ApplyHighlight {
                page: 1,
                first_fragment: 2,
                last_fragment: 2,
                handles: vec![VisualHandle::new("p1-f2")],
            }
        );
    }
}
