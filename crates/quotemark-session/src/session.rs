//! Session event loop.
//!
//! A [`Session`] owns the fragment store, the highlight orchestrator and
//! the grounding adapter, and runs as a single task. Everything that
//! suspends (generator calls, scroll-settle timers) runs in spawned tasks
//! that post their result back as a message, so domain state is only ever
//! touched from the loop and needs no locks.
//!
//! Every document load gets a fresh [`LoadId`]. Pages and failure reports
//! tagged with an older id are refused, so a slow load that was replaced
//! cannot write into or discard its successor.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use quotemark_core::defaults::COMMAND_CHANNEL_CAPACITY;
use quotemark_core::events::EventEnvelope;
use quotemark_core::logging::{component, subsystem};
use quotemark_core::{
    ChatMessage, DocumentSource, Error, EventBus, ExtractedFragment, GenerationBackend,
    GroundedAnswer, Location, PageNumber, RequestId, Result, Role, SessionEvent, VisualLayer,
};
use quotemark_locate::FragmentStore;

use crate::adapter::{fetch_answer, GroundingAdapter, ReplyOutcome};
use crate::config::SessionConfig;
use crate::orchestrator::{HighlightOrchestrator, HighlightState, SettleOutcome, SettleTicket};

/// Identifies one document load; ids start at 1.
pub type LoadId = u64;

/// Point-in-time view of a session, for display surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub page_count: PageNumber,
    pub indexed_pages: Vec<PageNumber>,
    pub history: Vec<ChatMessage>,
    pub highlight: HighlightState,
    pub latest_request_id: RequestId,
    pub load_id: LoadId,
}

enum SessionMessage {
    LoadDocument {
        page_count: PageNumber,
        respond_to: oneshot::Sender<LoadId>,
    },
    AbandonDocument {
        load: LoadId,
        reason: String,
    },
    IndexPage {
        /// `None` targets whatever document is current.
        load: Option<LoadId>,
        page: PageNumber,
        fragments: Vec<ExtractedFragment>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    InvalidatePage {
        page: PageNumber,
        respond_to: oneshot::Sender<Result<bool>>,
    },
    Ask {
        question: String,
        respond_to: oneshot::Sender<RequestId>,
    },
    ShowQuote {
        quote: String,
        respond_to: oneshot::Sender<Option<Location>>,
    },
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
    Reply {
        request_id: RequestId,
        result: Result<GroundedAnswer>,
    },
    Settled {
        ticket: SettleTicket,
    },
    Shutdown,
}

impl SessionMessage {
    fn name(&self) -> &'static str {
        match self {
            SessionMessage::LoadDocument { .. } => "load_document",
            SessionMessage::AbandonDocument { .. } => "abandon_document",
            SessionMessage::IndexPage { .. } => "index_page",
            SessionMessage::InvalidatePage { .. } => "invalidate_page",
            SessionMessage::Ask { .. } => "ask",
            SessionMessage::ShowQuote { .. } => "show_quote",
            SessionMessage::Snapshot { .. } => "snapshot",
            SessionMessage::Reply { .. } => "reply",
            SessionMessage::Settled { .. } => "settled",
            SessionMessage::Shutdown => "shutdown",
        }
    }
}

/// Single-task owner of all grounding state.
pub struct Session<V> {
    store: FragmentStore,
    orchestrator: HighlightOrchestrator<V>,
    adapter: GroundingAdapter,
    backend: Arc<dyn GenerationBackend>,
    config: SessionConfig,
    events: Arc<EventBus>,
    load_id: LoadId,
    rx: mpsc::Receiver<SessionMessage>,
    // Weak so the loop ends once every handle is gone and no task is pending.
    tx: mpsc::WeakSender<SessionMessage>,
}

impl<V: VisualLayer + 'static> Session<V> {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        visual: V,
        config: SessionConfig,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let events = Arc::new(EventBus::new(config.event_capacity));
        let session = Self {
            store: FragmentStore::default(),
            orchestrator: HighlightOrchestrator::new(visual, events.clone()),
            adapter: GroundingAdapter::new(config.stale_policy),
            backend,
            config,
            events: events.clone(),
            load_id: 0,
            rx,
            tx: tx.downgrade(),
        };
        (session, SessionHandle { tx, events })
    }

    /// Create a session and run it on the current tokio runtime.
    pub fn spawn(
        backend: Arc<dyn GenerationBackend>,
        visual: V,
        config: SessionConfig,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (session, handle) = Self::new(backend, visual, config);
        (handle, tokio::spawn(session.run()))
    }

    /// Process messages until shutdown or until every sender is dropped.
    pub async fn run(mut self) {
        info!(
            subsystem = subsystem::SESSION,
            component = component::LOOP,
            model = self.backend.model_name(),
            stale_policy = %self.config.stale_policy,
            scroll_settle_ms = self.config.scroll_settle_ms,
            "Session started"
        );
        while let Some(message) = self.rx.recv().await {
            debug!(subsystem = subsystem::SESSION, op = message.name(), "Handling message");
            if self.handle(message).is_break() {
                break;
            }
        }
        info!(subsystem = subsystem::SESSION, component = component::LOOP, "Session stopped");
    }

    fn handle(&mut self, message: SessionMessage) -> ControlFlow<()> {
        match message {
            SessionMessage::LoadDocument {
                page_count,
                respond_to,
            } => {
                let _ = respond_to.send(self.load_document(page_count));
            }
            SessionMessage::AbandonDocument { load, reason } => {
                if load != self.load_id {
                    debug!(
                        subsystem = subsystem::SESSION,
                        load_id = load,
                        current_load_id = self.load_id,
                        error = %reason,
                        "Ignoring failure report of a replaced load"
                    );
                    return ControlFlow::Continue(());
                }
                error!(
                    subsystem = subsystem::SESSION,
                    load_id = load,
                    error = %reason,
                    "Document load failed; discarding partial index"
                );
                self.load_document(0);
            }
            SessionMessage::IndexPage {
                load,
                page,
                fragments,
                respond_to,
            } => {
                let result = match load {
                    Some(load) if load != self.load_id => {
                        debug!(
                            subsystem = subsystem::SESSION,
                            load_id = load,
                            current_load_id = self.load_id,
                            page,
                            "Refusing page of a replaced load"
                        );
                        Err(Error::DocumentLoad(format!(
                            "load {load} was replaced by load {}",
                            self.load_id
                        )))
                    }
                    _ => self.index_page(page, fragments),
                };
                let _ = respond_to.send(result);
            }
            SessionMessage::InvalidatePage { page, respond_to } => {
                let result = self.store.invalidate_page(page);
                if matches!(result, Ok(true)) {
                    self.orchestrator.page_invalidated(page);
                }
                let _ = respond_to.send(result);
            }
            SessionMessage::Ask {
                question,
                respond_to,
            } => {
                let _ = respond_to.send(self.ask(question));
            }
            SessionMessage::ShowQuote { quote, respond_to } => {
                let _ = respond_to.send(self.show_quote(&quote));
            }
            SessionMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
            SessionMessage::Reply { request_id, result } => self.reply(request_id, result),
            SessionMessage::Settled { ticket } => self.settled(ticket),
            SessionMessage::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn load_document(&mut self, page_count: PageNumber) -> LoadId {
        self.load_id += 1;
        self.store = FragmentStore::new(page_count);
        self.orchestrator.reset();
        self.adapter.invalidate_pending();
        self.events.emit(SessionEvent::DocumentLoaded { page_count });
        self.load_id
    }

    fn index_page(&mut self, page: PageNumber, fragments: Vec<ExtractedFragment>) -> Result<()> {
        let fragment_count = self.store.index_page(page, fragments)?.fragments.len();
        self.events.emit(SessionEvent::PageIndexed {
            page,
            fragment_count,
        });
        self.orchestrator.page_ready(page, &self.store);
        Ok(())
    }

    fn ask(&mut self, question: String) -> RequestId {
        let request = self.adapter.begin(question);
        self.emit_history(request.history_index);

        let Some(tx) = self.tx.upgrade() else {
            return request.id;
        };
        let backend = self.backend.clone();
        let document_text = self.store.document_text();
        let timeout = self.config.gen_timeout();
        let request_id = request.id;
        tokio::spawn(async move {
            let start = Instant::now();
            let result = fetch_answer(
                backend.as_ref(),
                &request.question,
                &document_text,
                timeout,
            )
            .await;
            debug!(
                subsystem = subsystem::SESSION,
                request_id,
                duration_ms = start.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "Generator call finished"
            );
            let _ = tx.send(SessionMessage::Reply { request_id, result }).await;
        });
        request_id
    }

    fn reply(&mut self, request_id: RequestId, result: Result<GroundedAnswer>) {
        let outcome = self.adapter.complete(request_id, result);
        if let Some(index) = outcome.history_index() {
            self.emit_history(index);
        }
        match outcome {
            ReplyOutcome::Grounded {
                quote: Some(quote), ..
            } => {
                self.show_quote(&quote);
            }
            ReplyOutcome::Stale {
                latest,
                history_index: None,
            } => {
                self.events.emit(SessionEvent::StaleResponseDropped {
                    request_id,
                    latest_request_id: latest,
                });
            }
            _ => {}
        }
    }

    fn show_quote(&mut self, quote: &str) -> Option<Location> {
        let ticket = self.orchestrator.new_quote(quote, &self.store)?;
        let location = ticket.location().clone();

        if self.config.scroll_settle_ms == 0 {
            self.settled(ticket);
        } else if let Some(tx) = self.tx.upgrade() {
            let delay = self.config.scroll_settle();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(SessionMessage::Settled { ticket }).await;
            });
        }
        Some(location)
    }

    fn settled(&mut self, ticket: SettleTicket) {
        let outcome = self.orchestrator.settle(&ticket, &self.store);
        if outcome == SettleOutcome::Deferred {
            debug!(
                subsystem = subsystem::SESSION,
                page = ticket.location().page,
                "Highlight deferred until page is ready"
            );
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            page_count: self.store.page_count(),
            indexed_pages: self.store.indexed_pages().map(|p| p.number).collect(),
            history: self.adapter.history().messages().to_vec(),
            highlight: self.orchestrator.state().clone(),
            latest_request_id: self.adapter.latest_request_id(),
            load_id: self.load_id,
        }
    }

    fn emit_history(&self, index: usize) {
        if let Some(message) = self.adapter.history().get(index) {
            self.events.emit(SessionEvent::HistoryAppended {
                index,
                message: message.clone(),
            });
        }
    }
}

/// Cloneable client for a running [`Session`].
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionMessage>,
    events: Arc<EventBus>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(make(respond_to))
            .await
            .map_err(|_| Error::SessionClosed)?;
        response.await.map_err(|_| Error::SessionClosed)
    }

    /// Replace the current document with an empty one of `page_count` pages.
    ///
    /// Clears the highlight; replies to questions about the previous
    /// document are treated as stale.
    pub async fn load_document(&self, page_count: PageNumber) -> Result<LoadId> {
        self.request(|respond_to| SessionMessage::LoadDocument {
            page_count,
            respond_to,
        })
        .await
    }

    /// Index a page of the current document.
    pub async fn index_page(
        &self,
        page: PageNumber,
        fragments: Vec<ExtractedFragment>,
    ) -> Result<()> {
        self.index_page_for(None, page, fragments).await
    }

    async fn index_page_for(
        &self,
        load: Option<LoadId>,
        page: PageNumber,
        fragments: Vec<ExtractedFragment>,
    ) -> Result<()> {
        self.request(|respond_to| SessionMessage::IndexPage {
            load,
            page,
            fragments,
            respond_to,
        })
        .await?
    }

    /// Mark a page as being re-rendered.
    pub async fn invalidate_page(&self, page: PageNumber) -> Result<bool> {
        self.request(|respond_to| SessionMessage::InvalidatePage { page, respond_to })
            .await?
    }

    /// Load every page of `source`, indexing pages as they finish extracting.
    ///
    /// If any page fails the whole document is discarded. A load that is
    /// replaced by a newer one before it finishes fails without touching
    /// the newer document.
    pub async fn load_source(&self, source: &dyn DocumentSource) -> Result<()> {
        let page_count = source.page_count();
        let load = self.load_document(page_count).await?;

        let mut pending: FuturesUnordered<_> = (1..=page_count)
            .map(|page| async move { (page, source.extract_page(page).await) })
            .collect();

        while let Some((page, result)) = pending.next().await {
            let indexed = match result {
                Ok(fragments) => self.index_page_for(Some(load), page, fragments).await,
                Err(e) => Err(e),
            };
            if let Err(e) = indexed {
                let reason = match e {
                    Error::DocumentLoad(msg) => msg,
                    other => format!("page {page}: {other}"),
                };
                let _ = self
                    .tx
                    .send(SessionMessage::AbandonDocument {
                        load,
                        reason: reason.clone(),
                    })
                    .await;
                return Err(Error::DocumentLoad(reason));
            }
        }
        Ok(())
    }

    /// Ask a question about the document. Returns the request id at once;
    /// the answer arrives as a `HistoryAppended` event.
    pub async fn ask(&self, question: impl Into<String>) -> Result<RequestId> {
        let question = question.into();
        self.request(|respond_to| SessionMessage::Ask {
            question,
            respond_to,
        })
        .await
    }

    /// Ask a question and wait for the model's message.
    pub async fn ask_and_wait(&self, question: impl Into<String>) -> Result<ChatMessage> {
        let mut events = self.subscribe();
        let request_id = self.ask(question).await?;
        loop {
            let envelope = match events.recv().await {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subsystem = subsystem::SESSION, skipped, "Event receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(Error::SessionClosed),
            };
            match envelope.payload {
                SessionEvent::HistoryAppended { message, .. }
                    if message.role == Role::Model && message.request_id == Some(request_id) =>
                {
                    return Ok(message);
                }
                SessionEvent::StaleResponseDropped {
                    request_id: dropped,
                    latest_request_id,
                } if dropped == request_id => {
                    return Err(Error::Inference(format!(
                        "Request {request_id} was superseded by request {latest_request_id}"
                    )));
                }
                _ => {}
            }
        }
    }

    /// Highlight `quote` directly, e.g. when the user selects a quoted
    /// passage in the history.
    pub async fn show_quote(&self, quote: impl Into<String>) -> Result<Option<Location>> {
        let quote = quote.into();
        self.request(|respond_to| SessionMessage::ShowQuote { quote, respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|respond_to| SessionMessage::Snapshot { respond_to })
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(SessionMessage::Shutdown)
            .await
            .map_err(|_| Error::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::RecordingVisualLayer;
    use quotemark_core::{VisualCommand, VisualHandle};
    use quotemark_inference::mock::MockGenerationBackend;

    fn fragments(texts: &[&str]) -> Vec<ExtractedFragment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ExtractedFragment::new(*t, VisualHandle::new(format!("f{i}"))))
            .collect()
    }

    fn spawn_session(
        backend: MockGenerationBackend,
        config: SessionConfig,
    ) -> (SessionHandle, RecordingVisualLayer) {
        let visual = RecordingVisualLayer::new();
        let (handle, _) = Session::spawn(Arc::new(backend), visual.clone(), config);
        (handle, visual)
    }

    #[tokio::test]
    async fn test_index_and_show_quote_without_settle_delay() {
        let (handle, visual) = spawn_session(
            MockGenerationBackend::new(),
            SessionConfig::default().with_scroll_settle_ms(0),
        );
        handle.load_document(1).await.unwrap();
        handle
            .index_page(1, fragments(&["Hello ", "world", ", foo"]))
            .await
            .unwrap();

        let location = handle.show_quote("world, foo").await.unwrap().unwrap();
        assert_eq!(location.fragment_range(), 1..=2);
        assert!(matches!(
            visual.commands().as_slice(),
            [
                VisualCommand::ScrollIntoView { page: 1 },
                VisualCommand::ApplyHighlight { first_fragment: 1, last_fragment: 2, .. }
            ]
        ));
    }

    #[tokio::test]
    async fn test_index_out_of_range_page_is_rejected() {
        let (handle, _) = spawn_session(MockGenerationBackend::new(), SessionConfig::default());
        handle.load_document(1).await.unwrap();

        let err = handle.index_page(2, fragments(&["x"])).await.unwrap_err();
        assert!(matches!(err, Error::PageOutOfRange { page: 2, page_count: 1 }));
    }

    #[tokio::test]
    async fn test_snapshot_reports_indexed_pages() {
        let (handle, _) = spawn_session(MockGenerationBackend::new(), SessionConfig::default());
        handle.load_document(3).await.unwrap();
        handle.index_page(3, fragments(&["c"])).await.unwrap();
        handle.index_page(1, fragments(&["a"])).await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.page_count, 3);
        assert_eq!(snapshot.indexed_pages, vec![1, 3]);
        assert_eq!(snapshot.highlight, HighlightState::Idle);
    }

    #[tokio::test]
    async fn test_closed_session_reports_session_closed() {
        let (handle, _) = spawn_session(MockGenerationBackend::new(), SessionConfig::default());
        handle.shutdown().await.unwrap();
        tokio::task::yield_now().await;

        let err = handle.snapshot().await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[tokio::test]
    async fn test_pages_of_replaced_load_are_refused() {
        let (handle, _) = spawn_session(MockGenerationBackend::new(), SessionConfig::default());
        let old = handle.load_document(2).await.unwrap();
        let new = handle.load_document(1).await.unwrap();
        assert!(new > old);

        let err = handle
            .index_page_for(Some(old), 1, fragments(&["old text"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentLoad(_)));
        handle
            .index_page_for(Some(new), 1, fragments(&["new text"]))
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.load_id, new);
        assert_eq!(snapshot.page_count, 1);
        assert_eq!(snapshot.indexed_pages, vec![1]);
        assert!(handle.show_quote("old text").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandon_of_replaced_load_is_ignored() {
        let (handle, _) = spawn_session(MockGenerationBackend::new(), SessionConfig::default());
        let old = handle.load_document(1).await.unwrap();
        handle.load_document(1).await.unwrap();
        handle.index_page(1, fragments(&["kept"])).await.unwrap();

        handle
            .tx
            .send(SessionMessage::AbandonDocument {
                load: old,
                reason: "late failure".to_string(),
            })
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.page_count, 1);
        assert_eq!(snapshot.indexed_pages, vec![1]);
    }
}
