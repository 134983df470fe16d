//! Grounding protocol adapter.
//!
//! Turns user questions into generator requests and generator replies into
//! history entries. Owns the conversation history and the request id
//! counter; decides whether a reply is current, stale or failed. Visual side
//! effects are left to the caller, which receives the quote to highlight.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use quotemark_core::defaults::GROUNDING_FAILED_MESSAGE;
use quotemark_core::logging::{component, subsystem};
use quotemark_core::{ChatMessage, Error, GenerationBackend, GroundedAnswer, RequestId, Result};
use quotemark_inference::grounding::request_grounded_answer;

use crate::config::StalePolicy;
use crate::history::ConversationHistory;

/// An issued grounding request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundingRequest {
    pub id: RequestId,
    pub question: String,
    /// History index of the user message.
    pub history_index: usize,
}

/// What happened to a generator reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Current reply with a valid answer. `quote` is the passage to
    /// highlight, if any.
    Grounded {
        history_index: usize,
        quote: Option<String>,
    },
    /// Current reply that failed; an explanatory message was appended.
    Failed { history_index: usize },
    /// A newer request was issued after this one.
    Stale {
        latest: RequestId,
        /// Set when the stale answer was still appended to history.
        history_index: Option<usize>,
    },
}

impl ReplyOutcome {
    pub fn history_index(&self) -> Option<usize> {
        match self {
            ReplyOutcome::Grounded { history_index, .. }
            | ReplyOutcome::Failed { history_index } => Some(*history_index),
            ReplyOutcome::Stale { history_index, .. } => *history_index,
        }
    }
}

pub struct GroundingAdapter {
    history: ConversationHistory,
    policy: StalePolicy,
    /// Last id handed out; ids start at 1.
    latest: RequestId,
    /// Replies for ids below this are stale regardless of `latest`.
    accept_from: RequestId,
}

impl GroundingAdapter {
    pub fn new(policy: StalePolicy) -> Self {
        Self {
            history: ConversationHistory::new(),
            policy,
            latest: 0,
            accept_from: 1,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn latest_request_id(&self) -> RequestId {
        self.latest
    }

    /// Record the user's question and issue a request id for it.
    pub fn begin(&mut self, question: impl Into<String>) -> GroundingRequest {
        self.latest += 1;
        let question = question.into();
        let history_index = self
            .history
            .append(ChatMessage::user(question.clone(), self.latest));
        debug!(
            subsystem = subsystem::SESSION,
            component = component::ADAPTER,
            request_id = self.latest,
            "Issued grounding request"
        );
        GroundingRequest {
            id: self.latest,
            question,
            history_index,
        }
    }

    pub fn is_current(&self, request_id: RequestId) -> bool {
        request_id == self.latest && request_id >= self.accept_from
    }

    /// Make every request issued so far stale. Used when the document they
    /// asked about is replaced.
    pub fn invalidate_pending(&mut self) {
        self.accept_from = self.latest + 1;
    }

    /// Handle the generator's reply for `request_id`.
    pub fn complete(
        &mut self,
        request_id: RequestId,
        result: Result<GroundedAnswer>,
    ) -> ReplyOutcome {
        if !self.is_current(request_id) {
            let history_index = match (self.policy, result) {
                (StalePolicy::Append, Ok(answer)) => Some(self.history.append(ChatMessage::model(
                    answer.answer,
                    Some(answer.quote),
                    Some(request_id),
                ))),
                _ => None,
            };
            info!(
                subsystem = subsystem::SESSION,
                component = component::ADAPTER,
                request_id,
                latest_request_id = self.latest,
                appended = history_index.is_some(),
                "Stale generator response"
            );
            return ReplyOutcome::Stale {
                latest: self.latest,
                history_index,
            };
        }

        match result {
            Ok(answer) => {
                let quote = answer.quote().map(str::to_string);
                let history_index = self.history.append(ChatMessage::model(
                    answer.answer,
                    Some(answer.quote),
                    Some(request_id),
                ));
                ReplyOutcome::Grounded {
                    history_index,
                    quote,
                }
            }
            Err(e) => {
                warn!(
                    subsystem = subsystem::SESSION,
                    component = component::ADAPTER,
                    request_id,
                    error = %e,
                    "Grounding request failed"
                );
                let history_index = self.history.append(ChatMessage::model(
                    failure_message(&e),
                    None,
                    Some(request_id),
                ));
                ReplyOutcome::Failed { history_index }
            }
        }
    }
}

/// Text of the model message recorded for a failed request.
pub fn failure_message(error: &Error) -> String {
    format!("{GROUNDING_FAILED_MESSAGE} ({error})")
}

/// Run one grounding request with a deadline.
pub async fn fetch_answer(
    backend: &dyn GenerationBackend,
    question: &str,
    document_text: &str,
    timeout: Duration,
) -> Result<GroundedAnswer> {
    tokio::time::timeout(
        timeout,
        request_grounded_answer(backend, question, document_text),
    )
    .await
    .map_err(|_| Error::Timeout(timeout))?
}
