//! Grounding request contract: prompt, response schema, and validation.
//!
//! The generator must answer with exactly `{"answer": string, "quote": string}`.
//! `quote` is either empty or copied verbatim from the document text. The
//! parser fails closed: anything that does not match the shape is rejected
//! as a whole, never partially used.

use std::time::Instant;

use tracing::{debug, warn};

use quotemark_core::logging::{component, subsystem};
use quotemark_core::{Error, GenerationBackend, GroundedAnswer, Result};

/// System instructions sent with every grounding request.
pub const GROUNDING_SYSTEM_PROMPT: &str = "\
You answer questions about the document provided by the user.
Respond with a JSON object with two string fields:
- \"answer\": your answer to the question.
- \"quote\": the shortest passage from the document that supports the answer, \
copied character for character (same spelling, case, punctuation and spacing). \
Never paraphrase the quote. Use an empty string if no passage supports the answer.";

/// Build the user prompt for a question about `document_text`.
pub fn grounding_prompt(question: &str, document_text: &str) -> String {
    format!("<document>\n{document_text}\n</document>\n\nQuestion: {question}")
}

/// JSON schema of the structured answer.
pub fn grounding_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "quote": { "type": "string" }
        },
        "required": ["answer", "quote"],
        "additionalProperties": false
    })
}

/// Validate a raw generator response against the grounding schema.
pub fn parse_grounded_answer(raw: &str) -> Result<GroundedAnswer> {
    serde_json::from_str::<GroundedAnswer>(raw.trim()).map_err(|e| {
        warn!(
            subsystem = subsystem::INFERENCE,
            component = component::GROUNDING,
            response_len = raw.len(),
            error = %e,
            "Generator response failed schema validation"
        );
        Error::MalformedResponse(e.to_string())
    })
}

/// Ask `backend` a question about `document_text` and validate the answer.
pub async fn request_grounded_answer(
    backend: &dyn GenerationBackend,
    question: &str,
    document_text: &str,
) -> Result<GroundedAnswer> {
    let start = Instant::now();
    let prompt = grounding_prompt(question, document_text);
    let raw = backend
        .generate_structured(GROUNDING_SYSTEM_PROMPT, &prompt, &grounding_schema())
        .await?;
    let answer = parse_grounded_answer(&raw)?;
    debug!(
        subsystem = subsystem::INFERENCE,
        component = component::GROUNDING,
        model = backend.model_name(),
        prompt_len = prompt.len(),
        quote_len = answer.quote.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Grounded answer received"
    );
    Ok(answer)
}
