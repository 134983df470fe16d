//! Error types for quotemark.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using quotemark's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quotemark operations.
///
/// "Quote not found" is never an error; absence is reported as `None` by the
/// locator and the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Page number outside the loaded document
    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    /// Document could not be loaded; the session has no usable document
    #[error("Document load failed: {0}")]
    DocumentLoad(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Generator output did not conform to the declared schema
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Operation exceeded its deadline
    #[error("Timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session event loop is no longer running
    #[error("Session closed")]
    SessionClosed,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("page 0".to_string());
        assert_eq!(err.to_string(), "Invalid input: page 0");
    }

    #[test]
    fn test_error_display_page_out_of_range() {
        let err = Error::PageOutOfRange {
            page: 7,
            page_count: 3,
        };
        assert_eq!(
            err.to_string(),
            "Page 7 out of range (document has 3 pages)"
        );
    }

    #[test]
    fn test_error_display_document_load() {
        let err = Error::DocumentLoad("empty file".to_string());
        assert_eq!(err.to_string(), "Document load failed: empty file");
    }

    #[test]
    fn test_error_display_malformed_response() {
        let err = Error::MalformedResponse("missing field `quote`".to_string());
        assert_eq!(err.to_string(), "Malformed response: missing field `quote`");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = Error::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Timed out after 30000 ms");
    }

    #[test]
    fn test_error_display_sub_second_timeout() {
        let err = Error::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Timed out after 250 ms");
    }

    #[test]
    fn test_error_display_session_closed() {
        assert_eq!(Error::SessionClosed.to_string(), "Session closed");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
