//! Error types for the conversation engine.

use palaver_core::error::PalaverError;
use palaver_core::types::ThreadId;

/// Errors from the conversation session and thread store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyInput,
    #[error("an exchange is already in flight")]
    ConcurrentSubmission,
    #[error("thread not found: {0}")]
    UnknownThread(ThreadId),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Failure of a single exchange with the assistant backend.
///
/// The session never surfaces these to the caller; they become a placeholder
/// reply plus a banner. They are kept distinct for logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("request timed out")]
    Timeout,
}

impl From<ChatError> for PalaverError {
    fn from(err: ChatError) -> Self {
        PalaverError::Chat(err.to_string())
    }
}
