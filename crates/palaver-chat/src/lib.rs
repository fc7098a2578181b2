//! Conversation engine for Palaver.
//!
//! Keeps per-thread message logs, runs one exchange at a time against the
//! assistant backend, and hands replies to voice output.

pub mod backend;
pub mod error;
pub mod log;
pub mod session;
pub mod store;

pub use backend::{ChatBackend, HttpChatBackend, MockBackend};
pub use error::{BackendError, ChatError};
pub use log::MessageLog;
pub use session::{
    ConversationSession, PendingExchange, SubmitOutcome, ThreadSummary, CONNECTION_BANNER,
    PLACEHOLDER_REPLY,
};
pub use store::{Thread, ThreadStore};
