use serde::{Deserialize, Serialize};

use crate::types::{Message, SessionState, ThreadId};

/// Events emitted by a conversation session after each state change.
///
/// Consumed by front ends that render the conversation and by the
/// event log for debugging. Delivered over a broadcast channel, so a slow
/// subscriber may miss events but never blocks the session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// A message was appended to a thread's log.
    MessageAppended {
        thread_id: ThreadId,
        message: Message,
    },

    /// The session moved between lifecycle states.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// A new, empty thread was created and made active.
    ThreadCreated { thread_id: ThreadId },

    /// The active thread changed.
    ThreadSwitched { from: ThreadId, to: ThreadId },

    /// A user-visible status banner was raised after a failed exchange.
    BannerRaised { text: String },

    /// The pending input draft changed (typed, transcribed or cleared).
    DraftChanged { text: String },
}

impl SessionEvent {
    /// Short machine-readable name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::MessageAppended { .. } => "message_appended",
            SessionEvent::StateChanged { .. } => "state_changed",
            SessionEvent::ThreadCreated { .. } => "thread_created",
            SessionEvent::ThreadSwitched { .. } => "thread_switched",
            SessionEvent::BannerRaised { .. } => "banner_raised",
            SessionEvent::DraftChanged { .. } => "draft_changed",
        }
    }
}
