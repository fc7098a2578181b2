use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default display format for message timestamps (en-US, 2-digit hour and minute).
pub const DEFAULT_TIME_FORMAT: &str = "%I:%M %p";

// =============================================================================
// Enums
// =============================================================================

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Typed or transcribed input from the human.
    User,
    /// Reply from the assistant service, or a local placeholder standing in for one.
    Assistant,
}

impl Role {
    /// Short speaker label used when rendering a conversation.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Lifecycle state of a conversation session.
///
/// `Error` is transient: a failed exchange passes through it on the way
/// back to `Idle` within the same settle step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingResponse,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::AwaitingResponse => write!(f, "AwaitingResponse"),
            SessionState::Error => write!(f, "Error"),
        }
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque, client-generated thread identifier.
///
/// Backed by a random UUID so ids are never reused within or across sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(Uuid);

impl ThreadId {
    /// Generate a fresh thread id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex characters, enough to tell threads apart on screen.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ThreadId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ThreadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Message
// =============================================================================

/// A single conversation message. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    /// Creation time formatted for display (hour:minute).
    timestamp: String,
    created_at: DateTime<Local>,
}

impl Message {
    /// Create a message stamped with the given creation time.
    pub fn new(
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Local>,
        time_format: &str,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: format_display_time(&created_at, time_format),
            created_at,
        }
    }

    /// Create a user message stamped with the current wall-clock time.
    pub fn user(content: impl Into<String>, time_format: &str) -> Self {
        Self::new(Role::User, content, Local::now(), time_format)
    }

    /// Create an assistant message stamped with the current wall-clock time.
    pub fn assistant(content: impl Into<String>, time_format: &str) -> Self {
        Self::new(Role::Assistant, content, Local::now(), time_format)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

/// Format a timestamp for display using a `strftime` pattern.
///
/// An empty pattern falls back to [`DEFAULT_TIME_FORMAT`].
pub fn format_display_time(at: &DateTime<Local>, time_format: &str) -> String {
    let pattern = if time_format.trim().is_empty() {
        DEFAULT_TIME_FORMAT
    } else {
        time_format
    };
    at.format(pattern).to_string()
}

// =============================================================================
// Tests
// =============================================================================
