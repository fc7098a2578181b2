//! Append-only message log for a single thread.

use palaver_core::types::Message;
use serde::{Deserialize, Serialize};

/// Ordered messages of one thread, in creation order.
///
/// There is no update or delete; a correction is a new message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Read-only ordered view for rendering.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Newest message first.
    pub fn recent_first(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::types::{Role, DEFAULT_TIME_FORMAT};

    fn log_of(contents: &[&str]) -> MessageLog {
        let mut log = MessageLog::new();
        for (i, text) in contents.iter().enumerate() {
            let msg = if i % 2 == 0 {
                Message::user(*text, DEFAULT_TIME_FORMAT)
            } else {
                Message::assistant(*text, DEFAULT_TIME_FORMAT)
            };
            log.append(msg);
        }
        log
    }

    #[test]
    fn test_new_log_is_empty() {
        let log = MessageLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(log.last().is_none());
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let log = log_of(&["one", "two", "three"]);
        let contents: Vec<&str> = log.snapshot().iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(log.snapshot()[1].role(), Role::Assistant);
    }

    #[test]
    fn test_last_and_recent_first() {
        let log = log_of(&["hello", "hi there", "how are you"]);
        assert_eq!(log.last().map(|m| m.content()), Some("how are you"));

        let newest_first: Vec<&str> = log.recent_first().map(|m| m.content()).collect();
        assert_eq!(newest_first, vec!["how are you", "hi there", "hello"]);
    }

    #[test]
    fn test_identical_messages_are_kept() {
        let log = log_of(&["same", "same", "same"]);
        assert_eq!(log.len(), 3);
    }
}
