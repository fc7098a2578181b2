//! In-memory thread store.
//!
//! Maps thread ids to their message logs and remembers the order in which
//! threads were first created, so listing is stable across calls.

use std::collections::HashMap;

use palaver_core::types::ThreadId;
use tracing::debug;

use crate::error::ChatError;
use crate::log::MessageLog;

/// A conversation thread and its log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thread {
    id: ThreadId,
    log: MessageLog,
}

impl Thread {
    pub fn new(id: ThreadId) -> Self {
        Self {
            id,
            log: MessageLog::new(),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }
}

/// Thread id to thread mapping with insertion order.
#[derive(Debug, Default)]
pub struct ThreadStore {
    threads: HashMap<ThreadId, Thread>,
    order: Vec<ThreadId>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the thread for `id`, creating an empty one if absent.
    pub fn ensure(&mut self, id: ThreadId) -> &Thread {
        if !self.threads.contains_key(&id) {
            debug!(thread_id = %id, "Creating thread");
            self.order.push(id);
        }
        self.threads.entry(id).or_insert_with(|| Thread::new(id))
    }

    /// Replace the stored log for `id` with `log`, inserting the thread if new.
    pub fn upsert(&mut self, id: ThreadId, log: MessageLog) {
        match self.threads.get_mut(&id) {
            Some(thread) => thread.log = log,
            None => {
                self.order.push(id);
                self.threads.insert(id, Thread { id, log });
            }
        }
    }

    /// Threads in order of first creation.
    ///
    /// Each call returns a fresh iterator.
    pub fn list(&self) -> impl Iterator<Item = &Thread> + '_ {
        self.order.iter().filter_map(|id| self.threads.get(id))
    }

    /// Look up the log to make active.
    pub fn switch_to(&self, id: ThreadId) -> Result<&MessageLog, ChatError> {
        self.threads
            .get(&id)
            .map(Thread::log)
            .ok_or(ChatError::UnknownThread(id))
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
