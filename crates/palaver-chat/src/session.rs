//! Conversation session: the orchestrator behind every front end.
//!
//! Owns the active thread and its log, the thread store, the pending input
//! draft and the request lifecycle:
//!
//! - `Idle -> AwaitingResponse` when a submission starts. The user message is
//!   appended before the exchange is issued.
//! - `AwaitingResponse -> Idle` when the reply arrives. The reply is appended
//!   and handed to voice output.
//! - `AwaitingResponse -> Error -> Idle` when the exchange fails. A placeholder
//!   reply is appended and a banner is raised.
//!
//! Only one exchange may be in flight at a time, across all threads. State
//! lives behind a `std::sync::Mutex` that is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use palaver_core::events::SessionEvent;
use palaver_core::types::{Message, SessionState, ThreadId, DEFAULT_TIME_FORMAT};
use palaver_voice::VoiceOutputController;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::error::{BackendError, ChatError};
use crate::log::MessageLog;
use crate::store::ThreadStore;

/// Assistant message appended when an exchange fails.
pub const PLACEHOLDER_REPLY: &str = "⚠️ Could not connect to the server.";

/// Banner raised when an exchange fails.
pub const CONNECTION_BANNER: &str =
    "⚠️ Could not connect to the server. Make sure the backend is running.";

const EVENT_CAPACITY: usize = 256;
const PREVIEW_CHARS: usize = 40;

/// The one request in flight. Created by [`ConversationSession::begin_submit`]
/// and consumed by [`ConversationSession::settle`].
#[derive(Debug, PartialEq, Eq)]
pub struct PendingExchange {
    seq: u64,
    thread_id: ThreadId,
    text: String,
}

impl PendingExchange {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Thread the exchange was issued for. The reply lands here even if the
    /// user has switched away since.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing happened: blank input or an exchange already in flight.
    Ignored(ChatError),
    /// The assistant replied with this text.
    Replied(String),
    /// The exchange failed; the placeholder reply was appended.
    Failed(BackendError),
    /// The exchange was no longer the active request and was dropped.
    Stale,
}

/// One row of the thread list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub message_count: usize,
    /// Start of the first message, if any.
    pub preview: Option<String>,
    pub active: bool,
}

struct SessionInner {
    store: ThreadStore,
    active_id: ThreadId,
    active_log: MessageLog,
    state: SessionState,
    in_flight: Option<u64>,
    next_seq: u64,
    draft: String,
    banner: Option<String>,
    last_reply: Option<String>,
}

/// Multi-thread conversation session.
pub struct ConversationSession {
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
    backend: Arc<dyn ChatBackend>,
    voice: Arc<VoiceOutputController>,
    time_format: String,
}

impl ConversationSession {
    /// Create a session with one fresh, empty, active thread.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        voice: Arc<VoiceOutputController>,
        time_format: impl Into<String>,
    ) -> Self {
        let active_id = ThreadId::new();
        let mut store = ThreadStore::new();
        store.ensure(active_id);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let time_format = time_format.into();

        Self {
            inner: Mutex::new(SessionInner {
                store,
                active_id,
                active_log: MessageLog::new(),
                state: SessionState::Idle,
                in_flight: None,
                next_seq: 1,
                draft: String::new(),
                banner: None,
                last_reply: None,
            }),
            events,
            backend,
            voice,
            time_format: if time_format.trim().is_empty() {
                DEFAULT_TIME_FORMAT.to_string()
            } else {
                time_format
            },
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn voice_output(&self) -> &Arc<VoiceOutputController> {
        &self.voice
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn active_thread(&self) -> ThreadId {
        self.lock().active_id
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Whether an exchange is in flight (the "Thinking..." indicator).
    pub fn is_awaiting(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    pub fn banner(&self) -> Option<String> {
        self.lock().banner.clone()
    }

    /// Text of the most recent successful reply.
    pub fn last_reply(&self) -> Option<String> {
        self.lock().last_reply.clone()
    }

    /// Messages of the active thread, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().active_log.snapshot().to_vec()
    }

    /// Messages of the active thread, newest first.
    pub fn history(&self) -> Vec<Message> {
        self.lock().active_log.recent_first().cloned().collect()
    }

    /// All threads in creation order.
    pub fn threads(&self) -> Vec<ThreadSummary> {
        let inner = self.lock();
        inner
            .store
            .list()
            .map(|thread| {
                let active = thread.id() == inner.active_id;
                let log = if active { &inner.active_log } else { thread.log() };
                ThreadSummary {
                    id: thread.id(),
                    message_count: log.len(),
                    preview: log.snapshot().first().map(|m| preview(m.content())),
                    active,
                }
            })
            .collect()
    }

    // =========================================================================
    // Draft and banner
    // =========================================================================

    pub fn set_draft(&self, text: impl Into<String>) {
        let mut inner = self.lock();
        inner.draft = text.into();
        self.emit(SessionEvent::DraftChanged {
            text: inner.draft.clone(),
        });
    }

    /// Place a voice transcript into the draft, replacing what was there.
    pub fn accept_transcript(&self, text: &str) {
        debug!(chars = text.len(), "Transcript accepted into draft");
        self.set_draft(text.trim());
    }

    pub fn clear_banner(&self) {
        self.lock().banner = None;
    }

    // =========================================================================
    // Threads
    // =========================================================================

    /// Start a fresh, empty thread and make it active.
    pub fn new_thread(&self) -> ThreadId {
        let mut inner = self.lock();
        let from = inner.active_id;
        let id = ThreadId::new();
        Self::mirror_active(&mut inner);
        inner.store.ensure(id);
        inner.active_id = id;
        inner.active_log = MessageLog::new();
        info!(thread_id = %id, "New thread started");
        self.emit(SessionEvent::ThreadCreated { thread_id: id });
        self.emit(SessionEvent::ThreadSwitched { from, to: id });
        id
    }

    /// Make `id` the active thread.
    ///
    /// The active log is saved to the store and the target loaded under the
    /// same lock, so no append can fall between the two.
    pub fn switch_thread(&self, id: ThreadId) -> Result<(), ChatError> {
        let mut inner = self.lock();
        let from = inner.active_id;
        let target = inner.store.switch_to(id)?.clone();
        if from == id {
            return Ok(());
        }
        Self::mirror_active(&mut inner);
        inner.active_id = id;
        inner.active_log = target;
        info!(from = %from, to = %id, messages = inner.active_log.len(), "Switched thread");
        self.emit(SessionEvent::ThreadSwitched { from, to: id });
        Ok(())
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Validate input, append the user message and open the exchange.
    ///
    /// Returns `EmptyInput` for blank text and `ConcurrentSubmission` while
    /// another exchange is in flight; neither changes any state.
    pub fn begin_submit(&self, text: &str) -> Result<PendingExchange, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let mut inner = self.lock();
        if inner.in_flight.is_some() {
            return Err(ChatError::ConcurrentSubmission);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.in_flight = Some(seq);
        inner.banner = None;

        let thread_id = inner.active_id;
        let message = Message::user(text, &self.time_format);
        inner.active_log.append(message.clone());
        self.emit(SessionEvent::MessageAppended { thread_id, message });
        self.set_state(&mut inner, SessionState::AwaitingResponse);

        info!(thread_id = %thread_id, seq, "Submitting message");
        Ok(PendingExchange {
            seq,
            thread_id,
            text: text.to_string(),
        })
    }

    /// Resolve the in-flight exchange. Runs its side effects exactly once.
    pub fn settle(
        &self,
        pending: PendingExchange,
        result: Result<String, BackendError>,
    ) -> SubmitOutcome {
        let speak = {
            let mut inner = self.lock();
            if inner.in_flight != Some(pending.seq) {
                warn!(seq = pending.seq, "Dropping result of a stale exchange");
                return SubmitOutcome::Stale;
            }

            let content = match &result {
                Ok(reply) => reply.as_str(),
                Err(_) => PLACEHOLDER_REPLY,
            };
            let message = Message::assistant(content, &self.time_format);
            Self::append_to(&mut inner, pending.thread_id, message.clone());
            self.emit(SessionEvent::MessageAppended {
                thread_id: pending.thread_id,
                message,
            });

            let speak = match &result {
                Ok(reply) => {
                    info!(thread_id = %pending.thread_id, seq = pending.seq, "Reply received");
                    inner.last_reply = Some(reply.clone());
                    self.set_state(&mut inner, SessionState::Idle);
                    (pending.thread_id == inner.active_id).then(|| reply.clone())
                }
                Err(err) => {
                    warn!(thread_id = %pending.thread_id, seq = pending.seq, error = %err, "Chat exchange failed");
                    inner.banner = Some(CONNECTION_BANNER.to_string());
                    self.emit(SessionEvent::BannerRaised {
                        text: CONNECTION_BANNER.to_string(),
                    });
                    self.set_state(&mut inner, SessionState::Error);
                    self.set_state(&mut inner, SessionState::Idle);
                    None
                }
            };

            inner.in_flight = None;
            if !inner.draft.is_empty() {
                inner.draft.clear();
                self.emit(SessionEvent::DraftChanged {
                    text: String::new(),
                });
            }
            speak
        };

        if let Some(reply) = speak {
            self.voice.speak(&reply);
        }

        match result {
            Ok(reply) => SubmitOutcome::Replied(reply),
            Err(err) => SubmitOutcome::Failed(err),
        }
    }

    /// Submit `text` to the active thread and wait for the exchange to settle.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let pending = match self.begin_submit(text) {
            Ok(pending) => pending,
            Err(err) => {
                debug!(reason = %err, "Submission ignored");
                return SubmitOutcome::Ignored(err);
            }
        };
        let result = self
            .backend
            .exchange(pending.text(), pending.thread_id())
            .await;
        self.settle(pending, result)
    }

    /// Submit the current draft.
    pub async fn submit_draft(&self) -> SubmitOutcome {
        let draft = self.draft();
        self.submit(&draft).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        debug!(kind = event.kind(), "Session event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_state(&self, inner: &mut SessionInner, to: SessionState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn mirror_active(inner: &mut SessionInner) {
        let id = inner.active_id;
        let log = inner.active_log.clone();
        inner.store.upsert(id, log);
    }

    fn append_to(inner: &mut SessionInner, thread_id: ThreadId, message: Message) {
        if thread_id == inner.active_id {
            inner.active_log.append(message);
            return;
        }
        let mut log = inner.store.ensure(thread_id).log().clone();
        log.append(message);
        inner.store.upsert(thread_id, log);
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

// =============================================================================
// Tests
// =============================================================================
