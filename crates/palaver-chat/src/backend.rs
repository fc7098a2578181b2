//! Assistant backend: one request, one reply.
//!
//! [`ChatBackend`] is the seam between the session and the network.
//! [`HttpChatBackend`] talks JSON over HTTP; [`MockBackend`] scripts replies
//! for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use palaver_core::config::BackendConfig;
use palaver_core::types::ThreadId;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::BackendError;

/// Sends one user message to the assistant and returns its reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Single attempt, no retry.
    async fn exchange(&self, message: &str, thread_id: ThreadId) -> Result<String, BackendError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest<'a> {
    message: &'a str,
    thread_id: ThreadId,
}

#[derive(Debug, Deserialize)]
struct ExchangeReply {
    reply: String,
}

/// JSON-over-HTTP backend.
///
/// Sends `POST {url}` with `{"message", "threadId"}` and expects
/// `{"reply"}` back.
#[derive(Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpChatBackend {
    /// Create a backend for `url`. `None` disables the request timeout.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Self::new(config.chat_url(), timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn exchange(&self, message: &str, thread_id: ThreadId) -> Result<String, BackendError> {
        debug!(url = %self.url, thread_id = %thread_id, "Sending chat exchange");

        let response = self
            .client
            .post(&self.url)
            .json(&ExchangeRequest { message, thread_id })
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Backend returned non-success status");
            return Err(BackendError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Transport(err.to_string())
            }
        })?;
        let parsed: ExchangeReply = serde_json::from_str(&body)
            .map_err(|err| BackendError::MalformedResponse(err.to_string()))?;
        Ok(parsed.reply)
    }
}

// =============================================================================
// MockBackend
// =============================================================================

#[derive(Default)]
struct MockState {
    replies: VecDeque<Result<String, BackendError>>,
    requests: Vec<(String, ThreadId)>,
}

/// Scripted backend for tests.
///
/// Replies are consumed in order; an exhausted script answers with a
/// transport error. With [`gated`](Self::gated), every exchange waits for
/// [`release`](Self::release) so a test can observe the in-flight state.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    gate: Option<Arc<Notify>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose exchanges block until released.
    pub fn gated() -> Self {
        Self {
            state: Arc::default(),
            gate: Some(Arc::new(Notify::new())),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        self.lock().replies.push_back(Ok(reply.into()));
        self
    }

    pub fn push_error(&self, err: BackendError) -> &Self {
        self.lock().replies.push_back(Err(err));
        self
    }

    /// Let one waiting (or the next) exchange proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Every `(message, thread_id)` received so far.
    pub fn requests(&self) -> Vec<(String, ThreadId)> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn exchange(&self, message: &str, thread_id: ThreadId) -> Result<String, BackendError> {
        self.lock().requests.push((message.to_string(), thread_id));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.lock()
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("no scripted reply".to_string())))
    }
}
