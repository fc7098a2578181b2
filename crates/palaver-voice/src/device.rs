//! Speech device abstractions.
//!
//! A [`SpeechRecognizer`] turns spoken audio into text and reports through a
//! [`RecognitionSink`]; a [`SpeechSynthesizer`] speaks text aloud. Both are
//! synchronous to call; devices that do real work spawn onto the ambient
//! tokio runtime.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use palaver_core::config::CommandConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::VoiceError;
use crate::input::RecognitionSink;

/// Environment variable carrying the capture/playback locale to command devices.
pub const LOCALE_ENV: &str = "PALAVER_LOCALE";

/// Speech-to-text capture device.
pub trait SpeechRecognizer: Send + Sync {
    /// Whether this host can capture speech at all.
    fn is_supported(&self) -> bool;

    /// Begin listening. Results, errors and end-of-capture go to `sink`.
    fn start(&self, locale: &str, sink: RecognitionSink) -> Result<(), VoiceError>;

    /// Stop listening. Must be safe to call when nothing is running.
    fn stop(&self);
}

/// Text-to-speech playback device.
pub trait SpeechSynthesizer: Send + Sync {
    /// Start speaking `text`. Returns once playback has been started.
    fn speak(&self, text: &str, locale: &str) -> Result<(), VoiceError>;

    /// Cancel the current utterance and anything queued behind it.
    fn cancel_all(&self);

    fn is_speaking(&self) -> bool;
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Unsupported / silent devices
// =============================================================================

/// Recognizer for hosts without speech capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&self, _locale: &str, _sink: RecognitionSink) -> Result<(), VoiceError> {
        Err(VoiceError::Unsupported)
    }

    fn stop(&self) {}
}

/// Synthesizer that accepts text and plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSynthesizer;

impl SpeechSynthesizer for SilentSynthesizer {
    fn speak(&self, text: &str, locale: &str) -> Result<(), VoiceError> {
        debug!(chars = text.len(), locale, "Silent synthesizer dropping utterance");
        Ok(())
    }

    fn cancel_all(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

// =============================================================================
// Mock devices
// =============================================================================

#[derive(Default)]
struct MockRecognizerState {
    unsupported: bool,
    fail_start: Option<String>,
    sink: Option<RecognitionSink>,
    locales: Vec<String>,
    stops: usize,
}

/// Scriptable recognizer for tests.
///
/// Holds the sink from the most recent `start()` so a test can play the
/// device's side of a capture with `emit_*`.
#[derive(Clone, Default)]
pub struct MockRecognizer {
    state: Arc<Mutex<MockRecognizerState>>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recognizer that reports no capture support.
    pub fn unsupported() -> Self {
        let mock = Self::default();
        lock(&mock.state).unsupported = true;
        mock
    }

    /// A recognizer whose `start()` fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        let mock = Self::default();
        lock(&mock.state).fail_start = Some(reason.into());
        mock
    }

    pub fn start_count(&self) -> usize {
        lock(&self.state).locales.len()
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.state).stops
    }

    pub fn last_locale(&self) -> Option<String> {
        lock(&self.state).locales.last().cloned()
    }

    pub fn last_sink(&self) -> Option<RecognitionSink> {
        lock(&self.state).sink.clone()
    }

    pub fn emit_result(&self, text: &str) {
        if let Some(sink) = self.last_sink() {
            sink.result(text);
        }
    }

    pub fn emit_error(&self, reason: &str) {
        if let Some(sink) = self.last_sink() {
            sink.error(reason);
        }
    }

    pub fn emit_end(&self) {
        if let Some(sink) = self.last_sink() {
            sink.end();
        }
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn is_supported(&self) -> bool {
        !lock(&self.state).unsupported
    }

    fn start(&self, locale: &str, sink: RecognitionSink) -> Result<(), VoiceError> {
        let mut state = lock(&self.state);
        state.locales.push(locale.to_string());
        if let Some(reason) = &state.fail_start {
            return Err(VoiceError::Device(reason.clone()));
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        lock(&self.state).stops += 1;
    }
}

#[derive(Default)]
struct MockSynthesizerState {
    fail: bool,
    current: Option<String>,
    requested: Vec<(String, String)>,
    cancelled: Vec<String>,
    heard: Vec<String>,
}

/// Recording synthesizer for tests.
///
/// An utterance stays "current" until the test calls [`finish`](Self::finish)
/// or something cancels it.
#[derive(Clone, Default)]
pub struct MockSynthesizer {
    state: Arc<Mutex<MockSynthesizerState>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A synthesizer whose `speak()` always fails.
    pub fn failing() -> Self {
        let mock = Self::default();
        lock(&mock.state).fail = true;
        mock
    }

    /// Complete the current utterance as if playback ran to the end.
    pub fn finish(&self) {
        let mut state = lock(&self.state);
        if let Some(text) = state.current.take() {
            state.heard.push(text);
        }
    }

    pub fn current(&self) -> Option<String> {
        lock(&self.state).current.clone()
    }

    /// Every `(text, locale)` pair passed to `speak()`, in order.
    pub fn requested(&self) -> Vec<(String, String)> {
        lock(&self.state).requested.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        lock(&self.state).cancelled.clone()
    }

    pub fn heard(&self) -> Vec<String> {
        lock(&self.state).heard.clone()
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    fn speak(&self, text: &str, locale: &str) -> Result<(), VoiceError> {
        let mut state = lock(&self.state);
        state
            .requested
            .push((text.to_string(), locale.to_string()));
        if state.fail {
            return Err(VoiceError::Device("audio output unavailable".to_string()));
        }
        if let Some(previous) = state.current.replace(text.to_string()) {
            state.cancelled.push(previous);
        }
        Ok(())
    }

    fn cancel_all(&self) {
        let mut state = lock(&self.state);
        if let Some(text) = state.current.take() {
            state.cancelled.push(text);
        }
    }

    fn is_speaking(&self) -> bool {
        lock(&self.state).current.is_some()
    }
}

// =============================================================================
// Command-backed devices
// =============================================================================

enum CommandOutcome {
    Completed(String),
    Failed(String),
    Cancelled,
}

fn runtime_handle() -> Result<tokio::runtime::Handle, VoiceError> {
    tokio::runtime::Handle::try_current()
        .map_err(|_| VoiceError::Device("no async runtime available for voice command".to_string()))
}

/// Run `command` to completion, feeding `input` on stdin and collecting stdout.
///
/// The child is killed if `cancel` fires (or its sender is dropped) first.
async fn run_command(
    command: CommandConfig,
    locale: String,
    input: Option<String>,
    cancel: oneshot::Receiver<()>,
) -> CommandOutcome {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .env(LOCALE_ENV, &locale)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return CommandOutcome::Failed(format!("failed to spawn {}: {}", command.program, e))
        }
    };

    let finished = tokio::select! {
        result = drive(&mut child, input.as_deref()) => Some(result),
        _ = cancel => None,
    };

    match finished {
        Some(Ok(stdout)) => CommandOutcome::Completed(stdout),
        Some(Err(reason)) => {
            CommandOutcome::Failed(format!("{}: {}", command.program, reason))
        }
        None => {
            if let Err(e) = child.kill().await {
                debug!(program = %command.program, error = %e, "Voice command already exited");
            }
            CommandOutcome::Cancelled
        }
    }
}

async fn drive(child: &mut Child, input: Option<&str>) -> Result<String, String> {
    if let Some(text) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| format!("failed to write stdin: {}", e))?;
        }
    }
    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout
            .read_to_string(&mut output)
            .await
            .map_err(|e| format!("failed to read stdout: {}", e))?;
    }
    let status = child
        .wait()
        .await
        .map_err(|e| format!("failed to wait: {}", e))?;
    if !status.success() {
        return Err(format!("exited with {}", status));
    }
    Ok(output)
}

/// Recognizer backed by an external speech-to-text program.
///
/// The program runs once per capture and prints the transcript on stdout.
/// The first non-empty line becomes the result; a non-zero exit is a device
/// error. `stop()` kills the program.
pub struct CommandRecognizer {
    command: CommandConfig,
    active: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandRecognizer {
    pub fn new(command: CommandConfig) -> Self {
        Self {
            command,
            active: Mutex::new(None),
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&self, locale: &str, sink: RecognitionSink) -> Result<(), VoiceError> {
        let handle = runtime_handle()?;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Some(previous) = lock(&self.active).replace(cancel_tx) {
            let _ = previous.send(());
        }

        let command = self.command.clone();
        let locale = locale.to_string();
        info!(program = %command.program, %locale, "Starting speech-to-text command");
        handle.spawn(async move {
            match run_command(command, locale, None, cancel_rx).await {
                CommandOutcome::Completed(stdout) => {
                    if let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                        sink.result(line);
                    }
                    sink.end();
                }
                CommandOutcome::Failed(reason) => sink.error(reason),
                CommandOutcome::Cancelled => {
                    debug!(generation = sink.generation(), "Speech-to-text command cancelled")
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(cancel) = lock(&self.active).take() {
            let _ = cancel.send(());
        }
    }
}

struct Playback {
    id: u64,
    cancel: oneshot::Sender<()>,
}

/// Synthesizer backed by an external text-to-speech program.
///
/// Each utterance spawns the program with the text on stdin. Starting a new
/// utterance or calling `cancel_all()` kills the one still playing.
pub struct CommandSynthesizer {
    command: CommandConfig,
    playing: Arc<Mutex<Option<Playback>>>,
    next_id: AtomicU64,
}

impl CommandSynthesizer {
    pub fn new(command: CommandConfig) -> Self {
        Self {
            command,
            playing: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str, locale: &str) -> Result<(), VoiceError> {
        let handle = runtime_handle()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Some(previous) = lock(&self.playing).replace(Playback {
            id,
            cancel: cancel_tx,
        }) {
            let _ = previous.cancel.send(());
        }

        let command = self.command.clone();
        let locale = locale.to_string();
        let text = text.to_string();
        let playing = Arc::clone(&self.playing);
        debug!(program = %command.program, utterance = id, "Starting text-to-speech command");
        handle.spawn(async move {
            match run_command(command, locale, Some(text), cancel_rx).await {
                CommandOutcome::Completed(_) => debug!(utterance = id, "Utterance finished"),
                CommandOutcome::Failed(reason) => {
                    warn!(utterance = id, %reason, "Text-to-speech command failed")
                }
                CommandOutcome::Cancelled => debug!(utterance = id, "Utterance cancelled"),
            }
            let mut playing = lock(&playing);
            if playing.as_ref().map(|p| p.id) == Some(id) {
                *playing = None;
            }
        });
        Ok(())
    }

    fn cancel_all(&self) {
        if let Some(playback) = lock(&self.playing).take() {
            let _ = playback.cancel.send(());
        }
    }

    fn is_speaking(&self) -> bool {
        lock(&self.playing).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
