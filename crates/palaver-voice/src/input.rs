//! Speech capture controller.
//!
//! [`VoiceInputController`] drives a [`SpeechRecognizer`] through the
//! [`CaptureMachine`] lifecycle. The device reports back through a
//! [`RecognitionSink`] tagged with the capture generation it was issued for,
//! so late callbacks from a superseded capture are dropped.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::device::SpeechRecognizer;
use crate::error::VoiceError;
use crate::state::{CaptureMachine, CaptureState};

/// Outcome of a capture, delivered to the registered handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The device recognized this text. At most one per capture.
    Recognized(String),
    /// The device failed; the controller is already back in `Stopped`.
    Failed(VoiceError),
    /// The device ended the capture on its own; the controller is `Stopped`.
    Ended,
}

/// Callback receiving capture events. Invoked outside any controller lock.
pub type CaptureHandler = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

struct Shared {
    machine: Mutex<CaptureMachine>,
    handler: Mutex<Option<CaptureHandler>>,
}

impl Shared {
    fn machine(&self) -> std::sync::MutexGuard<'_, CaptureMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: CaptureEvent) {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => handler(event),
            None => debug!(?event, "No capture handler registered, dropping event"),
        }
    }
}

/// Device-facing callback surface for a single capture.
///
/// Cloneable so a device can move it into a background task.
#[derive(Clone)]
pub struct RecognitionSink {
    shared: Arc<Shared>,
    generation: u64,
}

impl std::fmt::Debug for RecognitionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionSink")
            .field("generation", &self.generation)
            .finish()
    }
}

impl RecognitionSink {
    /// Generation of the capture this sink belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report recognized text.
    ///
    /// Blank text is ignored. Only the first result of a capture is
    /// delivered, and only while no newer capture has started.
    pub fn result(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            debug!(generation = self.generation, "Ignoring blank recognition result");
            return;
        }
        let claimed = self.shared.machine().claim_result(self.generation);
        if !claimed {
            debug!(generation = self.generation, "Dropping stale or duplicate recognition result");
            return;
        }
        info!(generation = self.generation, chars = text.len(), "Speech recognized");
        self.shared.dispatch(CaptureEvent::Recognized(text.to_string()));
    }

    /// Report a device failure. Resets the controller to `Stopped`.
    pub fn error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.settle() {
            debug!(generation = self.generation, %reason, "Dropping error from inactive capture");
            return;
        }
        warn!(generation = self.generation, %reason, "Speech capture failed");
        self.shared
            .dispatch(CaptureEvent::Failed(VoiceError::Device(reason)));
    }

    /// Report that the device stopped listening on its own.
    pub fn end(&self) {
        if !self.settle() {
            return;
        }
        debug!(generation = self.generation, "Speech capture ended");
        self.shared.dispatch(CaptureEvent::Ended);
    }

    /// Move a live capture back to `Stopped`. Returns false if this sink's
    /// capture is no longer the one listening.
    fn settle(&self) -> bool {
        let mut machine = self.shared.machine();
        if !machine.is_live(self.generation) {
            return false;
        }
        machine.reset();
        true
    }
}

/// Speech capture controller with one registered handler.
pub struct VoiceInputController {
    device: Arc<dyn SpeechRecognizer>,
    locale: String,
    shared: Arc<Shared>,
}

impl VoiceInputController {
    /// Create a controller for `device`, capturing in `locale`.
    pub fn new(device: Arc<dyn SpeechRecognizer>, locale: impl Into<String>) -> Self {
        Self {
            device,
            locale: locale.into(),
            shared: Arc::new(Shared {
                machine: Mutex::new(CaptureMachine::new()),
                handler: Mutex::new(None),
            }),
        }
    }

    /// Register the capture handler, replacing any previous one.
    pub fn on_capture(&self, handler: CaptureHandler) {
        *self
            .shared
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn is_supported(&self) -> bool {
        self.device.is_supported()
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn state(&self) -> CaptureState {
        self.shared.machine().current()
    }

    pub fn is_capturing(&self) -> bool {
        self.state() == CaptureState::Capturing
    }

    /// Begin a capture.
    ///
    /// A capture already in progress is stopped first. On an unsupported
    /// host this returns [`VoiceError::Unsupported`] and stays `Stopped`.
    pub fn start(&self) -> Result<(), VoiceError> {
        if !self.device.is_supported() {
            warn!("Speech capture requested but not supported on this host");
            return Err(VoiceError::Unsupported);
        }
        if self.is_capturing() {
            debug!("Capture already running, stopping it before restart");
            self.stop()?;
        }

        let generation = {
            let mut machine = self.shared.machine();
            machine.transition(CaptureState::Capturing)?;
            machine.generation()
        };
        let sink = RecognitionSink {
            shared: Arc::clone(&self.shared),
            generation,
        };

        if let Err(e) = self.device.start(&self.locale, sink) {
            warn!(error = %e, "Speech device failed to start");
            let mut machine = self.shared.machine();
            if machine.is_live(generation) {
                machine.reset();
            }
            return Err(e);
        }
        info!(generation, locale = %self.locale, "Speech capture started");
        Ok(())
    }

    /// Stop the current capture. Valid only while `Capturing`.
    pub fn stop(&self) -> Result<(), VoiceError> {
        self.shared.machine().transition(CaptureState::Stopped)?;
        self.device.stop();
        info!("Speech capture stopped");
        Ok(())
    }

    /// Start when stopped, stop when capturing. Returns the new state.
    pub fn toggle(&self) -> Result<CaptureState, VoiceError> {
        if self.is_capturing() {
            self.stop()?;
        } else {
            self.start()?;
        }
        Ok(self.state())
    }
}

// =============================================================================
// Tests
// =============================================================================
