//! Palaver Voice crate - speech capture and playback controllers.
//!
//! Wraps a speech-to-text device in a `Stopped -> Capturing -> Stopped`
//! state machine that delivers at most one transcript per capture, and a
//! speech synthesis device in a latest-utterance-wins playback controller.
//! Devices are trait objects so hosts without speech support, external
//! programs, and test mocks plug in the same way.

pub mod device;
pub mod error;
pub mod input;
pub mod output;
pub mod state;

pub use device::{
    CommandRecognizer, CommandSynthesizer, MockRecognizer, MockSynthesizer, SilentSynthesizer,
    SpeechRecognizer, SpeechSynthesizer, UnsupportedRecognizer,
};
pub use error::VoiceError;
pub use input::{CaptureEvent, CaptureHandler, RecognitionSink, VoiceInputController};
pub use output::VoiceOutputController;
pub use state::{CaptureMachine, CaptureState};
