//! Error types for the voice controllers.

use palaver_core::error::PalaverError;

use crate::state::CaptureState;

/// Errors from speech capture and playback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("speech capture is not supported on this host")]
    Unsupported,
    #[error("voice device error: {0}")]
    Device(String),
    #[error("invalid capture state transition: {from} -> {to}")]
    InvalidTransition { from: CaptureState, to: CaptureState },
}

impl From<VoiceError> for PalaverError {
    fn from(err: VoiceError) -> Self {
        PalaverError::Voice(err.to_string())
    }
}
