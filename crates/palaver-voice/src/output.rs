//! Speech playback controller: latest utterance wins, nothing is queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::device::SpeechSynthesizer;

pub struct VoiceOutputController {
    device: Arc<dyn SpeechSynthesizer>,
    locale: String,
    enabled: AtomicBool,
    utterances: AtomicU64,
}

impl VoiceOutputController {
    pub fn new(device: Arc<dyn SpeechSynthesizer>, locale: impl Into<String>, enabled: bool) -> Self {
        Self {
            device,
            locale: locale.into(),
            enabled: AtomicBool::new(enabled),
            utterances: AtomicU64::new(0),
        }
    }

    /// Speak `text`, cancelling whatever is currently playing.
    ///
    /// Returns whether playback was started. Blank text, disabled output
    /// and device failures all return `false`; failures are logged only.
    pub fn speak(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if !self.is_enabled() {
            debug!("Voice output disabled, not speaking");
            return false;
        }

        self.device.cancel_all();
        match self.device.speak(text, &self.locale) {
            Ok(()) => {
                let n = self.utterances.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(utterance = n, chars = text.len(), "Speaking");
                true
            }
            Err(e) => {
                warn!(error = %e, "Speech playback failed");
                false
            }
        }
    }

    /// Cancel the current utterance, if any.
    pub fn cancel(&self) {
        self.device.cancel_all();
    }

    pub fn is_speaking(&self) -> bool {
        self.device.is_speaking()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turn playback on or off. Turning it off silences the current utterance.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was && !enabled {
            self.device.cancel_all();
        }
    }

    /// Number of utterances started so far.
    pub fn utterance_count(&self) -> u64 {
        self.utterances.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockSynthesizer;

    fn controller(device: &MockSynthesizer) -> VoiceOutputController {
        VoiceOutputController::new(Arc::new(device.clone()), "en-US", true)
    }

    #[test]
    fn test_blank_text_is_noop() {
        let device = MockSynthesizer::new();
        let output = controller(&device);
        assert!(!output.speak(""));
        assert!(!output.speak("   \n"));
        assert!(device.requested().is_empty());
    }

    #[test]
    fn test_speak_trims_and_uses_locale() {
        let device = MockSynthesizer::new();
        let output = VoiceOutputController::new(Arc::new(device.clone()), "de-DE", true);
        assert!(output.speak("  guten Tag "));
        assert_eq!(
            device.requested(),
            vec![("guten Tag".to_string(), "de-DE".to_string())]
        );
        assert!(output.is_speaking());
    }

    #[test]
    fn test_latest_utterance_wins() {
        let device = MockSynthesizer::new();
        let output = controller(&device);
        output.speak("first reply");
        output.speak("second reply");

        assert_eq!(device.current().as_deref(), Some("second reply"));
        assert_eq!(device.cancelled(), vec!["first reply".to_string()]);
        assert_eq!(output.utterance_count(), 2);
    }

    #[test]
    fn test_cancel() {
        let device = MockSynthesizer::new();
        let output = controller(&device);
        output.speak("hello");
        output.cancel();
        assert!(!output.is_speaking());
        assert!(device.heard().is_empty());
    }

    #[test]
    fn test_disable_silences_and_blocks() {
        let device = MockSynthesizer::new();
        let output = controller(&device);
        output.speak("hello");

        output.set_enabled(false);
        assert!(!output.is_speaking());
        assert!(!output.speak("ignored"));
        assert_eq!(device.requested().len(), 1);

        output.set_enabled(true);
        assert!(output.speak("back again"));
    }

    #[test]
    fn test_device_failure_is_swallowed() {
        let device = MockSynthesizer::failing();
        let output = controller(&device);
        assert!(!output.speak("hello"));
        assert_eq!(output.utterance_count(), 0);
    }
}
