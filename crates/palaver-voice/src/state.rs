//! Speech capture state machine.
//!
//! Enforces the capture lifecycle:
//! - Stopped -> Capturing (start capture)
//! - Capturing -> Stopped (explicit stop, recognition end, or device error)
//!
//! Every entry into `Capturing` opens a new generation. Device callbacks carry
//! the generation they were issued for, so events from a superseded capture
//! can be told apart from events for the current one.

use std::fmt;

use crate::error::VoiceError;

/// Operational state of a speech capture controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// No capture in progress. Ready to start.
    Stopped,
    /// The device is listening for speech.
    Capturing,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Stopped => write!(f, "Stopped"),
            CaptureState::Capturing => write!(f, "Capturing"),
        }
    }
}

impl CaptureState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &CaptureState) -> bool {
        matches!(
            (self, target),
            (CaptureState::Stopped, CaptureState::Capturing)
                | (CaptureState::Capturing, CaptureState::Stopped)
        )
    }
}

/// Capture state plus per-capture bookkeeping.
///
/// Not synchronized on its own; the input controller keeps it behind a mutex
/// so the state, generation and result flag always change together.
#[derive(Debug, Clone)]
pub struct CaptureMachine {
    state: CaptureState,
    generation: u64,
    result_delivered: bool,
}

impl Default for CaptureMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureMachine {
    /// Create a machine in `Stopped` with no capture history.
    pub fn new() -> Self {
        Self {
            state: CaptureState::Stopped,
            generation: 0,
            result_delivered: false,
        }
    }

    pub fn current(&self) -> CaptureState {
        self.state
    }

    /// Generation of the most recent capture (0 before the first start).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Attempt to transition to the target state.
    ///
    /// Entering `Capturing` opens a new generation and re-arms the
    /// single-result guard.
    pub fn transition(&mut self, target: CaptureState) -> Result<(), VoiceError> {
        if !self.state.can_transition_to(&target) {
            return Err(VoiceError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        tracing::debug!("Capture state: {} -> {}", self.state, target);
        if target == CaptureState::Capturing {
            self.generation += 1;
            self.result_delivered = false;
        }
        self.state = target;
        Ok(())
    }

    /// Force the machine back to `Stopped` (used for error recovery).
    pub fn reset(&mut self) {
        if self.state != CaptureState::Stopped {
            tracing::warn!("Capture state machine reset to Stopped from {}", self.state);
        }
        self.state = CaptureState::Stopped;
    }

    /// Whether `generation` belongs to the most recent capture.
    pub fn is_current(&self, generation: u64) -> bool {
        generation != 0 && generation == self.generation
    }

    /// Whether `generation` is the capture that is still listening.
    pub fn is_live(&self, generation: u64) -> bool {
        self.is_current(generation) && self.state == CaptureState::Capturing
    }

    /// Claim the single result slot for `generation`.
    ///
    /// Returns `true` exactly once per capture. A result may still arrive
    /// after an explicit stop, as long as no newer capture has started.
    pub fn claim_result(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.result_delivered {
            return false;
        }
        self.result_delivered = true;
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(CaptureState::Stopped.to_string(), "Stopped");
        assert_eq!(CaptureState::Capturing.to_string(), "Capturing");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(CaptureState::Stopped.can_transition_to(&CaptureState::Capturing));
        assert!(CaptureState::Capturing.can_transition_to(&CaptureState::Stopped));
    }

    #[test]
    fn test_self_transitions_invalid() {
        assert!(!CaptureState::Stopped.can_transition_to(&CaptureState::Stopped));
        assert!(!CaptureState::Capturing.can_transition_to(&CaptureState::Capturing));
    }

    #[test]
    fn test_machine_happy_path() {
        let mut machine = CaptureMachine::new();
        assert_eq!(machine.current(), CaptureState::Stopped);
        assert_eq!(machine.generation(), 0);

        machine.transition(CaptureState::Capturing).unwrap();
        assert_eq!(machine.current(), CaptureState::Capturing);
        assert_eq!(machine.generation(), 1);

        machine.transition(CaptureState::Stopped).unwrap();
        assert_eq!(machine.current(), CaptureState::Stopped);
        assert_eq!(machine.generation(), 1);
    }

    #[test]
    fn test_stop_from_stopped_is_rejected() {
        let mut machine = CaptureMachine::new();
        let err = machine.transition(CaptureState::Stopped).unwrap_err();
        assert_eq!(
            err,
            VoiceError::InvalidTransition {
                from: CaptureState::Stopped,
                to: CaptureState::Stopped,
            }
        );
        assert_eq!(machine.current(), CaptureState::Stopped);
    }

    #[test]
    fn test_each_capture_opens_new_generation() {
        let mut machine = CaptureMachine::new();
        machine.transition(CaptureState::Capturing).unwrap();
        let first = machine.generation();
        machine.transition(CaptureState::Stopped).unwrap();
        machine.transition(CaptureState::Capturing).unwrap();
        assert_eq!(machine.generation(), first + 1);
        assert!(!machine.is_current(first));
        assert!(machine.is_live(first + 1));
    }

    #[test]
    fn test_generation_zero_is_never_current() {
        let machine = CaptureMachine::new();
        assert!(!machine.is_current(0));
    }

    #[test]
    fn test_claim_result_once_per_capture() {
        let mut machine = CaptureMachine::new();
        machine.transition(CaptureState::Capturing).unwrap();
        let gen = machine.generation();
        assert!(machine.claim_result(gen));
        assert!(!machine.claim_result(gen));

        machine.transition(CaptureState::Stopped).unwrap();
        machine.transition(CaptureState::Capturing).unwrap();
        assert!(machine.claim_result(machine.generation()));
    }

    #[test]
    fn test_claim_result_after_stop_same_generation() {
        let mut machine = CaptureMachine::new();
        machine.transition(CaptureState::Capturing).unwrap();
        let gen = machine.generation();
        machine.transition(CaptureState::Stopped).unwrap();
        assert!(!machine.is_live(gen));
        assert!(machine.claim_result(gen));
    }

    #[test]
    fn test_claim_result_stale_generation_rejected() {
        let mut machine = CaptureMachine::new();
        machine.transition(CaptureState::Capturing).unwrap();
        let stale = machine.generation();
        machine.transition(CaptureState::Stopped).unwrap();
        machine.transition(CaptureState::Capturing).unwrap();
        assert!(!machine.claim_result(stale));
    }

    #[test]
    fn test_reset_forces_stopped() {
        let mut machine = CaptureMachine::new();
        machine.transition(CaptureState::Capturing).unwrap();
        machine.reset();
        assert_eq!(machine.current(), CaptureState::Stopped);
        machine.reset();
        assert_eq!(machine.current(), CaptureState::Stopped);
    }
}
