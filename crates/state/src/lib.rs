//! Supervisor mode state machine.

use tracing::{info, warn};
use types::Mode;

/// Events that drive mode transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A joystick command arrived; enters Manual from Idle.
    Joystick,
    StartMapping,
    StartNavigation,
    StartExploration,
    /// stop_mapping / stop_navigation / stop_exploration, or leaving
    /// Manual — the active mode is already known, so one event suffices.
    Stop,
    /// Unconditional: any mode to Idle, motors zeroed.
    EmergencyStop,
}

/// Tracks the supervisor's current operating mode and enforces mode
/// exclusivity: at most one of mapping/navigation/exploration is active
/// at any time, and `start_X` while busy is a no-op.
pub struct StateMachine {
    mode: Mode,
}

impl StateMachine {
    pub fn new() -> Self {
        Self { mode: Mode::Idle }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn transition(&mut self, event: Event) -> Mode {
        let old_mode = self.mode;

        self.mode = match (self.mode, event) {
            (Mode::Idle, Event::Joystick) => Mode::Manual,
            (Mode::Idle, Event::StartMapping) => Mode::Mapping,
            (Mode::Idle, Event::StartNavigation) => Mode::Navigation,
            (Mode::Idle, Event::StartExploration) => Mode::Exploration,

            (Mode::Manual, Event::Joystick) => Mode::Manual,
            (Mode::Manual, Event::StartMapping) => Mode::Mapping,
            (Mode::Manual, Event::StartNavigation) => Mode::Navigation,
            (Mode::Manual, Event::StartExploration) => Mode::Exploration,
            (Mode::Manual, Event::Stop) => Mode::Idle,

            (Mode::Mapping, Event::Stop) => Mode::Idle,
            (Mode::Navigation, Event::Stop) => Mode::Idle,
            (Mode::Exploration, Event::Stop) => Mode::Idle,

            (_, Event::EmergencyStop) => Mode::Idle,

            // start_X while busy, or any other combination: no-op.
            (mode, _) => mode,
        };

        if self.mode != old_mode {
            info!(?old_mode, new_mode = ?self.mode, ?event, "mode transition");
        }

        self.mode
    }

    /// Force into Idle regardless of current mode (used by the safety
    /// watchdog path as well as the `emergency_stop` event).
    pub fn emergency_stop(&mut self) {
        if self.mode != Mode::Idle {
            warn!(old_mode = ?self.mode, "emergency stop");
            self.mode = Mode::Idle;
        }
    }

    pub fn is_mapping(&self) -> bool {
        self.mode == Mode::Mapping
    }

    pub fn is_navigating(&self) -> bool {
        self.mode == Mode::Navigation
    }

    pub fn is_exploring(&self) -> bool {
        self.mode == Mode::Exploration
    }

    /// At most one of mapping/navigating/exploring may ever be true;
    /// this follows structurally from `mode` being a single field, but
    /// tests assert it explicitly per the invariant.
    pub fn active_exclusive_count(&self) -> usize {
        [self.is_mapping(), self.is_navigating(), self.is_exploring()]
            .iter()
            .filter(|b| **b)
            .count()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let sm = StateMachine::new();
        assert_eq!(sm.mode(), Mode::Idle);
    }

    #[test]
    fn test_joystick_enters_manual_from_idle() {
        let mut sm = StateMachine::new();
        sm.transition(Event::Joystick);
        assert_eq!(sm.mode(), Mode::Manual);
    }

    #[test]
    fn test_start_mapping_from_idle_and_manual() {
        let mut sm = StateMachine::new();
        sm.transition(Event::StartMapping);
        assert_eq!(sm.mode(), Mode::Mapping);

        let mut sm = StateMachine::new();
        sm.transition(Event::Joystick);
        sm.transition(Event::StartMapping);
        assert_eq!(sm.mode(), Mode::Mapping);
    }

    #[test]
    fn test_start_x_while_busy_is_noop() {
        let mut sm = StateMachine::new();
        sm.transition(Event::StartMapping);
        assert_eq!(sm.mode(), Mode::Mapping);

        sm.transition(Event::StartNavigation);
        assert_eq!(sm.mode(), Mode::Mapping, "busy mapping must ignore start_navigation");

        sm.transition(Event::StartExploration);
        assert_eq!(sm.mode(), Mode::Mapping, "busy mapping must ignore start_exploration");
    }

    #[test]
    fn test_stop_returns_to_idle() {
        for start in [
            Event::StartMapping,
            Event::StartNavigation,
            Event::StartExploration,
        ] {
            let mut sm = StateMachine::new();
            sm.transition(start);
            sm.transition(Event::Stop);
            assert_eq!(sm.mode(), Mode::Idle);
        }
    }

    #[test]
    fn test_emergency_stop_from_any_mode() {
        for start in [
            Event::Joystick,
            Event::StartMapping,
            Event::StartNavigation,
            Event::StartExploration,
        ] {
            let mut sm = StateMachine::new();
            sm.transition(start);
            sm.transition(Event::EmergencyStop);
            assert_eq!(sm.mode(), Mode::Idle);
        }
    }

    #[test]
    fn test_emergency_stop_method_is_idempotent() {
        let mut sm = StateMachine::new();
        sm.transition(Event::StartMapping);
        sm.emergency_stop();
        assert_eq!(sm.mode(), Mode::Idle);
        sm.emergency_stop();
        assert_eq!(sm.mode(), Mode::Idle);
    }

    #[test]
    fn test_mode_exclusivity_invariant() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.active_exclusive_count(), 0);
        sm.transition(Event::StartNavigation);
        assert_eq!(sm.active_exclusive_count(), 1);
        assert!(sm.is_navigating());
        assert!(!sm.is_mapping());
        assert!(!sm.is_exploring());
    }

    #[test]
    fn test_no_transition_for_invalid_event() {
        let mut sm = StateMachine::new();
        sm.transition(Event::Stop);
        assert_eq!(sm.mode(), Mode::Idle);
    }
}
