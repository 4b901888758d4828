use serde::Serialize;
use thiserror::Error;

/// Lifecycle state of the backend process. There is no intermediate
/// starting/stopping state: spawn success is Running, anything else is Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Stopped,
    Running,
}

#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("invalid transition: {0:?} -> {1:?}")]
    InvalidTransition(State, State),
}

pub struct StateMachine {
    pub state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { state: State::Stopped }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_transition(&self, to: State) -> bool {
        matches!(
            (self.state, to),
            (State::Stopped, State::Running) | (State::Running, State::Stopped)
        )
    }

    pub fn transition(&mut self, to: State) -> Result<(), TransitionError> {
        if self.can_transition(to) {
            tracing::info!("Backend state: {:?} -> {:?}", self.state, to);
            self.state = to;
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition(self.state, to))
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped() {
        let sm = StateMachine::new();
        assert_eq!(sm.state, State::Stopped);
        assert!(!sm.is_running());
    }

    #[test]
    fn stopped_running_stopped_cycle() {
        let mut sm = StateMachine::new();
        assert!(sm.transition(State::Running).is_ok());
        assert!(sm.is_running());
        assert!(sm.transition(State::Stopped).is_ok());
        // the same state is re-entered after every stop
        assert!(sm.transition(State::Running).is_ok());
    }

    #[test]
    fn same_state_is_rejected() {
        let mut sm = StateMachine::new();
        assert!(sm.transition(State::Stopped).is_err());
        sm.transition(State::Running).unwrap();
        assert!(sm.transition(State::Running).is_err());
        assert_eq!(sm.state, State::Running);
    }
}
