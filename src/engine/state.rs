//! Engine lifecycle state machine.
//!
//! ```text
//!            start              suspend
//!  Stopped ─────────> Started ─────────> Suspended
//!     ^      stop       │  ^     resume      │
//!     └─────────────────┘  └─────────────────┘
//!     ^                   stop               │
//!     └──────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AudioError;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Stopped,
    Started,
    Suspended,
}

/// Lifecycle operations that move the engine between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOp {
    Start,
    Stop,
    Suspend,
    Resume,
}

impl EngineState {
    /// Resolve the state reached by applying `op`, or the error explaining
    /// why `op` is not allowed from `self`.
    pub fn transition(self, op: LifecycleOp) -> Result<EngineState, AudioError> {
        use EngineState::*;
        use LifecycleOp::*;

        match (self, op) {
            (Stopped, Start) => Ok(Started),
            (Started | Suspended, Start) => Err(AudioError::AlreadyRunning),

            (Started | Suspended, Stop) => Ok(Stopped),
            (Stopped, _) => Err(AudioError::NotRunning),

            (Started, Suspend) => Ok(Suspended),
            (Suspended, Resume) => Ok(Started),
            (state, operation) => Err(AudioError::InvalidTransition { state, operation }),
        }
    }

    /// True while streams exist (started or suspended).
    pub fn is_running(self) -> bool {
        !matches!(self, EngineState::Stopped)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Started => "started",
            EngineState::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleOp::Start => "start",
            LifecycleOp::Stop => "stop",
            LifecycleOp::Suspend => "suspend",
            LifecycleOp::Resume => "resume",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(
            EngineState::Stopped.transition(LifecycleOp::Start),
            Ok(EngineState::Started)
        );
        assert_eq!(
            EngineState::Started.transition(LifecycleOp::Stop),
            Ok(EngineState::Stopped)
        );
        assert_eq!(
            EngineState::Started.transition(LifecycleOp::Suspend),
            Ok(EngineState::Suspended)
        );
        assert_eq!(
            EngineState::Suspended.transition(LifecycleOp::Resume),
            Ok(EngineState::Started)
        );
        assert_eq!(
            EngineState::Suspended.transition(LifecycleOp::Stop),
            Ok(EngineState::Stopped)
        );
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        for state in [EngineState::Started, EngineState::Suspended] {
            assert_eq!(
                state.transition(LifecycleOp::Start),
                Err(AudioError::AlreadyRunning)
            );
        }
    }

    #[test]
    fn test_operations_on_stopped_engine_are_rejected() {
        for op in [LifecycleOp::Stop, LifecycleOp::Suspend, LifecycleOp::Resume] {
            assert_eq!(
                EngineState::Stopped.transition(op),
                Err(AudioError::NotRunning)
            );
        }
    }

    #[test]
    fn test_redundant_suspend_and_resume_are_rejected() {
        assert_eq!(
            EngineState::Suspended.transition(LifecycleOp::Suspend),
            Err(AudioError::InvalidTransition {
                state: EngineState::Suspended,
                operation: LifecycleOp::Suspend,
            })
        );
        assert_eq!(
            EngineState::Started.transition(LifecycleOp::Resume),
            Err(AudioError::InvalidTransition {
                state: EngineState::Started,
                operation: LifecycleOp::Resume,
            })
        );
    }

    #[test]
    fn test_is_running() {
        assert!(!EngineState::Stopped.is_running());
        assert!(EngineState::Started.is_running());
        assert!(EngineState::Suspended.is_running());
        assert_eq!(EngineState::default(), EngineState::Stopped);
    }
}
