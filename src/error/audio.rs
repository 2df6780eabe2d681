// Audio error types and constants

use crate::engine::state::{EngineState, LifecycleOp};
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported across the
/// engine boundary.
///
/// Error code range: 1001-1010
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Engine is already started (or suspended)
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Engine is not started
    pub const NOT_RUNNING: i32 = 1002;

    /// Lifecycle operation is not valid in the current state
    pub const INVALID_TRANSITION: i32 = 1003;

    /// Audio session could not be reactivated
    pub const SESSION_ACTIVATION_FAILED: i32 = 1004;

    /// Audio session could not be deactivated
    pub const SESSION_DEACTIVATION_FAILED: i32 = 1005;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1006;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1007;

    /// Requested engine options are invalid
    pub const INVALID_OPTIONS: i32 = 1008;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1009;

    /// Stream thread or command channel disappeared unexpectedly
    pub const STREAM_FAILURE: i32 = 1010;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover engine lifecycle, stream management, and hardware
/// access.
///
/// Error code ranges: 1001-1010
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Engine is already started or suspended
    AlreadyRunning,

    /// Engine is stopped
    NotRunning,

    /// Operation is not allowed from the current state
    InvalidTransition {
        state: EngineState,
        operation: LifecycleOp,
    },

    /// Backend failed to resume its streams
    SessionActivationFailed { reason: String },

    /// Backend failed to pause its streams
    SessionDeactivationFailed { reason: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Requested options cannot be used
    InvalidOptions { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Stream thread or channel disconnected unexpectedly
    StreamFailure { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::InvalidTransition { .. } => AudioErrorCodes::INVALID_TRANSITION,
            AudioError::SessionActivationFailed { .. } => {
                AudioErrorCodes::SESSION_ACTIVATION_FAILED
            }
            AudioError::SessionDeactivationFailed { .. } => {
                AudioErrorCodes::SESSION_DEACTIVATION_FAILED
            }
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::InvalidOptions { .. } => AudioErrorCodes::INVALID_OPTIONS,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => {
                "Audio engine already running. Call stop() first.".to_string()
            }
            AudioError::NotRunning => "Audio engine not running. Call start() first.".to_string(),
            AudioError::InvalidTransition { state, operation } => {
                format!("Cannot {} while engine is {}", operation, state)
            }
            AudioError::SessionActivationFailed { reason } => {
                format!("Failed to activate audio session: {}", reason)
            }
            AudioError::SessionDeactivationFailed { reason } => {
                format!("Failed to deactivate audio session: {}", reason)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::InvalidOptions { reason } => {
                format!("Invalid engine options: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failure: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

/// Convert from std::io::Error to AudioError
impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(AudioError::AlreadyRunning.code(), 1001);
        assert_eq!(AudioError::NotRunning.code(), 1002);
        assert_eq!(
            AudioError::InvalidTransition {
                state: EngineState::Started,
                operation: LifecycleOp::Resume,
            }
            .code(),
            1003
        );
        assert_eq!(
            AudioError::SessionActivationFailed {
                reason: "test".to_string()
            }
            .code(),
            1004
        );
        assert_eq!(
            AudioError::SessionDeactivationFailed {
                reason: "test".to_string()
            }
            .code(),
            1005
        );
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            1006
        );
        assert_eq!(
            AudioError::HardwareError {
                details: "test".to_string()
            }
            .code(),
            1007
        );
        assert_eq!(
            AudioError::InvalidOptions {
                reason: "test".to_string()
            }
            .code(),
            1008
        );
        assert_eq!(
            AudioError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            1009
        );
        assert_eq!(
            AudioError::StreamFailure {
                reason: "test".to_string()
            }
            .code(),
            1010
        );
    }

    #[test]
    fn test_audio_error_messages() {
        assert!(AudioError::AlreadyRunning
            .message()
            .contains("already running"));

        let err = AudioError::InvalidTransition {
            state: EngineState::Suspended,
            operation: LifecycleOp::Suspend,
        };
        assert_eq!(err.message(), "Cannot suspend while engine is suspended");

        let err = AudioError::LockPoisoned {
            component: "lifecycle".to_string(),
        };
        assert!(err.message().contains("lifecycle"));
    }

    #[test]
    fn test_display_includes_code() {
        let rendered = AudioError::NotRunning.to_string();
        assert!(rendered.contains("code 1002"));
        assert!(rendered.contains("not running"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test error");
        let audio_err: AudioError = io_err.into();

        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test error"));
            }
            _ => panic!("Expected HardwareError variant"),
        }
    }

    #[test]
    fn test_error_code_trait_object() {
        let err: &dyn ErrorCode = &AudioError::NotRunning;
        assert_eq!(err.code(), AudioErrorCodes::NOT_RUNNING);
    }
}
