//! Error types for the affect engine.

use std::fmt;

/// Engine-wide error type (§7 error kinds).
#[derive(Debug, Clone)]
pub enum EngineError {
    /// STB input rejection: `code`, human message, offending index/value.
    Validation {
        code: ValidationCode,
        message: String,
        offending_index: Option<usize>,
        offending_value: Option<f64>,
    },
    /// Component unavailable (e.g. persistence not configured).
    NotReady(String),
    /// External call exceeded its deadline.
    Timeout(String),
    /// Message-bus / HTTP transport failure.
    Transport(String),
    /// Attempted delete/modify of a base or locked pattern; operation was a no-op.
    PatternLocked(String),
    /// Config load/parse failure.
    Configuration(String),
    /// (De)serialization failure.
    Serialization(String),
    /// Anything else internal and unexpected.
    Internal(String),
}

/// Validation failure codes for short-term buffer input rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    NanOrInf,
    OutOfRange,
    AllZero,
    ExtremeJump,
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationCode::NanOrInf => "NAN_OR_INF",
            ValidationCode::OutOfRange => "OUT_OF_RANGE",
            ValidationCode::AllZero => "ALL_ZERO",
            ValidationCode::ExtremeJump => "EXTREME_JUMP",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation {
                code,
                message,
                offending_index,
                offending_value,
            } => write!(
                f,
                "validation error [{code}]: {message} (index={offending_index:?}, value={offending_value:?})"
            ),
            EngineError::NotReady(msg) => write!(f, "not ready: {msg}"),
            EngineError::Timeout(msg) => write!(f, "timeout: {msg}"),
            EngineError::Transport(msg) => write!(f, "transport error: {msg}"),
            EngineError::PatternLocked(msg) => write!(f, "pattern locked: {msg}"),
            EngineError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            EngineError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            EngineError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::Internal(error.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Serialization(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for EngineError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        EngineError::Timeout(error.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(error: config::ConfigError) -> Self {
        EngineError::Configuration(error.to_string())
    }
}

impl EngineError {
    pub fn validation(code: ValidationCode, message: impl Into<String>) -> Self {
        EngineError::Validation {
            code,
            message: message.into(),
            offending_index: None,
            offending_value: None,
        }
    }

    pub fn validation_at(
        code: ValidationCode,
        message: impl Into<String>,
        index: usize,
        value: f64,
    ) -> Self {
        EngineError::Validation {
            code,
            message: message.into(),
            offending_index: Some(index),
            offending_value: Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_for_validation_errors() {
        let err = EngineError::validation_at(ValidationCode::NanOrInf, "bad value", 3, f64::NAN);
        let text = err.to_string();
        assert!(text.contains("NAN_OR_INF"));
        assert!(text.contains("index=Some(3)"));
    }

    #[test]
    fn not_ready_round_trips_message() {
        let err = EngineError::NotReady("persistence unconfigured".into());
        assert_eq!(err.to_string(), "not ready: persistence unconfigured");
    }
}
