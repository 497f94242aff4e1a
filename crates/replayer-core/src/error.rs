//! Structured errors shared by every layer of the replayer

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The OS refused to register a low-level hook
    HookInstallFailed,
    /// Speed text was not a digit-only string
    ValidationFailed,
    /// Process-creation notifications could not be subscribed to
    SubscriptionFailed,
    /// Recording and replay were requested at the same time
    ModeConflict,
    /// The requested transition is not legal from the current state
    InvalidState,
    NothingToReplay,
    /// A persisted log could not be understood
    StructuralError,
    InjectionFailed,
    NotImplemented,
    Io,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn hook_install_failed(kind: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::HookInstallFailed,
            format!("Failed to install {} hook: {}", kind, reason),
        )
    }

    pub fn validation_failed(input: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::ValidationFailed,
            format!("Invalid value '{}': {}", input, reason),
        )
    }

    pub fn subscription_failed(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SubscriptionFailed,
            format!("Process notifications unavailable: {}", reason),
        )
    }

    pub fn mode_conflict(requested: &str, active: &str) -> Self {
        Self::new(
            ErrorCode::ModeConflict,
            format!("Cannot {} while {}", requested, active),
        )
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub fn nothing_to_replay() -> Self {
        Self::new(ErrorCode::NothingToReplay, "Nothing to replay: the log is empty")
            .with_suggestions(vec!["Record or load a log first".to_string()])
    }

    pub fn structural(line: usize, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::StructuralError,
            format!("Malformed record on line {}: {}", line, reason),
        )
        .with_context(serde_json::json!({ "line": line }))
    }

    pub fn injection_failed(action: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InjectionFailed,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn not_implemented(what: &str) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("{} is not supported on this platform", what),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::StructuralError, e.to_string())
    }
}
