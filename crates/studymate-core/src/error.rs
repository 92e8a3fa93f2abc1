//! Error types for the StudyMate engines.
//!
//! This module defines the error hierarchy for configuration loading, input
//! validation, engine preconditions and generation failures, plus the error
//! type reported by a [`GenerationGateway`](crate::GenerationGateway).

use std::path::PathBuf;

/// A specialized `Result` type for StudyMate operations.
pub type Result<T> = std::result::Result<T, StudyError>;

/// A specialized `Result` type for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by the engines and their configuration.
///
/// Generation failures carry only the kind of request that failed. The
/// provider error behind them is logged where it happens and never reaches
/// callers.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your studymate.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Input rejected before any gateway call.
    #[error("{message}")]
    Validation {
        /// Name of the offending input field.
        field: &'static str,
        /// Human-readable reason.
        message: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The gateway call failed or returned non-conforming content.
    #[error("{}", .0.failure_message())]
    GenerationFailed(GenerationKind),

    // ========================================================================
    // Engine Precondition Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    /// A request is already in flight for this engine.
    #[error("The {engine} is still waiting for a previous request")]
    EngineBusy {
        /// Which engine rejected the call.
        engine: &'static str,
    },

    /// `advance` was called before the current question was answered.
    #[error("Question {} has not been answered yet", .index + 1)]
    UnansweredQuestion {
        /// Zero-based index of the current question.
        index: usize,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The three kinds of generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    /// An adaptive quiz.
    Quiz,
    /// A personalized study plan.
    StudyPlan,
    /// A tutoring explanation.
    Tutoring,
}

impl GenerationKind {
    /// Returns the fixed message shown when this kind of request fails.
    #[must_use]
    pub const fn failure_message(&self) -> &'static str {
        match self {
            Self::Quiz => "Failed to generate quiz.",
            Self::StudyPlan => "Failed to generate study plan.",
            Self::Tutoring => "Failed to get response from tutor.",
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiz => write!(f, "quiz"),
            Self::StudyPlan => write!(f, "study_plan"),
            Self::Tutoring => write!(f, "tutoring"),
        }
    }
}

impl StudyError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Validation` error for `field`.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if the caller can fix the input and resubmit.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::UnansweredQuestion { .. }
        )
    }

    /// Returns `true` if resubmitting the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::GenerationFailed(_) | Self::EngineBusy { .. })
    }
}

// ============================================================================
// Gateway Errors
// ============================================================================

/// Categories of gateway failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The model answered with content that does not fit the expected shape.
    MalformedOutput,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::MalformedOutput => write!(f, "malformed_output"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl GatewayErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the API key environment variable",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the model service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::MalformedOutput => "Retry; the model did not follow the requested format",
            Self::Other => "Check the model provider's status page",
        }
    }
}

/// Failure reported by a [`GenerationGateway`](crate::GenerationGateway).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("generation gateway error ({kind}): {message}")]
pub struct GatewayError {
    /// The category of failure.
    pub kind: GatewayErrorKind,
    /// Detail from the provider or the shape check.
    pub message: String,
}

impl GatewayError {
    /// Creates a new gateway error.
    #[must_use]
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `MalformedOutput` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::MalformedOutput, message)
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            GatewayErrorKind::RateLimit
                | GatewayErrorKind::Server
                | GatewayErrorKind::Network
                | GatewayErrorKind::MalformedOutput
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_failure_messages_are_static() {
        assert_eq!(
            StudyError::GenerationFailed(GenerationKind::Quiz).to_string(),
            "Failed to generate quiz."
        );
        assert_eq!(
            StudyError::GenerationFailed(GenerationKind::StudyPlan).to_string(),
            "Failed to generate study plan."
        );
        assert_eq!(
            StudyError::GenerationFailed(GenerationKind::Tutoring).to_string(),
            "Failed to get response from tutor."
        );
    }

    #[test]
    fn test_validation_display_is_message() {
        let err = StudyError::validation("topic", "Topic must be at least 3 characters.");
        assert_eq!(err.to_string(), "Topic must be at least 3 characters.");
        assert!(err.is_user_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unanswered_question_is_one_based() {
        let err = StudyError::UnansweredQuestion { index: 0 };
        assert_eq!(err.to_string(), "Question 1 has not been answered yet");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = StudyError::invalid_transition("active", "generating");
        assert_eq!(
            err.to_string(),
            "Invalid state transition: cannot go from active to generating"
        );
    }

    #[test]
    fn test_config_validation_display() {
        let err = StudyError::config_validation("port must be greater than 0", "Set port");
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("Suggestion: Set port"));
    }

    #[test]
    fn test_gateway_error_kind_display() {
        assert_eq!(GatewayErrorKind::RateLimit.to_string(), "rate_limit");
        assert_eq!(
            GatewayErrorKind::MalformedOutput.to_string(),
            "malformed_output"
        );
    }

    #[test]
    fn test_gateway_error_is_transient() {
        assert!(GatewayError::new(GatewayErrorKind::Server, "502").is_transient());
        assert!(GatewayError::malformed("missing field").is_transient());
        assert!(!GatewayError::new(GatewayErrorKind::Authentication, "bad key").is_transient());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StudyError = io_err.into();
        assert!(matches!(err, StudyError::Io(_)));
    }
}
