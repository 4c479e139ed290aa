//! Shared error type across faultbox crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request or config.
    BadRequest,
    /// Rate outside [0,1] or not a number.
    InvalidRate,
    /// Deliberate failure produced by fault injection.
    SimulatedFailure,
    /// Unmatched route.
    NotFound,
    /// Internal server error (includes metric registry misuse).
    Internal,
}

impl ClientCode {
    /// String representation used in logs and JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::InvalidRate => "INVALID_RATE",
            ClientCode::SimulatedFailure => "SIMULATED_FAILURE",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Which trigger produced a simulated failure. Doubles as the `type` label
/// on `app_errors_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Random trial lost against the current error rate.
    Random,
    /// Unconditional failure endpoint.
    Forced,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Random => "random",
            FailureKind::Forced => "500",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FaultboxError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum FaultboxError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid rate: {0}")]
    InvalidRate(String),
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),
    #[error("metric {name} expects {expected} label values, got {got}")]
    LabelMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl FaultboxError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            FaultboxError::BadRequest(_) => ClientCode::BadRequest,
            FaultboxError::UnsupportedVersion => ClientCode::BadRequest,
            FaultboxError::InvalidRate(_) => ClientCode::InvalidRate,
            FaultboxError::UnknownMetric(_)
            | FaultboxError::DuplicateMetric(_)
            | FaultboxError::LabelMismatch { .. }
            | FaultboxError::Internal(_) => ClientCode::Internal,
        }
    }
}
