//! Crate-wide error type.
//!
//! FlipSync components never return raw `Box<dyn Error>` at their public
//! boundary; they normalize into an [`ErrorKind`] so callers can make
//! programmatic decisions (retry on `Timeout`, surface `RateLimited` to the
//! seller, etc.) without string-matching messages.

use std::error::Error as StdError;
use std::fmt;

/// Closed set of error categories a FlipSync operation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operation did not complete within its allotted time.
    Timeout,
    /// The underlying transport (HTTP, socket) failed.
    Transport,
    /// The upstream provider is throttling requests.
    RateLimited,
    /// Credentials are missing, expired, or rejected.
    Auth,
    /// A response violated the expected wire protocol/shape.
    Protocol,
    /// Caller-supplied input failed validation.
    Validation,
    /// The referenced entity does not exist.
    NotFound,
    /// The entity already exists / the operation was already performed.
    Duplicate,
    /// The component is shutting down and cannot accept new work.
    Shutdown,
    /// Too little information was supplied to proceed.
    InsufficientInput,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Auth => "auth",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Shutdown => "shutdown",
            ErrorKind::InsufficientInput => "insufficient_input",
        };
        write!(f, "{}", s)
    }
}

/// The crate's single error type.
///
/// Carries the classified [`ErrorKind`], a human-readable message, and an
/// optional upstream cause for `source()`/logging.
#[derive(Debug)]
pub struct FlipSyncError {
    pub kind: ErrorKind,
    pub message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl FlipSyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn insufficient_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientInput, message)
    }
}

impl fmt::Display for FlipSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl StdError for FlipSyncError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for FlipSyncError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_status() && err.status().map(|s| s.as_u16()) == Some(429) {
            ErrorKind::RateLimited
        } else if err.is_status() && matches!(err.status().map(|s| s.as_u16()), Some(401) | Some(403)) {
            ErrorKind::Auth
        } else {
            ErrorKind::Transport
        };
        FlipSyncError::with_source(kind, "HTTP request failed", err)
    }
}

impl From<serde_json::Error> for FlipSyncError {
    fn from(err: serde_json::Error) -> Self {
        FlipSyncError::with_source(ErrorKind::Protocol, "failed to parse JSON", err)
    }
}

pub type Result<T> = std::result::Result<T, FlipSyncError>;
