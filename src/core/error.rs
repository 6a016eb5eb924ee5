//! # Error Handling Module
//!
//! This module defines the error taxonomy for the security pipeline using the
//! `thiserror` crate. Every pipeline stage returns a `Result` with a distinct
//! error kind, letting the gateway pattern-match on the specific failure to
//! decide which audit entry to write; there is no exception-style control
//! flow across stages.
//!
//! Two kinds never reach the caller: `PersistenceFailure` is retried
//! internally by the audit logger at the batch level, and `Configuration` only
//! occurs at construction time.

use crate::core::types::{Severity, Violation};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type used throughout the gateway.
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Typed failures produced by the security pipeline.
#[derive(Debug, Error, Clone)]
pub enum SecurityError {
    /// Missing or empty caller identity
    #[error("authentication required: {reason}")]
    AuthRequired { reason: String },

    /// Session expired, or not bound to the presenting caller
    #[error("invalid session: {reason}")]
    InvalidSession { reason: String },

    /// Per-tier admission limit exhausted
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Content failed validation; carries the full violation list
    #[error("validation failed with {} violation(s) at {risk_level} risk", .violations.len())]
    ValidationFailed {
        violations: Vec<Violation>,
        risk_level: Severity,
    },

    /// Threat score crossed the critical threshold; caller is blocked
    #[error("critical threat score {score:.2}, caller blocked until {blocked_until}")]
    ThreatCritical {
        score: f64,
        blocked_until: DateTime<Utc>,
    },

    /// Backend unreachable, errored, or timed out
    #[error("forwarding failed: {reason}")]
    ForwardingFailure { reason: String },

    /// Durable store rejected an audit batch (internal to the audit logger)
    #[error("persistence failure: {reason}")]
    PersistenceFailure { reason: String },

    /// Invalid gateway configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl SecurityError {
    /// Create an authentication error.
    pub fn auth<S: Into<String>>(reason: S) -> Self {
        Self::AuthRequired {
            reason: reason.into(),
        }
    }

    /// Create an invalid-session error.
    pub fn session<S: Into<String>>(reason: S) -> Self {
        Self::InvalidSession {
            reason: reason.into(),
        }
    }

    /// Create a forwarding error.
    pub fn forwarding<S: Into<String>>(reason: S) -> Self {
        Self::ForwardingFailure {
            reason: reason.into(),
        }
    }

    /// Create a persistence error.
    pub fn persistence<S: Into<String>>(reason: S) -> Self {
        Self::PersistenceFailure {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// HTTP-style status code the calling application should surface.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthRequired { .. } => 401,
            Self::InvalidSession { .. } => 401,
            Self::RateLimitExceeded { .. } => 429,
            Self::ValidationFailed { .. } => 422,
            Self::ThreatCritical { .. } => 403,
            Self::ForwardingFailure { .. } => 502,
            Self::PersistenceFailure { .. } => 500,
            Self::Configuration { .. } => 500,
        }
    }

    /// Stable machine-readable label for audit records and API responses.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::AuthRequired { .. } => "auth_required",
            Self::InvalidSession { .. } => "invalid_session",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::ThreatCritical { .. } => "threat_critical",
            Self::ForwardingFailure { .. } => "forwarding_failure",
            Self::PersistenceFailure { .. } => "persistence_failure",
            Self::Configuration { .. } => "configuration_error",
        }
    }

    /// Whether the caller may safely retry the same request.
    ///
    /// Forwarding failures are retried at the caller's discretion, never
    /// internally by the gateway.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ForwardingFailure { .. }
                | Self::PersistenceFailure { .. }
                | Self::RateLimitExceeded { .. }
        )
    }

    /// Severity recorded on the failure audit entry for this error.
    pub fn audit_severity(&self) -> Severity {
        match self {
            Self::AuthRequired { .. } | Self::InvalidSession { .. } => Severity::Medium,
            Self::RateLimitExceeded { .. } => Severity::Medium,
            Self::ValidationFailed { risk_level, .. } => *risk_level,
            Self::ThreatCritical { .. } => Severity::Critical,
            Self::ForwardingFailure { .. } => Severity::Low,
            Self::PersistenceFailure { .. } => Severity::Low,
            Self::Configuration { .. } => Severity::Low,
        }
    }
}

impl From<std::io::Error> for SecurityError {
    fn from(err: std::io::Error) -> Self {
        Self::PersistenceFailure {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SecurityError {
    fn from(err: serde_json::Error) -> Self {
        Self::PersistenceFailure {
            reason: err.to_string(),
        }
    }
}
