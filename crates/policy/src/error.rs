//! Policy specific errors and diagnostics.
//!
//! None of these abort header emission. They are routed to a
//! [`DiagnosticSink`](crate::diagnostics::DiagnosticSink) so the operator can
//! fix the configuration while responses keep flowing.

use serde::Serialize;

/// How loudly a diagnostic should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The policy still means what the operator probably intended.
    Warning,
    /// Part of the configuration is wrong or could not be applied.
    Error,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unknown request context: {0}")]
    UnknownContext(String),

    #[error("unknown directive: {directive}")]
    UnknownDirective { directive: String },

    #[error("unrecognized source expression: {token}")]
    MalformedSourceExpression { directive: String, token: String },

    #[error("'none' must be the sole source expression")]
    ConflictingNoneKeyword { directive: String },

    #[error("no stored policy record for context {context}")]
    MissingStoredRecord { context: String },

    #[error("directive {directive} is enabled but has an empty value")]
    EmptyDirectiveValue { directive: String },

    #[error("invalid policy configuration: {0}")]
    InvalidConfiguration(String),

    #[error("policy snapshot is not valid JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::Json(err.to_string())
    }
}

impl PolicyError {
    pub fn severity(&self) -> Severity {
        match self {
            PolicyError::EmptyDirectiveValue { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// The directive this error is attributed to, if any.
    pub fn directive(&self) -> Option<&str> {
        match self {
            PolicyError::UnknownDirective { directive }
            | PolicyError::MalformedSourceExpression { directive, .. }
            | PolicyError::ConflictingNoneKeyword { directive }
            | PolicyError::EmptyDirectiveValue { directive } => Some(directive),
            _ => None,
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
