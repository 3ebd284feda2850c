//! Error types for the veritas query layer.
//!
//! All fallible operations return `VeritasResult<T>`. Build-time variants
//! (parse, unknown-*, join resolution, incomplete query) are raised while the
//! query is resolved, before any request reaches the source of truth.

use thiserror::Error;

/// The unified error type for the veritas query layer.
#[derive(Debug, Error)]
pub enum VeritasError {
    /// A filter or join expression is malformed, or an operator is used on a
    /// field whose schema type forbids it.
    #[error("parse error: {reason}")]
    ParseError { reason: String },

    /// A selected or filtered field does not resolve against the endpoint
    /// schema or the custom-field namespace.
    #[error("unknown field '{field}' on endpoint '{endpoint}'")]
    UnknownField { field: String, endpoint: String },

    /// The table named in `using` or `join` is not registered.
    #[error("unknown endpoint '{name}'")]
    UnknownEndpoint { name: String },

    /// A transform name has no registered implementation.
    #[error("unknown transform '{name}'")]
    UnknownTransform { name: String },

    /// A join references an undeclared alias or an unresolvable correlation path.
    #[error("join resolution error: {reason}")]
    JoinResolution { reason: String },

    /// The query descriptor is missing a required clause (e.g. `using`).
    #[error("incomplete query: {reason}")]
    IncompleteQuery { reason: String },

    /// A bound predicate cannot be rendered as a single source-of-truth request.
    #[error("translation error: {reason}")]
    Translation { reason: String },

    /// The source-of-truth client failed. Carries the transport's detail.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl VeritasError {
    /// True for errors that are always raised before any network call.
    pub fn is_build_time(&self) -> bool {
        matches!(
            self,
            VeritasError::ParseError { .. }
                | VeritasError::UnknownField { .. }
                | VeritasError::UnknownEndpoint { .. }
                | VeritasError::UnknownTransform { .. }
                | VeritasError::JoinResolution { .. }
                | VeritasError::IncompleteQuery { .. }
        )
    }
}

/// Convenience alias used throughout the veritas crates.
pub type VeritasResult<T> = Result<T, VeritasError>;
