//! Core trait definitions for the veritas query pipeline.
//!
//! Two seams separate the planner from the outside world:
//!
//! - `SotBackend`  answers one resolved request against the source of truth
//! - `Transformer` post-processes the combined result set by name
//!
//! The executor resolves everything it can before calling either, so every
//! build-time error surfaces before `SotBackend::fetch()` runs.

use serde_json::Value;

use veritas_contracts::{
    error::VeritasResult,
    request::{Record, SotRequest},
};

/// A client of the source of truth.
///
/// Implementations own transport concerns: authentication, timeouts,
/// retries. Failures are reported as `VeritasError::Transport` with the
/// underlying detail attached; the executor propagates them unchanged.
pub trait SotBackend: Send + Sync {
    /// Run one request and return the records it selects, shaped by
    /// `request.selection`.
    ///
    /// The filter has been bound to the endpoint schema and condensed, so
    /// every field resolves and every operator is valid for its field.
    fn fetch(&self, request: &SotRequest) -> VeritasResult<Vec<Record>>;
}

/// The named post-processing pipeline.
pub trait Transformer: Send + Sync {
    /// Fail with `VeritasError::UnknownTransform` if any name has no
    /// implementation. Called while planning, before any request.
    fn validate(&self, names: &[String]) -> VeritasResult<()>;

    /// Apply the named transforms in order, each consuming the previous
    /// transform's output.
    fn apply(&self, names: &[String], records: Vec<Value>) -> VeritasResult<Vec<Value>>;
}
