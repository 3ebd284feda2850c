//! # veritas-transform
//!
//! Named post-processing for veritas query results.
//!
//! This crate provides [`engine::TransformPipeline`], which implements the
//! [`veritas_core::traits::Transformer`] trait. Transforms run in the order
//! the query names them, each consuming the previous one's output:
//!
//! - `remove_id`: drop every `id` key, nested ones included
//! - `to_pandas` / `to_table`: flatten records into dotted-column rows
//! - `values_only`: keep only each record's values, in order
//! - `ipaddress_to_device`: re-root address records to their owning device
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use veritas_transform::TransformPipeline;
//!
//! let mut pipeline = TransformPipeline::new();
//! pipeline.register("first_only", Box::new(|mut records: Vec<serde_json::Value>| {
//!     records.truncate(1);
//!     Ok::<_, veritas_contracts::error::VeritasError>(records)
//! }));
//! ```

pub mod builtins;
pub mod engine;

pub use engine::{TransformFn, TransformPipeline};

// ── Tests ─────────────────────────────────────────────────────────────────────
