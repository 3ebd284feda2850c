//! # veritas-core
//!
//! The query runtime for veritas.
//!
//! This crate provides:
//! - The two core traits (`SotBackend`, `Transformer`)
//! - The planner that resolves a query descriptor in a fixed order
//! - The `Executor` that plans, fetches, combines and transforms
//! - The fluent `Selection` builder
//! - GraphQL rendering of resolved requests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veritas_core::{Executor, traits::{SotBackend, Transformer}};
//!
//! let executor = Executor::new(registry, Box::new(backend), Box::new(pipeline));
//! let rows = executor
//!     .select("hostname")
//!     .using("nb.devices")
//!     .where_("name__ic=local")?;
//! ```

pub mod executor;
pub mod planner;
pub mod selection;
pub mod traits;
pub mod translate;

pub use executor::Executor;
pub use selection::Selection;
pub use translate::{render_graphql, GraphqlQuery};
