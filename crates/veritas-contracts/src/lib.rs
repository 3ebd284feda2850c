//! # veritas-contracts
//!
//! Shared types, schemas, and contracts for the veritas query layer.
//!
//! All crates in the workspace import from here. Only data definitions,
//! small value helpers, and error types live in this crate.

pub mod error;
pub mod filter;
pub mod join;
pub mod net;
pub mod projection;
pub mod query;
pub mod request;
pub mod schema;
