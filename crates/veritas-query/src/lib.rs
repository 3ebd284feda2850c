//! # veritas-query
//!
//! The pure, network-free half of the query layer:
//!
//! - [`filter`]: parses `where(...)` expressions into predicate trees and
//!   binds them against an endpoint schema
//! - [`projection`]: resolves `select(...)` field lists and shapes records
//! - [`join`]: plans `join(...)/on(...)` clauses and combines result sets
//!
//! Every function here either returns a value or a build-time
//! `VeritasError`; none of them touch the source of truth.

pub mod filter;
pub mod join;
pub mod projection;

// ── Tests ─────────────────────────────────────────────────────────────────────
