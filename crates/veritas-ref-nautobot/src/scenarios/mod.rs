//! Reference lab scenarios.
//!
//! Each scenario builds a lab executor, runs one family of queries through
//! the full veritas pipeline (parse, bind, plan, fetch, combine, transform)
//! and prints the rows that come back.

pub mod address_owner;
pub mod inventory_query;
pub mod prefix_lookup;
pub mod vlan_join;
