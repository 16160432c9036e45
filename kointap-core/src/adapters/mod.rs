//! Adapter implementations
//!
//! Concrete backends for the ports: the DuckDB store that owns every table
//! and the local identity provider that sits on top of it.

pub mod duckdb;
pub mod local_identity;
