//! Query service - read-only SQL access

use std::sync::Arc;

use anyhow::Result;

use crate::adapters::duckdb::{DuckDbStore, QueryResult};

/// Query service for SQL execution
pub struct QueryService {
    store: Arc<DuckDbStore>,
}

impl QueryService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Execute a SQL query. Only single SELECT statements are allowed.
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        Ok(self.store.execute_query(sql)?)
    }
}
