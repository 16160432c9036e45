//! Compact service - database compaction

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbStore;

/// Compact service for database maintenance
pub struct CompactService {
    store: Arc<DuckDbStore>,
}

impl CompactService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Compact the database
    pub fn compact(&self) -> Result<CompactResult> {
        let original_size = self.store.get_db_size()?;

        self.store.compact()?;

        let compacted_size = self.store.get_db_size()?;

        Ok(CompactResult {
            original_size,
            compacted_size,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CompactResult {
    pub original_size: u64,
    pub compacted_size: u64,
}
