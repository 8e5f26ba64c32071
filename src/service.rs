// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-level facade over the indexer and search engine
//!
//! Rebuilds go through the shared [`IndexWorker`], so callers never embed
//! images on their own thread.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::embedding::{IndexStatus, IndexStore};
use crate::errors::{IndexError, SearchError, StoreError};
use crate::filters::SearchFilters;
use crate::indexer::{IndexMode, IndexReport, IndexTicket, IndexWorker};
use crate::query::{SearchEngine, SearchResult};

/// Response of `rebuild_index`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildResponse {
    pub total_indexed: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<&IndexReport> for RebuildResponse {
    fn from(report: &IndexReport) -> Self {
        Self {
            total_indexed: report.total_indexed,
            last_updated: report.last_updated,
        }
    }
}

/// Response of `search`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
}

/// The three query operations over one index
pub struct SearchService {
    store: Arc<IndexStore>,
    engine: SearchEngine,
    worker: Arc<IndexWorker>,
    default_max_results: usize,
}

impl SearchService {
    /// The engine should share `worker` so lazy builds run on it too
    pub fn new(worker: Arc<IndexWorker>, engine: SearchEngine, default_max_results: usize) -> Self {
        Self {
            store: worker.indexer().store().clone(),
            worker,
            engine,
            default_max_results,
        }
    }

    /// Rebuild the index and wait for it; `force` discards the existing index
    pub fn rebuild_index(&self, force: bool) -> Result<RebuildResponse, IndexError> {
        let report = self.worker.submit(IndexMode::from_force(force))?.wait()?;
        Ok(RebuildResponse::from(&report))
    }

    /// Queue a rebuild without waiting for it
    pub fn rebuild_index_async(&self, force: bool) -> Result<IndexTicket, IndexError> {
        self.worker.submit(IndexMode::from_force(force))
    }

    pub fn search(
        &self,
        query: &str,
        max_results: Option<usize>,
        filters: Option<&SearchFilters>,
    ) -> Result<SearchResponse, SearchError> {
        let max_results = max_results.unwrap_or(self.default_max_results);
        let results = self.engine.search(query, max_results, filters)?;
        Ok(SearchResponse {
            total: results.len(),
            results,
        })
    }

    pub fn index_status(&self) -> Result<IndexStatus, StoreError> {
        self.store.status()
    }
}
