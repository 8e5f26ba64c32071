// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic image search over the committed index snapshot

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::embedding::{ImageRecord, IndexSnapshot, IndexStore, SharedProvider};
use crate::errors::SearchError;
use crate::filters::SearchFilters;
use crate::indexer::{IndexMode, IndexWorker};

/// One ranked image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub record: ImageRecord,
    /// Cosine similarity between the query and the image, -1.0 to 1.0
    pub similarity_score: f32,
}

/// Ranks indexed images against text queries
pub struct SearchEngine {
    store: Arc<IndexStore>,
    provider: SharedProvider,
    worker: Option<Arc<IndexWorker>>,
    build_if_empty: bool,
}

impl SearchEngine {
    pub fn new(store: Arc<IndexStore>, provider: SharedProvider) -> Self {
        Self {
            store,
            provider,
            worker: None,
            build_if_empty: true,
        }
    }

    /// Worker used to build the index on first use when it is empty
    pub fn with_worker(mut self, worker: Arc<IndexWorker>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn build_if_empty(mut self, enabled: bool) -> Self {
        self.build_if_empty = enabled;
        self
    }

    /// Search for images matching `query`, best match first
    pub fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if max_results == 0 {
            return Err(SearchError::InvalidMaxResults);
        }

        let start = Instant::now();
        let snapshot = self.snapshot()?;
        if snapshot.is_empty() {
            tracing::info!("Index is empty; no images to search");
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed_text(query)?;
        let expected = snapshot.matrix.dimension();
        if query_vector.len() != expected {
            return Err(SearchError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }
        let results = rank(&snapshot, &query_vector, max_results, filters);

        tracing::debug!(
            query,
            results = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(results)
    }

    fn snapshot(&self) -> Result<IndexSnapshot, SearchError> {
        let snapshot = self.store.load()?;
        if !snapshot.is_empty() || !self.build_if_empty {
            return Ok(snapshot);
        }
        let Some(worker) = &self.worker else {
            return Ok(snapshot);
        };

        tracing::info!("Index is empty, building before first search");
        worker.run(IndexMode::Incremental)?;
        Ok(self.store.load()?)
    }
}

/// Score every row against the query vector and keep the best `max_results`
///
/// Ties keep matrix row order. Rows scoring NaN are dropped.
pub fn rank(
    snapshot: &IndexSnapshot,
    query_vector: &[f32],
    max_results: usize,
    filters: Option<&SearchFilters>,
) -> Vec<SearchResult> {
    let compiled = filters.filter(|f| !f.is_empty()).map(SearchFilters::compile);

    let mut scored: Vec<(usize, f32)> = snapshot
        .matrix
        .iter_rows()
        .enumerate()
        .map(|(row, vector)| {
            let score = vector
                .as_slice()
                .map(|v| cosine_similarity(query_vector, v))
                .unwrap_or_else(|| cosine_similarity(query_vector, &vector.to_vec()));
            (row, score)
        })
        .filter(|(_, score)| score.is_finite())
        .filter(|(row, score)| match (&compiled, snapshot.images.get(*row)) {
            (Some(filters), Some(record)) => filters.matches(record, *score),
            (None, Some(_)) => true,
            (_, None) => false,
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(max_results);

    scored
        .into_iter()
        .map(|(row, score)| SearchResult {
            record: snapshot.images[row].clone(),
            similarity_score: score,
        })
        .collect()
}

/// Compute cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DummyProvider;
    use crate::errors::EmbedError;
    use chrono::Utc;

    fn snapshot_with(vectors: &[Vec<f32>]) -> IndexSnapshot {
        let mut snapshot = IndexSnapshot::empty();
        let records = (0..vectors.len())
            .map(|i| ImageRecord {
                path: format!("/img/{}.jpg", i),
                name: format!("{}.jpg", i),
                directory: "/img".to_string(),
                size: 1,
                modified: Utc::now(),
                collection: None,
                embedding_index: i,
            })
            .collect();
        snapshot.append(records, vectors).unwrap();
        snapshot
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn rank_orders_by_score_and_truncates() {
        let snapshot = snapshot_with(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.6, 0.8],
            vec![-1.0, 0.0],
        ]);
        let results = rank(&snapshot, &[1.0, 0.0], 2, None);
        let names: Vec<&str> = results.iter().map(|r| r.record.name.as_str()).collect();
        assert_eq!(names, vec!["1.jpg", "2.jpg"]);
        assert!(results[0].similarity_score >= results[1].similarity_score);

        let all = rank(&snapshot, &[1.0, 0.0], 100, None);
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].record.name, "3.jpg");
    }

    #[test]
    fn rank_keeps_row_order_on_ties() {
        let snapshot = snapshot_with(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]]);
        let results = rank(&snapshot, &[1.0, 0.0], 3, None);
        let rows: Vec<usize> = results.iter().map(|r| r.record.embedding_index).collect();
        assert_eq!(rows, vec![0, 2, 1]);
    }

    #[test]
    fn rank_applies_filters_before_truncation() {
        let snapshot = snapshot_with(&[vec![1.0, 0.0], vec![0.9, 0.1], vec![0.5, 0.5]]);
        let filters = SearchFilters {
            glob: Some("2.jpg".into()),
            ..Default::default()
        };
        let results = rank(&snapshot, &[1.0, 0.0], 1, Some(&filters));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.name, "2.jpg");
    }

    #[test]
    fn search_rejects_bad_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = SearchEngine::new(
            Arc::new(IndexStore::open(dir.path())),
            SharedProvider::from(DummyProvider::new(4)),
        );
        assert!(matches!(
            engine.search("   ", 5, None),
            Err(SearchError::EmptyQuery)
        ));
        assert!(matches!(
            engine.search("cat", 0, None),
            Err(SearchError::InvalidMaxResults)
        ));
        assert!(engine.search("cat", 5, None).unwrap().is_empty());
    }

    #[test]
    fn rank_skips_nan_rows_without_panicking() {
        let vectors: Vec<Vec<f32>> = (0..64)
            .map(|i| {
                if i % 3 == 0 {
                    vec![f32::NAN, 0.0]
                } else {
                    vec![1.0, i as f32 / 64.0]
                }
            })
            .collect();
        let snapshot = snapshot_with(&vectors);

        let results = rank(&snapshot, &[1.0, 0.0], 100, None);
        assert_eq!(results.len(), 42);
        assert!(results.iter().all(|r| r.record.embedding_index % 3 != 0));
        assert!(results
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score));
    }

    fn saved_store(dir: &tempfile::TempDir, dimension: usize) -> Arc<IndexStore> {
        let store = Arc::new(IndexStore::open(dir.path()));
        let mut vector = vec![0.0; dimension];
        vector[0] = 1.0;
        let mut snapshot = snapshot_with(&[vector]);
        snapshot.model = Some(format!("dummy-{}", dimension));
        store.save(&snapshot).unwrap();
        store
    }

    #[test]
    fn query_with_other_dimension_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = SearchEngine::new(
            saved_store(&dir, 4),
            SharedProvider::from(DummyProvider::new(8)),
        );
        assert!(matches!(
            engine.search("cat", 5, None),
            Err(SearchError::DimensionMismatch {
                expected: 4,
                actual: 8
            })
        ));
    }

    struct NanTextProvider;

    impl crate::embedding::EmbeddingProvider for NanTextProvider {
        fn model_id(&self) -> &str {
            "nan-text"
        }

        fn embed_image(&mut self, _path: &std::path::Path) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }

        fn embed_text(&mut self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![0.5, f32::NAN, 0.5, 0.5])
        }
    }

    #[test]
    fn non_finite_query_vector_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = SearchEngine::new(
            saved_store(&dir, 4),
            SharedProvider::new(Box::new(NanTextProvider)),
        );
        assert!(matches!(
            engine.search("cat", 5, None),
            Err(SearchError::Embed(EmbedError::NonFinite { index: 1 }))
        ));
    }

    #[test]
    fn lazy_build_runs_on_the_index_worker() {
        use crate::config::CollectionConfig;
        use crate::indexer::Indexer;

        let dir = tempfile::TempDir::new().unwrap();
        let photos = dir.path().join("photos");
        std::fs::create_dir_all(&photos).unwrap();
        std::fs::write(photos.join("cat.jpg"), "cat").unwrap();

        let store = Arc::new(IndexStore::open(dir.path().join("index")));
        let provider = SharedProvider::from(DummyProvider::new(4));
        let indexer = Arc::new(Indexer::new(
            store.clone(),
            provider.clone(),
            vec![CollectionConfig::from_path(&photos, true)],
        ));
        let worker = Arc::new(IndexWorker::spawn(indexer.clone()));
        let engine = SearchEngine::new(store, provider).with_worker(worker);

        let results = engine.search("cat", 5, None).unwrap();
        assert_eq!(results.len(), 1);
        let progress = indexer.progress().snapshot();
        assert_eq!((progress.current, progress.total), (1, 1));
    }
}
