// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index builder: scans collections, embeds new images and commits the snapshot

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::CollectionConfig;
use crate::embedding::{IndexRun, IndexSnapshot, IndexStore, SharedProvider};
use crate::errors::{EmbedError, IndexError};
use crate::indexer::scanner::{scan_collections, ImageCandidate};

/// How an indexing run treats the existing snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Embed only images whose path is not indexed yet; existing rows stay put
    #[default]
    Incremental,
    /// Discard the snapshot and embed every image again
    Full,
}

impl IndexMode {
    pub fn from_force(force: bool) -> Self {
        if force {
            IndexMode::Full
        } else {
            IndexMode::Incremental
        }
    }
}

impl std::fmt::Display for IndexMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexMode::Incremental => write!(f, "incremental"),
            IndexMode::Full => write!(f, "full"),
        }
    }
}

/// Outcome of one indexing run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub total_indexed: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub mode: IndexMode,
    /// Image files found by the scanner
    pub scanned: usize,
    /// Images embedded and added in this run
    pub embedded: usize,
    /// Images that could not be embedded
    pub failed: usize,
    /// Images already indexed and left untouched
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Live progress of the running build, readable from other threads
#[derive(Debug, Default)]
pub struct IndexProgress {
    current: AtomicUsize,
    total: AtomicUsize,
    current_image: Mutex<Option<String>>,
}

/// Point-in-time copy of [`IndexProgress`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub current: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_image: Option<String>,
}

impl IndexProgress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current: self.current.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            current_image: self
                .current_image
                .lock()
                .map(|name| name.clone())
                .unwrap_or_default(),
        }
    }

    fn start(&self, total: usize) {
        self.current.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        self.set_image(None);
    }

    fn advance(&self, image: &str) {
        self.set_image(Some(image.to_string()));
    }

    fn finish_item(&self) {
        self.current.fetch_add(1, Ordering::Relaxed);
    }

    fn set_image(&self, image: Option<String>) {
        if let Ok(mut guard) = self.current_image.lock() {
            *guard = image;
        }
    }
}

/// Builds and updates the image index
pub struct Indexer {
    store: Arc<IndexStore>,
    provider: SharedProvider,
    collections: Vec<CollectionConfig>,
    show_progress: bool,
    progress: Arc<IndexProgress>,
}

impl Indexer {
    pub fn new(
        store: Arc<IndexStore>,
        provider: SharedProvider,
        collections: Vec<CollectionConfig>,
    ) -> Self {
        Self {
            store,
            provider,
            collections,
            show_progress: false,
            progress: Arc::new(IndexProgress::default()),
        }
    }

    /// Show a progress bar on stderr while embedding
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn collections(&self) -> &[CollectionConfig] {
        &self.collections
    }

    pub fn progress(&self) -> &Arc<IndexProgress> {
        &self.progress
    }

    /// Scan all collections and bring the index up to date
    ///
    /// Only one build per store runs at a time; searches keep reading the
    /// last committed snapshot meanwhile.
    pub fn build(&self, mode: IndexMode) -> Result<IndexReport, IndexError> {
        let started = Instant::now();
        let _guard = self.store.lock_for_write()?;

        if self.collections.is_empty() {
            tracing::warn!("No image collections configured; nothing to scan");
        }
        let candidates = scan_collections(&self.collections);
        self.build_locked(candidates, mode, started)
    }

    fn build_locked(
        &self,
        candidates: Vec<ImageCandidate>,
        requested: IndexMode,
        started: Instant,
    ) -> Result<IndexReport, IndexError> {
        let model = match self.provider.model_id() {
            Ok(model) => Some(model),
            Err(err) => {
                tracing::warn!("Cannot read provider model id: {}", err);
                None
            }
        };

        let mut mode = requested;
        let mut snapshot = match mode {
            IndexMode::Full => IndexSnapshot::empty(),
            IndexMode::Incremental => self.store.load()?,
        };

        if mode == IndexMode::Incremental
            && !snapshot.is_empty()
            && model.is_some()
            && snapshot.model.is_some()
            && snapshot.model != model
        {
            tracing::warn!(
                "Index was built with model {:?} but provider is {:?}; rebuilding from scratch",
                snapshot.model,
                model
            );
            mode = IndexMode::Full;
            snapshot = IndexSnapshot::empty();
        }

        let scanned = candidates.len();
        let existing: HashSet<&str> = snapshot.images.iter().map(|r| r.path.as_str()).collect();
        let pending: Vec<ImageCandidate> = candidates
            .iter()
            .filter(|c| !existing.contains(c.key().as_str()))
            .cloned()
            .collect();
        drop(existing);
        let skipped = scanned - pending.len();

        if pending.is_empty() && mode == IndexMode::Incremental {
            tracing::info!("No new images to process");
            return Ok(IndexReport {
                total_indexed: snapshot.total_indexed(),
                last_updated: snapshot.last_updated,
                mode,
                scanned,
                embedded: 0,
                failed: 0,
                skipped,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        tracing::info!("Processing {} images ({} mode)", pending.len(), mode);

        let base = snapshot.total_indexed();
        let indexed_dim = snapshot.dimension();
        let mut expected_dim = indexed_dim;
        let mut records = Vec::with_capacity(pending.len());
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(pending.len());
        let mut failed = 0usize;

        self.progress.start(pending.len());
        let pb = self.progress_bar(pending.len() as u64);
        for candidate in pending {
            pb.set_message(candidate.name.clone());
            self.progress.advance(&candidate.name);

            let embedded = self.provider.embed_image(&candidate.path).and_then(|vector| {
                match expected_dim {
                    Some(expected) if expected != vector.len() => Err(EmbedError::Dimension {
                        expected,
                        actual: vector.len(),
                    }),
                    _ => Ok(vector),
                }
            });

            match embedded {
                Ok(vector) => {
                    expected_dim.get_or_insert(vector.len());
                    let index = base + vectors.len();
                    tracing::debug!(path = %candidate.path.display(), index, "embedded");
                    records.push(candidate.into_record(index));
                    vectors.push(vector);
                }
                Err(EmbedError::Dimension { expected, actual })
                    if mode == IndexMode::Incremental
                        && vectors.is_empty()
                        && indexed_dim == Some(expected) =>
                {
                    pb.finish_and_clear();
                    tracing::warn!(
                        "Index holds {}-dimensional vectors but provider returns {}; rebuilding from scratch",
                        expected,
                        actual
                    );
                    return self.build_locked(candidates, IndexMode::Full, started);
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!("Skipping {}: {}", candidate.path.display(), err);
                }
            }
            self.progress.finish_item();
            pb.inc(1);
        }
        pb.finish_and_clear();
        self.progress.set_image(None);

        let embedded = vectors.len();
        if embedded == 0 && mode == IndexMode::Incremental {
            tracing::info!("No new images could be embedded; index left unchanged");
            return Ok(IndexReport {
                total_indexed: snapshot.total_indexed(),
                last_updated: snapshot.last_updated,
                mode,
                scanned,
                embedded,
                failed,
                skipped,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        snapshot.append(records, &vectors)?;
        let completed_at = Utc::now();
        snapshot.last_updated = Some(completed_at);
        if model.is_some() {
            snapshot.model = model;
        }
        self.store.save(&snapshot)?;

        let duration = started.elapsed();
        tracing::info!(
            "Image index built: {} images indexed ({} new, {} failed)",
            snapshot.total_indexed(),
            embedded,
            failed
        );

        let run = IndexRun {
            completed_at,
            mode: mode.to_string(),
            duration_seconds: duration.as_secs_f64(),
            embedded,
            failed,
            total_indexed: snapshot.total_indexed(),
        };
        if let Err(err) = self.store.record_run(run) {
            tracing::warn!("Failed to record index run: {}", err);
        }

        Ok(IndexReport {
            total_indexed: snapshot.total_indexed(),
            last_updated: snapshot.last_updated,
            mode,
            scanned,
            embedded,
            failed,
            skipped,
            duration_ms: duration.as_millis() as u64,
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} images | Embedding {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##.");
        pb.set_style(style);
        pb
    }
}
