// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collection watcher that keeps the image index current, with debouncing

use anyhow::{Context, Result};
use colored::Colorize;
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::indexer::{IndexMode, Indexer};
use crate::utils::{is_image_path, INDEX_DIR};

/// Default debounce interval in seconds
pub const DEFAULT_DEBOUNCE_SECS: u64 = 2;

/// Minimum time between reindex operations
const MIN_REINDEX_INTERVAL_SECS: u64 = 5;

/// Pending image changes since the last reindex
#[derive(Debug, Default)]
struct PendingChanges {
    changed: HashSet<PathBuf>,
    removed: HashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl PendingChanges {
    fn record(&mut self, event: &Event) -> bool {
        let removal = matches!(event.kind, EventKind::Remove(_));
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return false;
        }

        let mut relevant = false;
        for path in event.paths.iter().filter(|p| is_watched_image(p)) {
            if removal {
                self.removed.insert(path.clone());
            } else {
                self.changed.insert(path.clone());
            }
            relevant = true;
        }
        if relevant {
            self.last_event = Some(Instant::now());
        }
        relevant
    }

    fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    fn settled(&self, debounce: Duration) -> bool {
        self.last_event
            .map(|t| t.elapsed() >= debounce)
            .unwrap_or(false)
    }

    fn clear(&mut self) {
        self.changed.clear();
        self.removed.clear();
        self.last_event = None;
    }
}

fn is_watched_image(path: &Path) -> bool {
    let in_index_dir = path
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == INDEX_DIR));
    !in_index_dir && is_image_path(path)
}

/// File system watcher over every configured collection
pub struct Watcher {
    indexer: Indexer,
    debounce_duration: Duration,
    min_reindex_interval: Duration,
}

impl Watcher {
    pub fn new(indexer: Indexer) -> Self {
        Self::with_debounce(indexer, DEFAULT_DEBOUNCE_SECS)
    }

    /// Create watcher with custom debounce interval
    pub fn with_debounce(indexer: Indexer, debounce_secs: u64) -> Self {
        Self {
            indexer,
            debounce_duration: Duration::from_secs(debounce_secs),
            min_reindex_interval: Duration::from_secs(MIN_REINDEX_INTERVAL_SECS.max(debounce_secs)),
        }
    }

    /// Start watching for image changes; blocks until the event channel closes
    pub fn watch(&self) -> Result<()> {
        let (tx, rx) = channel();

        let config = NotifyConfig::default().with_poll_interval(Duration::from_secs(2));
        let mut watcher = RecommendedWatcher::new(tx, config)?;

        let mut watched = 0usize;
        for collection in self.indexer.collections() {
            if !collection.path.is_dir() {
                tracing::warn!("Not watching missing directory: {}", collection.path.display());
                continue;
            }
            let mode = if collection.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher
                .watch(&collection.path, mode)
                .with_context(|| format!("Failed to watch {}", collection.path.display()))?;
            println!(
                "{} Watching {} for image changes...",
                "👁".cyan(),
                collection.path.display()
            );
            watched += 1;
        }
        if watched == 0 {
            anyhow::bail!("No existing collection directories to watch");
        }

        println!(
            "  Debounce: {}s, Min interval: {}s",
            self.debounce_duration.as_secs(),
            self.min_reindex_interval.as_secs()
        );
        println!("Press Ctrl+C to stop\n");

        let mut pending = PendingChanges::default();
        let mut last_reindex_time: Option<Instant> = None;

        loop {
            let timeout = if pending.is_empty() {
                Duration::from_secs(60)
            } else {
                self.debounce_duration
            };

            match rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    if pending.record(&event) {
                        tracing::debug!(paths = ?event.paths, kind = ?event.kind, "image change");
                    }
                }
                Ok(Err(e)) => {
                    eprintln!("{} Watch error: {}", "✗".red(), e);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if pending.is_empty() || !pending.settled(self.debounce_duration) {
                continue;
            }
            let can_reindex = last_reindex_time
                .map(|t| t.elapsed() >= self.min_reindex_interval)
                .unwrap_or(true);
            if !can_reindex {
                continue;
            }

            if !pending.removed.is_empty() {
                println!(
                    "{} {} image(s) removed; run `artgrep index --force` to drop them from the index",
                    "!".yellow(),
                    pending.removed.len()
                );
            }
            let changed = pending.changed.len();
            pending.clear();

            if changed > 0 {
                println!("{} {} image(s) changed, reindexing...", "🔄".yellow(), changed);
                match self.indexer.build(IndexMode::Incremental) {
                    Ok(report) => println!(
                        "{} Reindex complete in {:.1}s ({} new, {} total)",
                        "✓".green(),
                        report.duration_ms as f64 / 1000.0,
                        report.embedded,
                        report.total_indexed
                    ),
                    Err(e) => eprintln!("{} Reindex failed: {}", "✗".red(), e),
                }
                last_reindex_time = Some(Instant::now());
            }
        }

        Ok(())
    }
}

/// Run the watch command: build once, then follow changes
pub fn run(indexer: Indexer, debounce_secs: Option<u64>) -> Result<()> {
    let report = indexer.build(IndexMode::Incremental)?;
    println!(
        "{} Index ready: {} images",
        "✓".green(),
        report.total_indexed
    );

    let watcher = match debounce_secs {
        Some(secs) => Watcher::with_debounce(indexer, secs),
        None => Watcher::new(indexer),
    };
    watcher.watch()
}
