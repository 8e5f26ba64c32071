// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image file scanner using the ignore crate (same walker as ripgrep)

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::config::CollectionConfig;
use crate::embedding::ImageRecord;
use crate::utils::{absolute_path, is_image_path, system_time_to_utc, INDEX_DIR};

/// Image file found on disk, not yet indexed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCandidate {
    pub path: PathBuf,
    pub name: String,
    pub directory: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl ImageCandidate {
    /// String form of the path used as the record key
    pub fn key(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Turn the candidate into a record occupying the given matrix row
    pub fn into_record(self, embedding_index: usize) -> ImageRecord {
        ImageRecord {
            path: self.key(),
            name: self.name,
            directory: self.directory,
            size: self.size,
            modified: self.modified,
            collection: self.collection,
            embedding_index,
        }
    }
}

/// Image scanner over one directory tree
pub struct ImageScanner {
    root: PathBuf,
    recursive: bool,
}

impl ImageScanner {
    pub fn new(root: impl AsRef<Path>, recursive: bool) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            recursive,
        }
    }

    /// Scan for image files. A missing root yields an empty list.
    ///
    /// Entries that fail (permission denied, vanished files) are logged
    /// and skipped. Order is not stable across calls.
    pub fn scan(&self) -> Vec<ImageCandidate> {
        if !self.root.is_dir() {
            tracing::warn!("Directory does not exist: {}", self.root.display());
            return Vec::new();
        }
        let root = absolute_path(&self.root);

        let (tx, rx) = mpsc::channel();

        let walker = WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(true)
            .max_depth(if self.recursive { None } else { Some(1) })
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| name != INDEX_DIR)
                    .unwrap_or(true)
            })
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();

            Box::new(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!("Skipping unreadable entry: {}", err);
                        return ignore::WalkState::Continue;
                    }
                };

                let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                if !is_file || !is_image_path(entry.path()) {
                    return ignore::WalkState::Continue;
                }

                match candidate_for(entry.path()) {
                    Ok(candidate) => {
                        let _ = tx.send(candidate);
                    }
                    Err(err) => {
                        tracing::warn!("Skipping {}: {}", entry.path().display(), err);
                    }
                }
                ignore::WalkState::Continue
            })
        });

        drop(tx);
        let candidates: Vec<ImageCandidate> = rx.into_iter().collect();
        tracing::info!(
            "Found {} images in {}",
            candidates.len(),
            self.root.display()
        );
        candidates
    }
}

fn candidate_for(path: &Path) -> std::io::Result<ImageCandidate> {
    let metadata = std::fs::metadata(path)?;
    let modified = system_time_to_utc(metadata.modified()?);

    Ok(ImageCandidate {
        path: path.to_path_buf(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        directory: path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
        size: metadata.len(),
        modified,
        collection: None,
    })
}

/// Scan a directory for image files
pub fn scan(directory: impl AsRef<Path>, recursive: bool) -> Vec<ImageCandidate> {
    ImageScanner::new(directory, recursive).scan()
}

/// Scan every collection, tagging candidates and dropping duplicate paths
///
/// When collections overlap, the first collection listed keeps the file.
pub fn scan_collections(collections: &[CollectionConfig]) -> Vec<ImageCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for collection in collections {
        for mut candidate in scan(&collection.path, collection.recursive) {
            if seen.insert(candidate.path.clone()) {
                candidate.collection = Some(collection.name.clone());
                candidates.push(candidate);
            }
        }
    }

    candidates
}
