// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed storage for image records and their embedding matrix.
//!
//! A snapshot lives in the index directory as two artifacts:
//!
//! - `embeddings-<generation>.npy`: the dense `rows x dim` f32 matrix
//! - `image_index.json`: the records plus summary fields, naming the
//!   matrix generation it belongs to together with its blake3 hash
//!
//! Matrix generations are immutable. `save` writes a fresh generation and
//! then renames the metadata into place, so the rename is the only commit
//! point and a reader never pairs metadata with a foreign matrix.

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1, Axis};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::errors::StoreError;

/// Metadata file name inside the index directory.
pub const METADATA_FILE: &str = "image_index.json";
/// Run history file name inside the index directory.
pub const HISTORY_FILE: &str = "history.json";

const MATRIX_PREFIX: &str = "embeddings-";
const MATRIX_SUFFIX: &str = ".npy";
const SCHEMA_VERSION: u32 = 1;
const MAX_HISTORY: usize = 5;
const LOAD_ATTEMPTS: usize = 3;

static GENERATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// An indexed image and the matrix row holding its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Absolute file path, unique key
    pub path: String,
    /// File name for display
    pub name: String,
    /// Containing directory
    pub directory: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Configured collection the file was found in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Row of this image in the vector matrix
    pub embedding_index: usize,
}

/// Dense matrix of embeddings, one row per indexed image.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatrix {
    data: Array2<f32>,
}

impl VectorMatrix {
    /// A matrix with no rows.
    pub fn empty(dimension: usize) -> Self {
        Self {
            data: Array2::zeros((0, dimension)),
        }
    }

    /// Builds a matrix from equally sized rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, StoreError> {
        let dimension = rows.first().map(Vec::len).unwrap_or(0);
        let mut flat = Vec::with_capacity(rows.len() * dimension);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dimension {
                return Err(StoreError::Inconsistent(format!(
                    "row {} has {} dimensions, expected {}",
                    i,
                    row.len(),
                    dimension
                )));
            }
            flat.extend_from_slice(row);
        }

        let data = Array2::from_shape_vec((rows.len(), dimension), flat)
            .map_err(|e| StoreError::Inconsistent(e.to_string()))?;
        Ok(Self { data })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn dimension(&self) -> usize {
        self.data.ncols()
    }

    pub fn row(&self, index: usize) -> Option<ArrayView1<'_, f32>> {
        (index < self.rows()).then(|| self.data.row(index))
    }

    /// Iterates rows in index order.
    pub fn iter_rows(&self) -> impl Iterator<Item = ArrayView1<'_, f32>> {
        self.data.outer_iter()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    /// Appends rows after all existing rows; existing row numbers never change.
    pub fn append_rows(&mut self, rows: &[Vec<f32>]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let new = Self::from_rows(rows)?;
        if self.rows() == 0 {
            *self = new;
            return Ok(());
        }
        if new.dimension() != self.dimension() {
            return Err(StoreError::Inconsistent(format!(
                "cannot append {}-dimensional rows to a {}-dimensional matrix",
                new.dimension(),
                self.dimension()
            )));
        }
        self.data
            .append(Axis(0), new.data.view())
            .map_err(|e| StoreError::Inconsistent(e.to_string()))
    }
}

/// Everything persisted for one index: records, matrix and summary fields.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    /// Records ordered by `embedding_index`
    pub images: Vec<ImageRecord>,
    pub matrix: VectorMatrix,
    pub last_updated: Option<DateTime<Utc>>,
    /// Model that produced the vectors
    pub model: Option<String>,
}

impl Default for IndexSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl IndexSnapshot {
    /// Zero records, zero rows, no timestamp.
    pub fn empty() -> Self {
        Self {
            images: Vec::new(),
            matrix: VectorMatrix::empty(0),
            last_updated: None,
            model: None,
        }
    }

    pub fn total_indexed(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Vector dimension, known once at least one row exists.
    pub fn dimension(&self) -> Option<usize> {
        (self.matrix.rows() > 0).then(|| self.matrix.dimension())
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.images.iter().any(|r| r.path == path)
    }

    /// Appends records and their vectors as new trailing rows.
    ///
    /// Each record must already carry the row number it will occupy.
    pub fn append(
        &mut self,
        records: Vec<ImageRecord>,
        vectors: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if records.len() != vectors.len() {
            return Err(StoreError::Inconsistent(format!(
                "{} records staged with {} vectors",
                records.len(),
                vectors.len()
            )));
        }
        let base = self.images.len();
        for (offset, record) in records.iter().enumerate() {
            if record.embedding_index != base + offset {
                return Err(StoreError::Inconsistent(format!(
                    "{} staged for row {}, next free row is {}",
                    record.path,
                    record.embedding_index,
                    base + offset
                )));
            }
        }

        self.matrix.append_rows(vectors)?;
        self.images.extend(records);
        Ok(())
    }

    /// Checks the record/row invariant: row count equals record count and
    /// record `i` owns row `i`.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.matrix.rows() != self.images.len() {
            return Err(StoreError::Inconsistent(format!(
                "{} records but {} matrix rows",
                self.images.len(),
                self.matrix.rows()
            )));
        }
        for (row, record) in self.images.iter().enumerate() {
            if record.embedding_index != row {
                return Err(StoreError::Inconsistent(format!(
                    "row {} is claimed by {} with embedding_index {}",
                    row, record.path, record.embedding_index
                )));
            }
        }
        Ok(())
    }
}

/// Summary returned by the status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub indexed: bool,
    pub total_indexed: usize,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

/// One finished indexing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRun {
    pub completed_at: DateTime<Utc>,
    pub mode: String,
    pub duration_seconds: f64,
    pub embedded: usize,
    pub failed: usize,
    pub total_indexed: usize,
}

/// The most recent runs, used to estimate how long the next one takes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexHistory {
    pub executions: Vec<IndexRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_duration_seconds: Option<f64>,
}

impl IndexHistory {
    fn push(&mut self, run: IndexRun) {
        self.executions.push(run);
        if self.executions.len() > MAX_HISTORY {
            let excess = self.executions.len() - MAX_HISTORY;
            self.executions.drain(..excess);
        }
        let total: f64 = self.executions.iter().map(|r| r.duration_seconds).sum();
        self.average_duration_seconds = Some(total / self.executions.len() as f64);
    }
}

/// On-disk layout of `image_index.json`.
#[derive(Debug, Serialize, Deserialize)]
struct IndexMetadata {
    version: u32,
    images: Vec<ImageRecord>,
    total_indexed: usize,
    last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    matrix_file: Option<String>,
    #[serde(default)]
    matrix_rows: usize,
    #[serde(default)]
    matrix_hash: Option<String>,
}

/// Persistent index store rooted at one directory.
pub struct IndexStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    commit_lock: Mutex<()>,
}

impl IndexStore {
    /// Opens a store; nothing is created until the first save.
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            commit_lock: Mutex::new(()),
        }
    }

    /// Returns the index directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Whether a snapshot has ever been saved here.
    pub fn exists(&self) -> bool {
        self.metadata_path().is_file()
    }

    /// Serialises load-modify-save sequences within this process.
    ///
    /// Readers never take this lock; they see the last committed snapshot.
    pub fn lock_for_write(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Loads the committed snapshot, or an empty one if none was ever saved.
    pub fn load(&self) -> Result<IndexSnapshot, StoreError> {
        let mut attempt = 1;
        loop {
            match self.try_load() {
                // A concurrent save pruned the generation we were about to read.
                Err(StoreError::Io { ref source, .. })
                    if source.kind() == ErrorKind::NotFound && attempt < LOAD_ATTEMPTS =>
                {
                    tracing::debug!(attempt, "matrix generation vanished, reloading");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn try_load(&self) -> Result<IndexSnapshot, StoreError> {
        let Some(meta) = self.read_metadata()? else {
            return Ok(IndexSnapshot::empty());
        };

        let matrix = match meta.matrix_file.as_deref() {
            Some(file) => {
                let path = self.dir.join(file);
                let bytes = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
                if let Some(expected) = meta.matrix_hash.as_deref() {
                    let actual = blake3::hash(&bytes).to_hex();
                    if actual.as_str() != expected {
                        return Err(StoreError::Inconsistent(format!(
                            "{} does not match the hash recorded in {}",
                            file, METADATA_FILE
                        )));
                    }
                }
                let data = Array2::<f32>::read_npy(Cursor::new(bytes))
                    .map_err(|source| StoreError::ReadMatrix { path, source })?;
                VectorMatrix { data }
            }
            None if meta.images.is_empty() => VectorMatrix::empty(meta.dimension),
            None => {
                return Err(StoreError::Inconsistent(format!(
                    "{} records but no matrix file",
                    meta.images.len()
                )))
            }
        };

        if matrix.rows() != meta.matrix_rows || meta.total_indexed != meta.images.len() {
            return Err(StoreError::Inconsistent(format!(
                "metadata lists {} records ({} total_indexed, {} rows) but matrix has {} rows",
                meta.images.len(),
                meta.total_indexed,
                meta.matrix_rows,
                matrix.rows()
            )));
        }

        let mut images = meta.images;
        images.sort_by_key(|r| r.embedding_index);
        let snapshot = IndexSnapshot {
            images,
            matrix,
            last_updated: meta.last_updated,
            model: meta.model,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn read_metadata(&self) -> Result<Option<IndexMetadata>, StoreError> {
        let path = self.metadata_path();
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StoreError::Metadata { path, source })
    }

    /// Persists a snapshot; matrix and records become visible together.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<(), StoreError> {
        snapshot.validate()?;
        let _commit = self.commit_lock.lock().map_err(|_| StoreError::Poisoned)?;

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let matrix_file = next_generation_name();
        let matrix_path = self.dir.join(&matrix_file);
        let mut buf = Vec::new();
        snapshot
            .matrix
            .as_array()
            .write_npy(&mut buf)
            .map_err(|source| StoreError::WriteMatrix {
                path: matrix_path.clone(),
                source,
            })?;
        let matrix_hash = blake3::hash(&buf).to_hex().to_string();
        write_durably(&matrix_path, &buf)?;

        let previous = self.read_metadata().ok().flatten().and_then(|m| m.matrix_file);

        let meta = IndexMetadata {
            version: SCHEMA_VERSION,
            images: snapshot.images.clone(),
            total_indexed: snapshot.total_indexed(),
            last_updated: snapshot.last_updated,
            model: snapshot.model.clone(),
            dimension: snapshot.matrix.dimension(),
            matrix_file: Some(matrix_file.clone()),
            matrix_rows: snapshot.matrix.rows(),
            matrix_hash: Some(matrix_hash),
        };
        let meta_path = self.metadata_path();
        let json = serde_json::to_vec_pretty(&meta).map_err(|source| StoreError::Metadata {
            path: meta_path.clone(),
            source,
        })?;

        let tmp_path = self
            .dir
            .join(format!("{}.{}.tmp", METADATA_FILE, std::process::id()));
        let committed = write_durably(&tmp_path, &json).and_then(|_| {
            fs::rename(&tmp_path, &meta_path).map_err(|e| StoreError::io(&meta_path, e))
        });
        if let Err(err) = committed {
            let _ = fs::remove_file(&tmp_path);
            let _ = fs::remove_file(&matrix_path);
            return Err(err);
        }

        self.prune_generations(&matrix_file, previous.as_deref());
        tracing::debug!(
            rows = snapshot.matrix.rows(),
            file = %matrix_file,
            "index snapshot committed"
        );
        Ok(())
    }

    /// Removes matrix generations older than the previous committed one.
    fn prune_generations(&self, current: &str, previous: Option<&str>) {
        let Some(previous) = previous else { return };
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", self.dir.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(MATRIX_PREFIX) || !name.ends_with(MATRIX_SUFFIX) {
                continue;
            }
            if name == current || name.as_str() >= previous {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::warn!("Failed to remove stale matrix {}: {}", name, e);
            }
        }
    }

    /// Reads the summary fields without loading the matrix.
    pub fn status(&self) -> Result<IndexStatus, StoreError> {
        Ok(match self.read_metadata()? {
            Some(meta) => IndexStatus {
                indexed: true,
                total_indexed: meta.total_indexed,
                last_updated: meta.last_updated,
                model: meta.model,
                dimension: (meta.matrix_rows > 0).then_some(meta.dimension),
            },
            None => IndexStatus {
                indexed: false,
                total_indexed: 0,
                last_updated: None,
                model: None,
                dimension: None,
            },
        })
    }

    /// Loads the run history; missing history is empty.
    pub fn load_history(&self) -> Result<IndexHistory, StoreError> {
        let path = self.dir.join(HISTORY_FILE);
        match fs::read(&path) {
            Ok(raw) => {
                serde_json::from_slice(&raw).map_err(|source| StoreError::Metadata { path, source })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(IndexHistory::default()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Appends a run to the history, keeping the most recent five.
    pub fn record_run(&self, run: IndexRun) -> Result<IndexHistory, StoreError> {
        let mut history = self.load_history().unwrap_or_default();
        history.push(run);

        let path = self.dir.join(HISTORY_FILE);
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let json = serde_json::to_vec_pretty(&history).map_err(|source| StoreError::Metadata {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|e| StoreError::io(&path, e))?;
        Ok(history)
    }
}

/// Sortable, process-unique matrix file name.
fn next_generation_name() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0);
    let seq = GENERATION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}{:020}-{}-{}{}",
        MATRIX_PREFIX,
        nanos,
        std::process::id(),
        seq,
        MATRIX_SUFFIX
    )
}

fn write_durably(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    file.write_all(bytes).map_err(|e| StoreError::io(path, e))?;
    file.sync_all().map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, index: usize) -> ImageRecord {
        ImageRecord {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            directory: "/photos".to_string(),
            size: 10,
            modified: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            collection: None,
            embedding_index: index,
        }
    }

    fn snapshot_with(paths: &[&str]) -> IndexSnapshot {
        let mut snapshot = IndexSnapshot::empty();
        let records = paths
            .iter()
            .enumerate()
            .map(|(i, p)| record(p, i))
            .collect();
        let vectors: Vec<Vec<f32>> = (0..paths.len())
            .map(|i| vec![i as f32, 1.0, 0.0])
            .collect();
        snapshot.append(records, &vectors).unwrap();
        snapshot.model = Some("test".to_string());
        snapshot
    }

    fn matrix_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(MATRIX_PREFIX))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_load_missing_returns_empty_snapshot() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("index"));

        let snapshot = store.load().unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.matrix.rows(), 0);
        assert!(snapshot.last_updated.is_none());
        assert!(!store.exists());

        let status = store.status().unwrap();
        assert!(!status.indexed);
        assert_eq!(status.total_indexed, 0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path());
        let mut snapshot = snapshot_with(&["/photos/a.jpg", "/photos/b.png"]);
        snapshot.last_updated = Some(Utc::now());

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.matrix.rows(), loaded.images.len());
        let status = store.status().unwrap();
        assert!(status.indexed);
        assert_eq!(status.total_indexed, 2);
        assert_eq!(status.dimension, Some(3));
    }

    #[test]
    fn test_append_keeps_existing_rows() {
        let mut snapshot = snapshot_with(&["/a.jpg", "/b.jpg"]);
        let before = snapshot.matrix.row(1).unwrap().to_vec();

        snapshot
            .append(vec![record("/c.jpg", 2)], &[vec![9.0, 9.0, 9.0]])
            .unwrap();

        assert_eq!(snapshot.matrix.rows(), 3);
        assert_eq!(snapshot.matrix.row(1).unwrap().to_vec(), before);
        assert_eq!(snapshot.matrix.row(2).unwrap().to_vec(), vec![9.0, 9.0, 9.0]);
        snapshot.validate().unwrap();
    }

    #[test]
    fn test_append_rejects_wrong_row_claims() {
        let mut snapshot = snapshot_with(&["/a.jpg"]);
        let err = snapshot
            .append(vec![record("/b.jpg", 0)], &[vec![1.0, 0.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));

        let err = snapshot
            .append(vec![record("/b.jpg", 1)], &[vec![1.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
        assert_eq!(snapshot.total_indexed(), 1);
        snapshot.validate().unwrap();
    }

    #[test]
    fn test_tampered_matrix_is_detected() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path());
        store.save(&snapshot_with(&["/a.jpg", "/b.jpg"])).unwrap();

        let replacement = snapshot_with(&["/a.jpg"]);
        let mut buf = Vec::new();
        replacement.matrix.as_array().write_npy(&mut buf).unwrap();
        let file = &matrix_files(dir.path())[0];
        fs::write(dir.path().join(file), buf).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
    }

    #[test]
    fn test_mismatched_row_count_is_detected() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path());
        store.save(&snapshot_with(&["/a.jpg", "/b.jpg"])).unwrap();

        let path = store.metadata_path();
        let mut meta: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        meta["images"].as_array_mut().unwrap().pop();
        meta["total_indexed"] = serde_json::json!(1);
        fs::write(&path, serde_json::to_vec(&meta).unwrap()).unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            StoreError::Inconsistent(_)
        ));
    }

    #[test]
    fn test_save_keeps_previous_generation_only() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path());

        store.save(&snapshot_with(&["/a.jpg"])).unwrap();
        store.save(&snapshot_with(&["/a.jpg", "/b.jpg"])).unwrap();
        store
            .save(&snapshot_with(&["/a.jpg", "/b.jpg", "/c.jpg"]))
            .unwrap();

        assert_eq!(matrix_files(dir.path()).len(), 2);
        assert_eq!(store.load().unwrap().total_indexed(), 3);
    }

    #[test]
    fn test_save_rejects_invalid_snapshot() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path());
        let mut snapshot = snapshot_with(&["/a.jpg"]);
        snapshot.images.push(record("/b.jpg", 1));

        assert!(store.save(&snapshot).is_err());
        assert!(!store.exists());
    }

    #[test]
    fn test_history_keeps_last_five_runs() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path());

        for i in 0..7 {
            store
                .record_run(IndexRun {
                    completed_at: Utc::now(),
                    mode: "incremental".to_string(),
                    duration_seconds: i as f64,
                    embedded: i,
                    failed: 0,
                    total_indexed: i,
                })
                .unwrap();
        }

        let history = store.load_history().unwrap();
        assert_eq!(history.executions.len(), 5);
        assert_eq!(history.executions[0].embedded, 2);
        assert_eq!(history.average_duration_seconds, Some(4.0));
    }
}
