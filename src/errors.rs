// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the indexing and search pipeline.
//!
//! Library boundaries return these typed errors; the CLI wraps them in
//! `anyhow` with extra context.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce an embedding for one input.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to read image {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding provider failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding provider returned no vector")]
    Empty,

    #[error("embedding has a non-finite value at position {index}")]
    NonFinite { index: usize },

    #[error("embedding provider lock poisoned")]
    Poisoned,
}

/// Failure to load or persist an index snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid index metadata {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read vector matrix {}: {source}", path.display())]
    ReadMatrix {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("failed to write vector matrix {}: {source}", path.display())]
    WriteMatrix {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("index snapshot is inconsistent: {0}")]
    Inconsistent(String),

    #[error("index write lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a whole indexing run.
///
/// Per-image embedding failures never surface here; they are logged and
/// counted in the run report.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("index worker is not running")]
    WorkerGone,
}

/// Failure of a search request.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query text is required")]
    EmptyQuery,

    #[error("max_results must be a positive integer")]
    InvalidMaxResults,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("query embedding has {actual} dimensions but the index has {expected}; rebuild with --force")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to embed query: {0}")]
    Embed(#[from] EmbedError),

    #[error("failed to build index before searching: {0}")]
    Index(#[from] IndexError),
}

impl SearchError {
    /// Returns true when the request itself was invalid.
    pub fn is_user_error(&self) -> bool {
        matches!(self, SearchError::EmptyQuery | SearchError::InvalidMaxResults)
    }
}
