// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - handles vector embeddings for semantic image search
//!
//! This module provides the embedding providers and the persistent store of
//! image records and their embedding matrix.

pub mod provider;
pub mod storage;

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use provider::ClipEmbedder;
pub use provider::{
    create_provider, l2_normalize, CommandProvider, DummyProvider, EmbeddingProvider,
    SharedProvider,
};
pub use storage::{
    ImageRecord, IndexHistory, IndexRun, IndexSnapshot, IndexStatus, IndexStore, VectorMatrix,
};
