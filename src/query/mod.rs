// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query module - ranks indexed images against text queries

pub mod search;

pub use search::{cosine_similarity, SearchEngine, SearchResult};
