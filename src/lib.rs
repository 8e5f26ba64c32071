// SPDX-License-Identifier: MIT OR Apache-2.0

//! artgrep - Local semantic image search library
//!
//! Scans image collections, embeds each picture with a joint image/text
//! model and ranks the index against natural-language queries.

pub mod config;
pub mod embedding;
pub mod errors;
pub mod filters;
pub mod indexer;
pub mod output;
pub mod query;
pub mod service;
pub mod utils;
