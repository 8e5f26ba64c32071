// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexer module - image discovery, index building and file watching

pub mod index;
pub mod scanner;
pub mod watch;
pub mod worker;

pub use index::{IndexMode, IndexProgress, IndexReport, Indexer, ProgressSnapshot};
pub use scanner::{scan, scan_collections, ImageCandidate, ImageScanner};
pub use worker::{IndexResult, IndexTicket, IndexWorker};
