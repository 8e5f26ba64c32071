// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result filtering for image search
//!
//! Filters narrow the ranked list before it is truncated to `max_results`,
//! so a filtered search still returns up to the requested number of hits.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::embedding::ImageRecord;

/// A precompiled glob pattern for efficient repeated matching
#[derive(Debug, Clone)]
pub struct CompiledGlob {
    regex: Regex,
}

impl CompiledGlob {
    /// Compile a glob pattern to a regex
    pub fn new(pattern: &str) -> Option<Self> {
        // `**` matches zero or more path segments, `*` stays within one segment
        let regex_pattern = regex::escape(pattern)
            .replace(r"\*\*/", "{{DOUBLESTARSLASH}}")
            .replace(r"/\*\*", "{{SLASHDOUBLESTAR}}")
            .replace(r"\*\*", ".*")
            .replace(r"\*", "[^/]*")
            .replace(r"\?", "[^/]")
            .replace("{{DOUBLESTARSLASH}}", "(.*/)?")
            .replace("{{SLASHDOUBLESTAR}}", "(/.*)?");

        Regex::new(&format!("(?i){}$", regex_pattern))
            .ok()
            .map(|regex| Self { regex })
    }

    /// Check if a path matches this glob pattern
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Optional constraints applied to ranked search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Glob matched against the file name and the full path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
    /// Keep only images under this directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Keep only images from the named collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Drop results scoring below this similarity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.glob.is_none()
            && self.directory.is_none()
            && self.collection.is_none()
            && self.min_score.is_none()
    }

    /// Precompile the filters for use over a whole result set
    pub fn compile(&self) -> CompiledFilters {
        let glob = self.glob.as_deref().and_then(|pattern| {
            let compiled = CompiledGlob::new(pattern);
            if compiled.is_none() {
                tracing::warn!("Ignoring invalid glob pattern: {}", pattern);
            }
            compiled
        });

        CompiledFilters {
            glob,
            directory: self
                .directory
                .as_deref()
                .map(|d| d.trim_end_matches(['/', '\\']).to_string()),
            collection: self.collection.clone(),
            min_score: self.min_score,
        }
    }
}

/// Filters ready to test records against
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    glob: Option<CompiledGlob>,
    directory: Option<String>,
    collection: Option<String>,
    min_score: Option<f32>,
}

impl CompiledFilters {
    pub fn matches(&self, record: &ImageRecord, score: f32) -> bool {
        if let Some(min) = self.min_score {
            if score < min {
                return false;
            }
        }
        if let Some(collection) = &self.collection {
            if record.collection.as_deref() != Some(collection.as_str()) {
                return false;
            }
        }
        if let Some(dir) = &self.directory {
            if !Path::new(&record.path).starts_with(dir) {
                return false;
            }
        }
        if let Some(glob) = &self.glob {
            if !glob.is_match(&record.name) && !glob.is_match(&record.path) {
                return false;
            }
        }
        true
    }
}
