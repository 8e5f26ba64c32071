// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for artgrep
//!
//! Loads configuration from .artgreprc.toml in current directory or ~/.config/artgrep/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::utils::INDEX_DIR;

/// Default number of search results when the caller gives none.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    #[default]
    Builtin,
    Command,
    Dummy,
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "builtin" | "clip" => Ok(EmbeddingProviderType::Builtin),
            "command" => Ok(EmbeddingProviderType::Command),
            "dummy" => Ok(EmbeddingProviderType::Dummy),
            other => Err(format!("Unknown embedding provider: {}", other)),
        }
    }
}

/// A named directory of images to index
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Display name, e.g. "My Photos"
    pub name: String,
    /// Directory to scan
    pub path: PathBuf,
    /// Walk subdirectories (defaults to true)
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

impl CollectionConfig {
    /// Collection for an ad-hoc directory given on the command line
    pub fn from_path(path: impl Into<PathBuf>, recursive: bool) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path,
            recursive,
        }
    }
}

/// Index storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding image_index.json and the vector matrix
    pub dir: Option<PathBuf>,
}

impl IndexConfig {
    /// Get index directory (defaults to ./.artgrep)
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| PathBuf::from(INDEX_DIR))
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default number of results
    pub max_results: Option<usize>,
    /// Build the index on first search when it is empty
    pub build_if_empty: Option<bool>,
}

impl SearchConfig {
    /// Get max results (defaults to 50)
    pub fn max_results(&self) -> usize {
        self.max_results
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_RESULTS)
    }

    /// Get lazy build setting (defaults to true)
    pub fn build_if_empty(&self) -> bool {
        self.build_if_empty.unwrap_or(true)
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, command, dummy)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier reported by the command provider
    pub model: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Vector dimension for the dummy provider
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "clip-vit-b-32")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("clip-vit-b-32")
    }

    /// Get command (defaults to "image-embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("image-embedder")
    }

    /// Get dummy dimension (defaults to 64)
    pub fn dimension(&self) -> usize {
        self.dimension.filter(|&d| d > 0).unwrap_or(64)
    }
}

/// Configuration loaded from .artgreprc.toml or ~/.config/artgrep/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Image collections to index
    pub collections: Vec<CollectionConfig>,

    /// Index storage configuration
    pub index: IndexConfig,

    /// Search configuration
    pub search: SearchConfig,

    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .artgreprc.toml in current directory
    /// 2. ~/.config/artgrep/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(".artgreprc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("artgrep").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Load configuration from an explicit file, failing if it cannot be read
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge CLI max results with config (CLI wins)
    pub fn merge_max_results(&self, cli_value: Option<usize>) -> usize {
        cli_value.unwrap_or_else(|| self.search.max_results())
    }

    /// Collections to index, replaced by CLI paths when any are given
    ///
    /// With neither, the current directory is the only collection.
    pub fn collections_or(&self, cli_paths: &[String], recursive: bool) -> Vec<CollectionConfig> {
        if cli_paths.is_empty() {
            if self.collections.is_empty() {
                return vec![CollectionConfig::from_path(".", recursive)];
            }
            return self.collections.clone();
        }
        cli_paths
            .iter()
            .map(|p| CollectionConfig::from_path(p, recursive))
            .collect()
    }

    /// Get the index configuration
    pub fn index(&self) -> &IndexConfig {
        &self.index
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }
}
