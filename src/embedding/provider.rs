// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! Providers map images and text into one shared vector space. The builtin
//! provider runs both CLIP ViT-B/32 towers through fastembed; the command
//! provider shells out to an external embedder; the dummy provider derives
//! deterministic vectors from content hashes for offline use.

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use std::env;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::errors::EmbedError;

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Generates an L2-normalized embedding for an image file.
    fn embed_image(&mut self, path: &Path) -> Result<Vec<f32>, EmbedError>;

    /// Generates an L2-normalized embedding for a text query.
    fn embed_text(&mut self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Provider shared between the indexer and the search engine.
///
/// The lock is taken per call so a long indexing run never holds it
/// across images.
#[derive(Clone)]
pub struct SharedProvider {
    inner: Arc<Mutex<Box<dyn EmbeddingProvider>>>,
}

impl SharedProvider {
    pub fn new(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(provider)),
        }
    }

    pub fn model_id(&self) -> Result<String, EmbedError> {
        let guard = self.inner.lock().map_err(|_| EmbedError::Poisoned)?;
        Ok(guard.model_id().to_string())
    }

    pub fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let mut guard = self.inner.lock().map_err(|_| EmbedError::Poisoned)?;
        checked(guard.embed_image(path)?)
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut guard = self.inner.lock().map_err(|_| EmbedError::Poisoned)?;
        checked(guard.embed_text(text)?)
    }
}

/// Rejects empty vectors and vectors holding NaN or infinity.
pub fn checked(vector: Vec<f32>) -> Result<Vec<f32>, EmbedError> {
    if vector.is_empty() {
        return Err(EmbedError::Empty);
    }
    match vector.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(EmbedError::NonFinite { index }),
        None => Ok(vector),
    }
}

impl<P: EmbeddingProvider + 'static> From<P> for SharedProvider {
    fn from(provider: P) -> Self {
        Self::new(Box::new(provider))
    }
}

/// Build the provider selected by configuration, honouring env overrides.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<SharedProvider> {
    let kind = match env::var("ARTGREP_EMBED_PROVIDER") {
        Ok(raw) if !raw.trim().is_empty() => raw
            .parse::<EmbeddingProviderType>()
            .map_err(|e| anyhow!(e))?,
        _ => config.provider(),
    };

    let provider: Box<dyn EmbeddingProvider> = match kind {
        EmbeddingProviderType::Builtin => Box::new(builtin_provider()?),
        EmbeddingProviderType::Command => {
            let command = env::var("ARTGREP_EMBED_COMMAND")
                .ok()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| config.command().to_string());
            Box::new(CommandProvider::new(command, config.model().to_string()))
        }
        EmbeddingProviderType::Dummy => {
            let dimension = parse_usize_env("ARTGREP_EMBED_DIM", config.dimension())?;
            Box::new(DummyProvider::new(dimension))
        }
    };

    tracing::debug!(model = provider.model_id(), "embedding provider ready");
    Ok(SharedProvider::new(provider))
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn builtin_provider() -> anyhow::Result<ClipEmbedder> {
    ClipEmbedder::new()
}

#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
fn builtin_provider() -> anyhow::Result<DummyProvider> {
    bail!("The builtin CLIP provider is not available on this platform; use provider = \"command\"")
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use clip::ClipEmbedder;

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
mod clip {
    use super::*;
    use fastembed::{
        EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
        TextEmbedding,
    };

    /// FastEmbed provider using the two towers of openai/clip-vit-base-patch32.
    pub struct ClipEmbedder {
        image: ImageEmbedding,
        text: TextEmbedding,
        model_id: String,
    }

    impl ClipEmbedder {
        pub fn new() -> anyhow::Result<Self> {
            let image = ImageEmbedding::try_new(ImageInitOptions::new(
                ImageEmbeddingModel::ClipVitB32,
            ))
            .context("Failed to initialize CLIP image model")?;
            let text = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::ClipVitB32))
                .context("Failed to initialize CLIP text model")?;

            Ok(Self {
                image,
                text,
                model_id: "clip-vit-b-32".to_string(),
            })
        }
    }

    impl EmbeddingProvider for ClipEmbedder {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn embed_image(&mut self, path: &Path) -> Result<Vec<f32>, EmbedError> {
            // Surface unreadable files as I/O errors rather than opaque decode failures.
            std::fs::metadata(path).map_err(|source| EmbedError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;

            let mut embeddings = self
                .image
                .embed(vec![path.to_path_buf()], None)
                .map_err(|e| EmbedError::Provider(e.into()))?;
            let mut vector = embeddings.pop().ok_or(EmbedError::Empty)?;
            l2_normalize(&mut vector);
            Ok(vector)
        }

        fn embed_text(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
            let mut embeddings = self
                .text
                .embed(vec![text.to_string()], None)
                .map_err(|e| EmbedError::Provider(e.into()))?;
            let mut vector = embeddings.pop().ok_or(EmbedError::Empty)?;
            l2_normalize(&mut vector);
            Ok(vector)
        }
    }
}

/// Command provider that shells out to an external process.
///
/// The command receives `{"model", "mode", "inputs"}` on stdin, where mode
/// is `image` (inputs are file paths) or `text`, and prints either a JSON
/// array of vectors or an object with an `embeddings` field.
pub struct CommandProvider {
    command: String,
    model: String,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self { command, model }
    }

    fn run_command(&self, mode: &str, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "mode": mode,
            "inputs": inputs,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload_str = payload.to_string();
            stdin
                .write_all(payload_str.as_bytes())
                .context("Failed to write embeddings payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_vectors(stdout.trim())
    }

    fn embed_single(&self, mode: &str, input: String) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self
            .run_command(mode, &[input])
            .map_err(EmbedError::Provider)?;
        let mut vector = vectors.pop().ok_or(EmbedError::Empty)?;
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_image(&mut self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        std::fs::metadata(path).map_err(|source| EmbedError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        self.embed_single("image", path.to_string_lossy().to_string())
    }

    fn embed_text(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_single("text", text.to_string())
    }
}

fn parse_vectors(raw: &str) -> anyhow::Result<Vec<Vec<f32>>> {
    let parsed: Value = serde_json::from_str(raw)
        .with_context(|| "Failed to parse embeddings command output as JSON")?;

    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(ref obj) => {
            if let Some(value) = obj.get("embeddings") {
                value.clone()
            } else if let Some(value) = obj.get("vectors") {
                value.clone()
            } else if let Some(value) = obj.get("data") {
                value.clone()
            } else {
                bail!("Embeddings command output missing 'embeddings' field");
            }
        }
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<anyhow::Result<Vec<f32>>>()
        })
        .collect()
}

/// Dummy provider with deterministic content-derived vectors (for testing/offline use).
///
/// Images hash their bytes, text hashes its lowercased words, so identical
/// inputs always land on identical unit vectors.
pub struct DummyProvider {
    model: String,
    dimension: usize,
}

impl DummyProvider {
    /// Creates a new dummy provider with specified dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            model: format!("dummy-{}", dimension),
            dimension: dimension.max(1),
        }
    }

    fn vector_for(&self, bytes: &[u8]) -> Vec<f32> {
        let mut reader = blake3::Hasher::new().update(bytes).finalize_xof();
        let mut buf = vec![0u8; self.dimension * 4];
        reader.fill(&mut buf);

        let mut vector: Vec<f32> = buf
            .chunks_exact(4)
            .map(|b| {
                let raw = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                (raw as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for DummyProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_image(&mut self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let bytes = std::fs::read(path).map_err(|source| EmbedError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.vector_for(&bytes))
    }

    fn embed_text(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let normalized = text.trim().to_lowercase();
        Ok(self.vector_for(normalized.as_bytes()))
    }
}

/// Scale a vector to unit length in place; zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

fn parse_usize_env(name: &str, default: usize) -> anyhow::Result<usize> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(default)
            } else {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {} value: {}", name, value))
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}
