// SPDX-License-Identifier: MIT OR Apache-2.0

use artgrep::config::CollectionConfig;
use artgrep::embedding::{l2_normalize, EmbeddingProvider, IndexStore, SharedProvider};
use artgrep::errors::{EmbedError, SearchError};
use artgrep::indexer::{IndexMode, IndexWorker, Indexer};
use artgrep::query::SearchEngine;
use artgrep::service::SearchService;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const VOCAB: &[&str] = &["red", "barn", "blue", "ocean", "cat", "dog", "sunset", "forest"];

/// Bag-of-words provider: an image "shows" the words in its file stem
struct KeywordProvider {
    image_calls: Arc<AtomicUsize>,
}

fn bag_of_words<'a>(words: impl Iterator<Item = &'a str>) -> Vec<f32> {
    let mut vector = vec![0.0; VOCAB.len() + 1];
    vector[VOCAB.len()] = 0.1;
    for word in words {
        if let Some(pos) = VOCAB.iter().position(|v| *v == word) {
            vector[pos] += 1.0;
        }
    }
    l2_normalize(&mut vector);
    vector
}

impl EmbeddingProvider for KeywordProvider {
    fn model_id(&self) -> &str {
        "keywords"
    }

    fn embed_image(&mut self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_lowercase();
        if stem.contains("corrupt") {
            return Err(EmbedError::Provider(anyhow::anyhow!("cannot decode image")));
        }
        Ok(bag_of_words(stem.split('_')))
    }

    fn embed_text(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let text = text.to_lowercase();
        Ok(bag_of_words(text.split_whitespace()))
    }
}

struct Harness {
    _dir: TempDir,
    images: PathBuf,
    store: Arc<IndexStore>,
    calls: Arc<AtomicUsize>,
    service: SearchService,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let images = dir.path().join("images");
        fs::create_dir_all(&images).expect("images dir");

        let calls = Arc::new(AtomicUsize::new(0));
        let provider = SharedProvider::from(KeywordProvider {
            image_calls: calls.clone(),
        });
        let store = Arc::new(IndexStore::open(dir.path().join(".artgrep")));
        let indexer = Arc::new(Indexer::new(
            store.clone(),
            provider.clone(),
            vec![CollectionConfig::from_path(&images, true)],
        ));
        let worker = Arc::new(IndexWorker::spawn(indexer));
        let engine = SearchEngine::new(store.clone(), provider).with_worker(worker.clone());
        let service = SearchService::new(worker, engine, 50);

        Self {
            _dir: dir,
            images,
            store,
            calls,
            service,
        }
    }

    fn add(&self, name: &str) {
        fs::write(self.images.join(name), name.as_bytes()).expect("write image");
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[test]
fn build_keeps_records_and_rows_aligned() {
    let h = Harness::new();
    for name in ["red_barn.png", "blue_ocean.jpg", "cat.gif", "dog_forest.webp"] {
        h.add(name);
    }

    let response = h.service.rebuild_index(false).expect("rebuild");
    assert_eq!(response.total_indexed, 4);

    let snapshot = h.store.load().expect("load");
    assert_eq!(snapshot.images.len(), snapshot.matrix.rows());
    let mut rows: Vec<usize> = snapshot.images.iter().map(|r| r.embedding_index).collect();
    rows.sort();
    assert_eq!(rows, vec![0, 1, 2, 3]);
}

#[test]
fn rebuilding_unchanged_collection_is_idempotent() {
    let h = Harness::new();
    h.add("red_barn.png");
    h.add("blue_ocean.jpg");

    let first = h.service.rebuild_index(false).expect("first");
    let before = h.store.load().expect("load");
    let calls = h.calls();

    let second = h.service.rebuild_index(false).expect("second");
    let after = h.store.load().expect("load");

    assert_eq!(h.calls(), calls);
    assert_eq!(first, second);
    assert_eq!(before.images, after.images);
    assert_eq!(before.matrix, after.matrix);
}

#[test]
fn incremental_build_embeds_only_new_images() {
    let h = Harness::new();
    for name in ["a_cat.png", "b_dog.png", "c_sunset.png"] {
        h.add(name);
    }

    let first = h.service.rebuild_index(false).expect("first");
    assert_eq!(first.total_indexed, 3);
    assert_eq!(h.calls(), 3);

    let second = h.service.rebuild_index(false).expect("second");
    assert_eq!(second.total_indexed, 3);
    assert_eq!(h.calls(), 3);
}

#[test]
fn existing_rows_survive_incremental_additions() {
    let h = Harness::new();
    h.add("red_barn.png");
    h.add("blue_ocean.jpg");
    h.service.rebuild_index(false).expect("first");
    let before = h.store.load().expect("load");

    h.add("cat.gif");
    h.service.rebuild_index(false).expect("second");
    let after = h.store.load().expect("load");

    for old in &before.images {
        let new = after
            .images
            .iter()
            .find(|r| r.path == old.path)
            .expect("record kept");
        assert_eq!(new.embedding_index, old.embedding_index);
        assert_eq!(
            after.matrix.row(new.embedding_index),
            before.matrix.row(old.embedding_index)
        );
    }
    let cat = after.images.iter().find(|r| r.name == "cat.gif").expect("cat");
    assert_eq!(cat.embedding_index, 2);
}

#[test]
fn search_is_deterministic() {
    let h = Harness::new();
    for name in ["red_barn.png", "blue_ocean.jpg", "cat.gif", "red_sunset.png"] {
        h.add(name);
    }
    h.service.rebuild_index(false).expect("rebuild");

    let first = h.service.search("red sunset", None, None).expect("search");
    let second = h.service.search("red sunset", None, None).expect("search");
    assert_eq!(first, second);
    assert_eq!(first.results[0].record.name, "red_sunset.png");
}

#[test]
fn search_returns_top_k_in_descending_order() {
    let h = Harness::new();
    for name in [
        "blue_ocean.jpg",
        "blue_sunset.png",
        "red_barn.png",
        "dog_forest.webp",
        "cat.gif",
    ] {
        h.add(name);
    }
    h.service.rebuild_index(false).expect("rebuild");

    let all = h.service.search("blue ocean", None, None).expect("all");
    assert_eq!(all.total, 5);
    let top = h.service.search("blue ocean", Some(2), None).expect("top");
    assert_eq!(top.total, 2);
    assert_eq!(top.results, all.results[..2].to_vec());
    assert!(top.results[0].similarity_score >= top.results[1].similarity_score);
    assert!(all
        .results
        .windows(2)
        .all(|w| w[0].similarity_score >= w[1].similarity_score));

    let more = h.service.search("blue ocean", Some(100), None).expect("more");
    assert_eq!(more.total, 5);
}

#[test]
fn ocean_query_ranks_ocean_above_barn() {
    let h = Harness::new();
    h.add("red_barn.png");
    h.add("blue_ocean.png");
    h.service.rebuild_index(false).expect("rebuild");

    let response = h.service.search("ocean", None, None).expect("search");
    let score = |name: &str| {
        response
            .results
            .iter()
            .find(|r| r.record.name == name)
            .map(|r| r.similarity_score)
            .expect("result present")
    };
    assert!(score("blue_ocean.png") > score("red_barn.png"));
    assert_eq!(response.results[0].record.name, "blue_ocean.png");
}

#[test]
fn empty_collection_yields_empty_index_and_results() {
    let h = Harness::new();

    let response = h.service.rebuild_index(false).expect("rebuild");
    assert_eq!(response.total_indexed, 0);

    let results = h.service.search("anything", None, None).expect("search");
    assert!(results.results.is_empty());
    assert_eq!(results.total, 0);
}

#[test]
fn empty_query_is_rejected() {
    let h = Harness::new();
    h.add("cat.gif");

    let err = h.service.search("", None, None).unwrap_err();
    assert!(matches!(err, SearchError::EmptyQuery));
    assert!(err.is_user_error());

    let err = h.service.search("cat", Some(0), None).unwrap_err();
    assert!(matches!(err, SearchError::InvalidMaxResults));
    assert_eq!(h.calls(), 0);
}

#[test]
fn one_unreadable_image_among_ten_is_skipped() {
    let h = Harness::new();
    for i in 0..9 {
        h.add(&format!("cat_{}.png", i));
    }
    h.add("corrupt_file.png");

    let response = h.service.rebuild_index(false).expect("rebuild");
    assert_eq!(response.total_indexed, 9);

    let snapshot = h.store.load().expect("load");
    assert_eq!(snapshot.matrix.rows(), 9);
    assert!(snapshot.images.iter().all(|r| r.name != "corrupt_file.png"));
}

#[test]
fn first_search_builds_the_index() {
    let h = Harness::new();
    h.add("red_barn.png");

    assert!(!h.service.index_status().expect("status").indexed);
    let response = h.service.search("barn", None, None).expect("search");
    assert_eq!(response.total, 1);

    let status = h.service.index_status().expect("status");
    assert!(status.indexed);
    assert_eq!(status.total_indexed, 1);
}

#[test]
fn force_rebuild_reembeds_everything() {
    let h = Harness::new();
    h.add("red_barn.png");
    h.add("cat.gif");
    h.service.rebuild_index(false).expect("first");

    let report = h
        .service
        .rebuild_index_async(true)
        .expect("submit")
        .wait()
        .expect("rebuild");
    assert_eq!(report.mode, IndexMode::Full);
    assert_eq!(report.embedded, 2);
    assert_eq!(h.calls(), 4);
}
