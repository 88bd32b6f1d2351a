#![allow(dead_code)]

//! Shared fixtures for the integration tests
//!
//! `KeywordEmbedder` stands in for the sentence embedding model: one
//! dimension per vocabulary word plus a shared bucket for everything else,
//! so similarity tracks word overlap and results are fully deterministic.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use travel_rag::config::Config;
use travel_rag::embeddings::{ChunkingConfig, Embedder};
use travel_rag::indexer::{Indexer, StoreState};
use travel_rag::search::Retriever;

pub const DIMENSION: usize = 64;

pub const PARIS_TOKYO: &str = "Paris is the capital of France. Tokyo is the capital of Japan.";

const VOCABULARY: &[&str] = &[
    "paris", "france", "tokyo", "japan", "rome", "italy", "capital", "is", "the", "of", "museum",
    "food", "beach", "train", "visit", "city", "best", "where", "what",
];

pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let slot = VOCABULARY
                .iter()
                .position(|v| *v == word)
                .unwrap_or(DIMENSION - 1);
            vector[slot] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(Self::vectorize(text))
    }

    fn model_name(&self) -> &str {
        "keywords"
    }
}

/// Config rooted in `dir` with a small chunk window and the keyword dimension
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config {
        base_dir: dir.to_path_buf(),
        ..Config::default()
    };
    config.store.source_path = dir.join("travelguide.txt");
    config.store.persist_dir = dir.join("vector_store");
    config.ollama.embedding_dimension = DIMENSION as u32;
    config.chunking = ChunkingConfig {
        chunk_size: 40,
        chunk_overlap: 10,
    };
    config
}

pub fn write_source(config: &Config, content: &str) {
    std::fs::write(&config.store.source_path, content).expect("should write source document");
}

pub async fn initialize(config: &Config) -> StoreState {
    Indexer::new(config.clone(), Arc::new(KeywordEmbedder))
        .initialize()
        .await
}

pub fn retriever(config: &Config, state: StoreState) -> Retriever {
    Retriever::new(state, Arc::new(KeywordEmbedder), config.query.clone())
}

/// A retriever over the Paris/Tokyo document, plus the directory backing it
pub async fn paris_retriever() -> (Retriever, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());
    write_source(&config, PARIS_TOKYO);

    let state = initialize(&config).await;
    assert!(state.is_ready(), "store should build");

    (retriever(&config, state), temp_dir)
}
