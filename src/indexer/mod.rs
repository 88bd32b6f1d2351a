// Indexer module
// Loads the source document, embeds its chunks and persists them, or falls
// back to a previously persisted vector store


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::lancedb::{ChunkMetadata, EmbeddingRecord, VectorStore};
use crate::embeddings::Embedder;
use crate::embeddings::chunking::chunk_document;
use crate::{RagError, Result};

/// Raw text of the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: PathBuf,
    pub content: String,
}

/// Statistics about one index build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub duration: Duration,
}

/// Where a ready store came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOrigin {
    /// Built from the source document at startup
    Built,
    /// Opened from a store persisted by an earlier run
    Persisted,
}

/// Result of startup initialization
#[derive(Debug)]
pub enum StoreState {
    Ready {
        store: VectorStore,
        origin: StoreOrigin,
        chunk_count: u64,
    },
    Unavailable {
        reason: String,
    },
}

impl StoreState {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    #[inline]
    pub fn store(&self) -> Option<&VectorStore> {
        match self {
            Self::Ready { store, .. } => Some(store),
            Self::Unavailable { .. } => None,
        }
    }

    #[inline]
    pub fn chunk_count(&self) -> u64 {
        match self {
            Self::Ready { chunk_count, .. } => *chunk_count,
            Self::Unavailable { .. } => 0,
        }
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Read a UTF-8 document, returning `None` if the file does not exist
#[inline]
pub async fn load_document(path: &Path) -> Result<Option<Document>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            info!(
                "Loaded document {} ({} characters)",
                path.display(),
                content.chars().count()
            );
            Ok(Some(Document {
                source: path.to_path_buf(),
                content,
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Err(RagError::Indexing(
            format!("{} is not valid UTF-8", path.display()),
        )),
        Err(e) => Err(RagError::Io(e)),
    }
}

/// Builds the vector store from the source document or loads the persisted one
pub struct Indexer {
    config: Config,
    embedder: Arc<dyn Embedder>,
}

impl Indexer {
    #[inline]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    /// Chunk and embed `document`, then replace the persisted store with the
    /// result in one write. Any failure leaves the previous store in place.
    #[inline]
    pub async fn build(&self, document: &Document) -> Result<(VectorStore, IndexingStats)> {
        let started = Instant::now();
        self.config.store.validate()?;
        let chunks = chunk_document(document, &self.config.chunking)
            .map_err(|e| RagError::Indexing(e.to_string()))?;

        info!(
            "Split {} into {} chunks",
            document.source.display(),
            chunks.len()
        );

        let expected_dim = self.config.ollama.embedding_dimension as usize;
        let batch_size = self.config.ollama.batch_size.max(1) as usize;
        let bar = progress_bar(chunks.len() as u64);

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self
                .embedder
                .embed_documents(&texts)
                .await
                .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

            if embeddings.len() != texts.len() {
                return Err(RagError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    embeddings.len()
                )));
            }
            if let Some(bad) = embeddings.iter().find(|e| e.len() != expected_dim) {
                return Err(RagError::Embedding(format!(
                    "Model {} produced {}-dimensional vectors but embedding_dimension is {}",
                    self.embedder.model_name(),
                    bad.len(),
                    expected_dim
                )));
            }

            vectors.extend(embeddings);
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();

        let created_at = Utc::now().to_rfc3339();
        let source = document.source.display().to_string();
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                metadata: ChunkMetadata {
                    source: source.clone(),
                    content: chunk.content.clone(),
                    chunk_index: chunk.chunk_index as u32,
                    start_offset: chunk.start_offset as u32,
                    created_at: created_at.clone(),
                },
            })
            .collect();
        let embeddings_generated = records.len();

        let store = VectorStore::replace(
            &self.config.store.persist_dir,
            &self.config.store.table_name,
            expected_dim,
            records,
        )
        .await?;

        let stats = IndexingStats {
            chunks_created: chunks.len(),
            embeddings_generated,
            duration: started.elapsed(),
        };
        info!(
            "Vector store built at {} ({} chunks in {:?})",
            self.config.store.persist_dir.display(),
            stats.chunks_created,
            stats.duration
        );

        Ok((store, stats))
    }

    /// Open the store persisted by an earlier build, if any
    #[inline]
    pub async fn load_persisted(&self) -> Result<Option<VectorStore>> {
        VectorStore::open(
            &self.config.store.persist_dir,
            &self.config.store.table_name,
        )
        .await
    }

    /// Build from the source document, else load the persisted store, else
    /// report the store as unavailable. Never fails.
    #[inline]
    pub async fn initialize(&self) -> StoreState {
        let source_path = &self.config.store.source_path;

        match load_document(source_path).await {
            Ok(Some(document)) => match self.build(&document).await {
                Ok((store, stats)) => {
                    return StoreState::Ready {
                        store,
                        origin: StoreOrigin::Built,
                        chunk_count: stats.chunks_created as u64,
                    };
                }
                Err(e) => {
                    error!(
                        "Failed to build vector store from {}: {}",
                        source_path.display(),
                        e
                    );
                }
            },
            Ok(None) => {
                warn!(
                    "{} not found, using existing vector store",
                    source_path.display()
                );
            }
            Err(e) => {
                error!("Failed to read {}: {}", source_path.display(), e);
            }
        }

        let persist_dir = &self.config.store.persist_dir;
        match self.load_persisted().await {
            Ok(Some(store)) => match store.count_embeddings().await {
                Ok(chunk_count) => {
                    info!(
                        "Loaded persisted vector store from {} ({} chunks)",
                        persist_dir.display(),
                        chunk_count
                    );
                    StoreState::Ready {
                        store,
                        origin: StoreOrigin::Persisted,
                        chunk_count,
                    }
                }
                Err(e) => unavailable(format!(
                    "Persisted vector store at {} is unreadable: {}",
                    persist_dir.display(),
                    e
                )),
            },
            Ok(None) => unavailable(format!(
                "No source document at {} and no persisted vector store at {}",
                source_path.display(),
                persist_dir.display()
            )),
            Err(e) => unavailable(format!(
                "Failed to open vector store at {}: {}",
                persist_dir.display(),
                e
            )),
        }
    }
}

fn unavailable(reason: String) -> StoreState {
    warn!("Vector store unavailable: {}", reason);
    StoreState::Unavailable { reason }
}

fn progress_bar(len: u64) -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}") {
            bar.set_style(style);
        }
        bar
    } else {
        debug!("Embedding {} chunks", len);
        ProgressBar::hidden()
    }
}
