// Embeddings module
// Character chunking and the sentence embedding model behind the Embedder trait

pub mod chunking;
pub mod ollama;

use anyhow::Result;
use async_trait::async_trait;

pub use chunking::{Chunk, ChunkingConfig, ChunkingError, chunk_document, chunk_text};
pub use ollama::OllamaClient;

/// A fixed pretrained text embedding model.
///
/// Implementations must be deterministic: the same text always maps to the
/// same vector, and every vector has the same dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts, one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Name of the underlying model, for logs and status output
    fn model_name(&self) -> &str;
}
