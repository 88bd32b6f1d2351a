// Database module
// LanceDB holds the persisted chunk vectors

pub mod lancedb;

pub use self::lancedb::{ChunkMetadata, EmbeddingRecord, SearchResult, VectorStore};
