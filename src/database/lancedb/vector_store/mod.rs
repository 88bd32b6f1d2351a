
use super::{ChunkMetadata, EmbeddingRecord};
use crate::RagError;
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    database::CreateTableMode,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Persisted chunk vectors with exact cosine nearest-neighbour search
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("table_name", &self.table_name)
            .field("vector_dimension", &self.vector_dimension)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Create an empty store at `path`, replacing any table of the same name
    ///
    /// # Arguments
    /// * `path` - Directory holding the LanceDB database
    /// * `table_name` - Table the chunks are written to
    /// * `vector_dim` - Dimension of the embeddings that will be stored
    #[inline]
    pub async fn create(path: &Path, table_name: &str, vector_dim: usize) -> Result<Self, RagError> {
        debug!("Creating vector store at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let connection = Self::connect(path).await?;
        let store = Self {
            connection,
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
            vector_dimension: Some(vector_dim),
        };

        store.create_empty_table(vector_dim).await?;

        info!(
            "Vector store created at {} with {} dimensions",
            path.display(),
            vector_dim
        );
        Ok(store)
    }

    /// Replace the table at `path` with `records` in a single overwrite.
    ///
    /// Records are checked and converted to Arrow before the database is
    /// touched, and the previous table version stays current until the new
    /// one is committed, so any failure leaves the old contents readable.
    #[inline]
    pub async fn replace(
        path: &Path,
        table_name: &str,
        vector_dim: usize,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Self, RagError> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Embedding {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        if records.is_empty() {
            return Self::create(path, table_name, vector_dim).await;
        }

        let record_batch = Self::create_record_batch(&records, vector_dim)?;

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let store = Self {
            connection: Self::connect(path).await?,
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
            vector_dimension: Some(vector_dim),
        };
        store.overwrite_with(record_batch).await?;

        info!(
            "Vector store at {} replaced with {} embeddings",
            path.display(),
            records.len()
        );
        Ok(store)
    }

    /// Open a previously persisted store.
    ///
    /// Returns `None` when neither the directory nor the table exist; nothing
    /// is created on disk.
    #[inline]
    pub async fn open(path: &Path, table_name: &str) -> Result<Option<Self>, RagError> {
        if !path.is_dir() {
            debug!("No vector store directory at {}", path.display());
            return Ok(None);
        }

        let connection = Self::connect(path).await?;
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == table_name) {
            debug!(
                "Vector store at {} has no table named {}",
                path.display(),
                table_name
            );
            return Ok(None);
        }

        let mut store = Self {
            connection,
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
            vector_dimension: None,
        };

        match store.detect_existing_vector_dimension().await {
            Ok(dim) => {
                store.vector_dimension = Some(dim);
                info!("Opened vector store at {} ({} dimensions)", path.display(), dim);
            }
            Err(e) => {
                warn!("Could not detect vector dimension from existing table: {}", e);
            }
        }

        Ok(Some(store))
    }

    async fn connect(path: &Path) -> Result<Connection, RagError> {
        let absolute = std::path::absolute(path).map_err(|e| {
            RagError::Database(format!("Failed to resolve {}: {}", path.display(), e))
        })?;
        let uri = absolute.to_string_lossy().into_owned();

        lancedb::connect(&uri).execute().await.map_err(|e| {
            error!("Failed to connect to LanceDB: {}", e);
            RagError::Database(format!("Failed to connect to LanceDB: {}", e))
        })
    }

    /// Directory the store lives in
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dimension of the stored vectors, if known
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, RagError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("source", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("start_offset", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn create_empty_table(&self, vector_dim: usize) -> Result<(), RagError> {
        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    async fn open_table(&self) -> Result<Table, RagError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Store multiple embeddings in a batch
    ///
    /// # Arguments
    /// * `records` - Vector of embedding records to store
    #[inline]
    pub async fn store_embeddings_batch(
        &mut self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<(), RagError> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        debug!("Storing batch of {} embeddings", records.len());

        let vector_dim = records[0].vector.len();
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Embedding {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        let record_batch = Self::create_record_batch(&records, vector_dim)?;

        if self.vector_dimension != Some(vector_dim) {
            info!(
                "Vector dimension changed from {:?} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.overwrite_with(record_batch).await?;
            self.vector_dimension = Some(vector_dim);
            info!("Successfully stored {} embeddings", records.len());
            return Ok(());
        }

        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Successfully stored {} embeddings", records.len());
        Ok(())
    }

    /// Write `batch` as the new contents of the table, creating it if needed
    async fn overwrite_with(&self, batch: RecordBatch) -> Result<(), RagError> {
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        self.connection
            .create_table(&self.table_name, reader)
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to write table: {}", e)))?;
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(
        records: &[EmbeddingRecord],
        vector_dim: usize,
    ) -> Result<RecordBatch, RagError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut sources = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut start_offsets = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            sources.push(record.metadata.source.as_str());
            contents.push(record.metadata.content.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            start_offsets.push(record.metadata.start_offset);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    RagError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(UInt32Array::from(start_offsets)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the chunks nearest to `query_vector` by cosine distance
    ///
    /// Returns at most `limit` results, most similar first.
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, RagError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(dim) = self.vector_dimension {
            if query_vector.len() != dim {
                return Err(RagError::Database(format!(
                    "Query vector has {} dimensions but the store holds {}",
                    query_vector.len(),
                    dim
                )));
            }
        }

        let table = self.open_table().await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            debug!("Vector store is empty");
            return Ok(Vec::new());
        }

        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        search_results.truncate(limit);
        Ok(search_results)
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, RagError> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch_result)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, RagError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
    }

    fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, RagError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, RagError> {
        let sources = Self::string_column(batch, "source")?;
        let contents = Self::string_column(batch, "content")?;
        let chunk_indices = Self::u32_column(batch, "chunk_index")?;
        let start_offsets = Self::u32_column(batch, "start_offset")?;
        let created_ats = Self::string_column(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let chunk_metadata = ChunkMetadata {
                source: sources.value(row).to_string(),
                content: contents.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                start_offset: start_offsets.value(row),
                created_at: created_ats.value(row).to_string(),
            };

            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            // Cosine distance is 1 - cosine similarity
            search_results.push(SearchResult {
                chunk_metadata,
                similarity_score: 1.0 - distance,
                distance,
            });
        }

        Ok(search_results)
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64, RagError> {
        let table = self.open_table().await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}
