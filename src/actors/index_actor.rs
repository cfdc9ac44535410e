//! Vector index actor: owns the embedding model and the LanceDB table.
//!
//! All index mutation and search goes through one mpsc channel, so a rebuild
//! fully replaces the table before any later search runs and no locking is
//! needed around the LanceDB handle. Embeddings are cached by content hash
//! in an LRU so re-uploads of unchanged material skip the model.

use crate::error::ApiError;
use crate::protocol::{ChunkRecord, IndexMsg, ScoredChunk};
use crate::roles::Role;
use arrow_array::types::Float32Type;
use arrow_array::{
    FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const EMBEDDING_DIM: usize = 384;

/// SQL filter restricting search results to the tiers `role` can access.
/// This is the enforcement point for retrieval visibility.
pub fn role_filter_clause(role: Role) -> String {
    let tiers = role
        .reachable()
        .iter()
        .map(|r| format!("'{}'", r.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("role IN ({})", tiers)
}
const CHUNKS_TABLE: &str = "chunks";
const EMBED_BATCH_SIZE: usize = 10;
const EMBEDDING_CACHE_SIZE: usize = 4096;

pub struct IndexActor {
    rx: mpsc::Receiver<IndexMsg>,
    db_path: PathBuf,
    table: Option<Table>,
    model: Option<Arc<TextEmbedding>>,
    embedding_cache: LruCache<String, Vec<f32>>,
    indexed: bool,
}

impl IndexActor {
    pub fn new(rx: mpsc::Receiver<IndexMsg>, db_path: PathBuf) -> Self {
        let cache_size = NonZeroUsize::new(EMBEDDING_CACHE_SIZE)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            rx,
            db_path,
            table: None,
            model: None,
            embedding_cache: LruCache::new(cache_size),
            indexed: false,
        }
    }

    pub async fn run(mut self) {
        log::info!("IndexActor: initializing embedding model (all-MiniLM-L6-v2)...");
        match tokio::task::spawn_blocking(|| {
            let mut options = InitOptions::default();
            options.model_name = EmbeddingModel::AllMiniLML6V2;
            options.show_download_progress = true;
            TextEmbedding::try_new(options)
        })
        .await
        {
            Ok(Ok(model)) => {
                log::info!("IndexActor: embedding model loaded");
                self.model = Some(Arc::new(model));
            }
            Ok(Err(e)) => log::error!("IndexActor: failed to load embedding model: {}", e),
            Err(e) => log::error!("IndexActor: embedding model init task panicked: {}", e),
        }

        match self.open_table().await {
            Ok(table) => {
                // Survive restarts: an existing populated table keeps chat enabled.
                if let Ok(count) = table.count_rows(None).await {
                    self.indexed = count > 0;
                    if self.indexed {
                        log::info!("IndexActor: found {} indexed chunks on disk", count);
                    }
                }
                self.table = Some(table);
            }
            Err(e) => log::error!("IndexActor: failed to open vector table: {}", e),
        }

        while let Some(msg) = self.rx.recv().await {
            match msg {
                IndexMsg::Rebuild { chunks, respond_to } => {
                    let result = self.rebuild(chunks).await;
                    let _ = respond_to.send(result);
                }
                IndexMsg::Search {
                    query,
                    role,
                    limit,
                    respond_to,
                } => {
                    let result = self.search(&query, role, limit).await;
                    let _ = respond_to.send(result);
                }
                IndexMsg::Invalidate { respond_to } => {
                    let result = self.invalidate().await;
                    let _ = respond_to.send(result);
                }
            }
        }
        log::info!("IndexActor: channel closed, shutting down");
    }

    fn chunks_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("hash", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("role", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIM as i32,
                ),
                true,
            ),
        ]))
    }

    async fn open_table(&self) -> Result<Table, ApiError> {
        let db_path_str = self.db_path.to_string_lossy().to_string();
        let db = lancedb::connect(&db_path_str)
            .execute()
            .await
            .map_err(|e| ApiError::Internal(format!("failed to open vector store: {}", e)))?;
        Self::ensure_table_exists(&db, CHUNKS_TABLE, Self::chunks_schema()).await
    }

    /// Ensure the chunks table exists with the expected schema, recreating it
    /// on a field-count or dimension mismatch.
    async fn ensure_table_exists(
        db: &Connection,
        table_name: &str,
        schema: Arc<Schema>,
    ) -> Result<Table, ApiError> {
        let table_names = db
            .table_names()
            .execute()
            .await
            .map_err(|e| ApiError::Internal(format!("vector store error: {}", e)))?;

        if table_names.contains(&table_name.to_string()) {
            let table = db
                .open_table(table_name)
                .execute()
                .await
                .map_err(|e| ApiError::Internal(format!("vector store error: {}", e)))?;

            let existing_schema = table
                .schema()
                .await
                .map_err(|e| ApiError::Internal(format!("vector store error: {}", e)))?;
            let dim_of = |s: &Schema| {
                s.field_with_name("vector")
                    .ok()
                    .and_then(|f| match f.data_type() {
                        DataType::FixedSizeList(_, dim) => Some(*dim),
                        _ => None,
                    })
            };
            if existing_schema.fields().len() == schema.fields().len()
                && dim_of(&existing_schema) == dim_of(&schema)
            {
                return Ok(table);
            }
            log::warn!(
                "IndexActor: schema mismatch for {}, recreating table",
                table_name
            );
            let _ = db.drop_table(table_name, &[]).await;
        }

        let batch = RecordBatch::new_empty(schema.clone());
        db.create_table(
            table_name,
            RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema),
        )
        .execute()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create vector table: {}", e)))
    }

    fn compute_content_hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Embed texts, serving repeats from the LRU cache and batching the rest
    /// through the model on a blocking thread.
    async fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| ApiError::Upstream("embedding model is not available".into()))?;

        let hashes: Vec<String> = texts.iter().map(|t| Self::compute_content_hash(t)).collect();
        let mut vectors: Vec<Option<Vec<f32>>> = hashes
            .iter()
            .map(|h| self.embedding_cache.get(h).cloned())
            .collect();

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();

        for batch_indices in missing.chunks(EMBED_BATCH_SIZE) {
            let batch_texts: Vec<String> =
                batch_indices.iter().map(|&i| texts[i].clone()).collect();
            let model = Arc::clone(&model);
            let embedded =
                tokio::task::spawn_blocking(move || model.embed(batch_texts, None))
                    .await
                    .map_err(|e| ApiError::Internal(format!("embedding task panicked: {}", e)))?
                    .map_err(|e| ApiError::Upstream(format!("embedding failed: {}", e)))?;

            if embedded.len() != batch_indices.len() {
                return Err(ApiError::Upstream(
                    "embedding model returned an unexpected result count".into(),
                ));
            }
            for (&i, vector) in batch_indices.iter().zip(embedded) {
                self.embedding_cache.put(hashes[i].clone(), vector.clone());
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }

    /// Replace the whole index with a new chunk set.
    async fn rebuild(&mut self, chunks: Vec<ChunkRecord>) -> Result<usize, ApiError> {
        if chunks.is_empty() {
            return Err(ApiError::Validation("no chunks to index".into()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_texts(&texts).await?;

        let table = self
            .table
            .as_ref()
            .ok_or_else(|| ApiError::Internal("vector table is not available".into()))?;

        // The table is empty from here until the add succeeds; searches in
        // that window must see the not-indexed state, not stale `true`.
        self.indexed = false;
        table
            .delete("1=1")
            .await
            .map_err(|e| ApiError::Internal(format!("failed to clear index: {}", e)))?;

        let count = chunks.len();
        let schema = Self::chunks_schema();

        let mut ids = Vec::with_capacity(count);
        let mut hashes = Vec::with_capacity(count);
        let mut contents = Vec::with_capacity(count);
        let mut sources = Vec::with_capacity(count);
        let mut roles = Vec::with_capacity(count);
        let mut indices = Vec::with_capacity(count);
        let mut vector_rows = Vec::with_capacity(count);

        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            ids.push(Uuid::new_v4().to_string());
            hashes.push(Self::compute_content_hash(&chunk.text));
            contents.push(chunk.text);
            sources.push(chunk.source);
            roles.push(chunk.role.as_str().to_string());
            indices.push(chunk.chunk_index as i64);
            vector_rows.push(Some(vector.into_iter().map(Some).collect::<Vec<_>>()));
        }

        let vector_arr = Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            vector_rows,
            EMBEDDING_DIM as i32,
        ));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(hashes)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(roles)),
                Arc::new(Int64Array::from(indices)),
                vector_arr,
            ],
        )
        .map_err(|e| ApiError::Internal(format!("failed to build record batch: {}", e)))?;

        table
            .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .execute()
            .await
            .map_err(|e| ApiError::Internal(format!("failed to write index: {}", e)))?;

        self.indexed = true;
        log::info!("IndexActor: indexed {} chunks", count);
        Ok(count)
    }

    /// Nearest-neighbour search restricted to the tiers `role` can access.
    async fn search(
        &mut self,
        query: &str,
        role: Role,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        if !self.indexed {
            return Err(ApiError::State(
                "No documents have been processed for chat. Please upload files first.".into(),
            ));
        }

        let query_vector = self
            .embed_texts(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("embedding model returned no vector".into()))?;

        let table = self
            .table
            .as_ref()
            .ok_or_else(|| ApiError::Internal("vector table is not available".into()))?;

        let mut stream = table
            .query()
            .nearest_to(query_vector)
            .map_err(|e| ApiError::Internal(format!("vector query failed: {}", e)))?
            .only_if(role_filter_clause(role))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| ApiError::Internal(format!("vector search failed: {}", e)))?;

        let mut results = Vec::new();
        while let Some(item) = stream.next().await {
            let batch = item
                .map_err(|e| ApiError::Internal(format!("vector search stream failed: {}", e)))?;
            let contents = batch
                .column_by_name("content")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let sources = batch
                .column_by_name("source")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            if let (Some(contents), Some(sources), Some(distances)) =
                (contents, sources, distances)
            {
                for i in 0..batch.num_rows() {
                    let distance = distances.value(i);
                    results.push(ScoredChunk {
                        content: contents.value(i).to_string(),
                        source: sources.value(i).to_string(),
                        score: 1.0 / (1.0 + distance),
                    });
                }
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    /// Drop all indexed chunks. Chat requires a fresh upload afterwards.
    async fn invalidate(&mut self) -> Result<(), ApiError> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| ApiError::Internal("vector table is not available".into()))?;
        table
            .delete("1=1")
            .await
            .map_err(|e| ApiError::Internal(format!("failed to clear index: {}", e)))?;
        self.indexed = false;
        log::info!("IndexActor: index invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = IndexActor::compute_content_hash("some chunk text");
        let b = IndexActor::compute_content_hash("some chunk text");
        let c = IndexActor::compute_content_hash("other text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_role_filter_restricts_to_reachable_tiers() {
        assert_eq!(role_filter_clause(Role::Student), "role IN ('student')");
        assert_eq!(
            role_filter_clause(Role::Teacher),
            "role IN ('teacher', 'student')"
        );
        assert_eq!(
            role_filter_clause(Role::HodDean),
            "role IN ('hod_dean', 'teacher', 'student')"
        );
    }

    #[test]
    fn test_role_filter_excludes_higher_tiers() {
        // A student query must never match staff-tier chunks.
        for viewer in [Role::Student, Role::Teacher] {
            assert!(!role_filter_clause(viewer).contains("'hod_dean'"));
        }
        assert!(!role_filter_clause(Role::Student).contains("'teacher'"));
    }

    #[test]
    fn test_schema_shape() {
        let schema = IndexActor::chunks_schema();
        assert_eq!(schema.fields().len(), 7);
        match schema.field_with_name("vector").unwrap().data_type() {
            DataType::FixedSizeList(_, dim) => assert_eq!(*dim, EMBEDDING_DIM as i32),
            other => panic!("unexpected vector type: {:?}", other),
        }
    }
}
