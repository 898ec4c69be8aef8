//! SQLite-backed vector index.
//!
//! Chunks live in SQLite as little-endian `f32` blobs. The whole index is
//! loaded into memory at startup and after every reindex, and searched by
//! brute-force cosine similarity.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

use super::index::{IndexError, KnowledgeChunk, ScoredChunk, VectorIndex};
use crate::vector_math::{l2_normalize, rank_descending_by_cosine};

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    dimension: usize,
    // sorted by ascending id
    snapshot: RwLock<Arc<Vec<KnowledgeChunk>>>,
}

impl SqliteVectorIndex {
    pub async fn with_path(db_path: &Path, dimension: usize) -> Result<Self, IndexError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        Self::open(options, dimension).await
    }

    pub async fn connect(url: &str, dimension: usize) -> Result<Self, IndexError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        Self::open(options, dimension).await
    }

    async fn open(options: SqliteConnectOptions, dimension: usize) -> Result<Self, IndexError> {
        let options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await?;

        let index = Self {
            pool,
            dimension,
            snapshot: RwLock::new(Arc::new(Vec::new())),
        };
        index.init_schema().await?;
        index.check_stored_dimension().await?;
        index.reload().await?;
        Ok(index)
    }

    async fn init_schema(&self) -> Result<(), IndexError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS knowledge_chunks (
                id INTEGER PRIMARY KEY,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn check_stored_dimension(&self) -> Result<(), IndexError> {
        let stored = self.meta_value("dimension").await?;
        if let Some(actual) = stored.and_then(|v| v.parse::<usize>().ok()) {
            if actual != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Embedding model recorded by the last reindex, if any.
    pub async fn embedding_model(&self) -> Result<Option<String>, IndexError> {
        self.meta_value("embedding_model").await
    }

    async fn meta_value(&self, key: &str) -> Result<Option<String>, IndexError> {
        let row = sqlx::query("SELECT value FROM index_meta WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn reload(&self) -> Result<(), IndexError> {
        let rows = sqlx::query("SELECT id, content, embedding FROM knowledge_chunks ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let blob: Vec<u8> = row.get("embedding");
            let embedding = deserialize_embedding(&blob)
                .filter(|embedding| embedding.len() == self.dimension)
                .filter(|embedding| embedding.iter().all(|x| x.is_finite()))
                .ok_or(IndexError::CorruptEmbedding { id })?;
            chunks.push(KnowledgeChunk {
                id,
                content: row.get("content"),
                embedding,
            });
        }

        tracing::info!("Loaded {} knowledge chunks into the vector index", chunks.len());
        *self.snapshot.write().await = Arc::new(chunks);
        Ok(())
    }

    /// Closes the pool. The in-memory snapshot stays searchable; further
    /// reindexing fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let chunks = self.snapshot.read().await.clone();
        let ranked = rank_descending_by_cosine(query, &chunks_embeddings(&chunks));

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(idx, score)| {
                let chunk = &chunks[idx];
                ScoredChunk {
                    chunk_id: chunk.id,
                    content: chunk.content.clone(),
                    score,
                }
            })
            .collect())
    }

    async fn replace_all(
        &self,
        mut chunks: Vec<KnowledgeChunk>,
        embedding_model: &str,
    ) -> Result<usize, IndexError> {
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.embedding.len(),
            });
        }
        for chunk in &mut chunks {
            chunk.embedding = l2_normalize(&chunk.embedding)
                .ok_or(IndexError::InvalidEmbedding { id: chunk.id })?;
        }
        chunks.sort_by_key(|chunk| chunk.id);

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM knowledge_chunks")
            .execute(&mut *tx)
            .await?;

        for chunk in &chunks {
            sqlx::query("INSERT INTO knowledge_chunks (id, content, embedding) VALUES (?1, ?2, ?3)")
                .bind(chunk.id)
                .bind(&chunk.content)
                .bind(serialize_embedding(&chunk.embedding))
                .execute(&mut *tx)
                .await?;
        }

        for (key, value) in [
            ("embedding_model", embedding_model.to_string()),
            ("dimension", self.dimension.to_string()),
        ] {
            sqlx::query(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let stored = chunks.len();
        tracing::info!(
            "Reindexed knowledge base: {} chunks (model '{}')",
            stored,
            embedding_model
        );
        *self.snapshot.write().await = Arc::new(chunks);
        Ok(stored)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.snapshot.read().await.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn close(&self) {
        SqliteVectorIndex::close(self).await;
    }
}

fn chunks_embeddings(chunks: &[KnowledgeChunk]) -> Vec<&[f32]> {
    chunks.iter().map(|chunk| chunk.embedding.as_slice()).collect()
}
