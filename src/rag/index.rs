//! Vector index abstraction over the knowledge base.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One knowledge-base passage with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Result of a similarity search (higher score = more similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: i64,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("corrupt embedding for chunk {id}")]
    CorruptEmbedding { id: i64 },
    #[error("embedding for chunk {id} has a non-finite component or zero norm")]
    InvalidEmbedding { id: i64 },
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `limit` chunks by cosine similarity, best first. Equal scores are
    /// ordered by ascending chunk id.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Replaces the whole index in one transaction. Returns the number of
    /// chunks stored.
    async fn replace_all(
        &self,
        chunks: Vec<KnowledgeChunk>,
        embedding_model: &str,
    ) -> Result<usize, IndexError>;

    async fn count(&self) -> Result<usize, IndexError>;

    fn dimension(&self) -> usize;

    /// Releases backing resources. Searches keep working from memory where
    /// the implementation holds a snapshot.
    async fn close(&self) {}
}
