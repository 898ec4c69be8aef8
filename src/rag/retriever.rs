use std::sync::Arc;

use super::error::RagError;
use super::index::{ScoredChunk, VectorIndex};

/// Top-K nearest-neighbour lookup with K fixed at construction.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    pub async fn retrieve(&self, query: &[f32]) -> Result<Vec<ScoredChunk>, RagError> {
        let chunks = self
            .index
            .search(query, self.top_k)
            .await
            .map_err(RagError::retrieval)?;

        tracing::debug!(
            "Retrieved {} chunks (top_k={}): {:?}",
            chunks.len(),
            self.top_k,
            chunks.iter().map(|c| c.chunk_id).collect::<Vec<_>>()
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::KnowledgeChunk;
    use crate::rag::sqlite::SqliteVectorIndex;

    #[tokio::test]
    async fn returns_at_most_top_k_in_rank_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteVectorIndex::with_path(&dir.path().join("kb.db"), 2)
            .await
            .unwrap();
        let chunks = (1..=8)
            .map(|id| KnowledgeChunk {
                id,
                content: format!("passage {}", id),
                embedding: vec![1.0, id as f32],
            })
            .collect();
        index.replace_all(chunks, "test-embed").await.unwrap();

        let retriever = Retriever::new(Arc::new(index), 3);
        let results = retriever.retrieve(&[0.0, 1.0]).await.unwrap();

        let ids: Vec<i64> = results.iter().map(|r| r.chunk_id).collect();
        assert_eq!(ids, vec![8, 7, 6]);
    }

    #[tokio::test]
    async fn repeated_retrieval_over_tied_chunks_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteVectorIndex::with_path(&dir.path().join("kb.db"), 2)
            .await
            .unwrap();
        let chunks = [12, 4, 9, 1, 7]
            .into_iter()
            .map(|id| KnowledgeChunk {
                id,
                content: format!("passage {}", id),
                embedding: vec![0.5, 0.5],
            })
            .collect();
        index.replace_all(chunks, "test-embed").await.unwrap();
        let retriever = Retriever::new(Arc::new(index), 3);

        let first = retriever.retrieve(&[0.6, 0.8]).await.unwrap();
        assert_eq!(
            first.iter().map(|r| r.chunk_id).collect::<Vec<_>>(),
            vec![1, 4, 7]
        );
        for _ in 0..10 {
            assert_eq!(retriever.retrieve(&[0.6, 0.8]).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteVectorIndex::with_path(&dir.path().join("kb.db"), 1024)
            .await
            .unwrap();
        let retriever = Retriever::new(Arc::new(index), 5);

        let err = retriever.retrieve(&[1.0; 3]).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));
    }
}
