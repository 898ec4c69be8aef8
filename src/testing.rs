//! In-memory fakes shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cache::{normalize_question, AnswerCache, CacheError, CacheTier, CachedAnswer};
use crate::core::config::{GenerationConfig, PromptConfig};
use crate::rag::{
    Embedder, Generator, IndexError, KnowledgeChunk, PromptAssembler, RagError, RagPipeline,
    Retriever, ScoredChunk, VectorIndex,
};

pub const GENERATED_ANSWER: &str = "Сгенерированный ответ";

#[derive(Default)]
pub struct MemoryCache {
    pub curated: Vec<(String, String)>,
    pub log: Mutex<Vec<(String, String)>>,
    pub fail_lookup: AtomicBool,
    pub fail_write: AtomicBool,
    pub lookups: AtomicUsize,
}

impl MemoryCache {
    pub fn with_curated(pairs: &[(&str, &str)]) -> Self {
        Self {
            curated: pairs
                .iter()
                .map(|(q, a)| (q.to_string(), a.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn logged(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerCache for MemoryCache {
    async fn lookup(&self, question: &str) -> Result<Option<CachedAnswer>, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(CacheError::Lookup(sqlx::Error::PoolClosed));
        }
        let key = normalize_question(question);
        Ok(self
            .curated
            .iter()
            .position(|(q, _)| normalize_question(q) == key)
            .map(|idx| CachedAnswer {
                id: idx as i64 + 1,
                answer: self.curated[idx].1.clone(),
                tier: CacheTier::Curated,
            }))
    }

    async fn record(&self, question: &str, answer: &str) -> Result<i64, CacheError> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(CacheError::Write(sqlx::Error::PoolClosed));
        }
        let mut log = self.log.lock().unwrap();
        log.push((question.to_string(), answer.to_string()));
        Ok(log.len() as i64)
    }

    async fn count_answered(&self) -> Result<i64, CacheError> {
        Ok(self.log.lock().unwrap().len() as i64)
    }
}

pub struct UnitEmbedder;

#[async_trait]
impl Embedder for UnitEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
        Ok(vec![1.0, 0.0])
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Returns `limit` synthetic passages `doc-1..doc-N` for every search.
#[derive(Default)]
pub struct CountingIndex {
    pub searches: AtomicUsize,
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn search(&self, _query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok((1..=limit as i64)
            .map(|id| ScoredChunk {
                chunk_id: id,
                content: format!("doc-{}", id),
                score: 0.9,
            })
            .collect())
    }

    async fn replace_all(
        &self,
        chunks: Vec<KnowledgeChunk>,
        _embedding_model: &str,
    ) -> Result<usize, IndexError> {
        Ok(chunks.len())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(0)
    }

    fn dimension(&self) -> usize {
        2
    }
}

#[derive(Default)]
pub struct CountingGenerator {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub fail: bool,
}

impl CountingGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(RagError::Generation("inference backend crashed".to_string()));
        }
        Ok(GENERATED_ANSWER.to_string())
    }
}

pub fn fake_pipeline(index: Arc<CountingIndex>, generator: Arc<CountingGenerator>) -> RagPipeline {
    RagPipeline::new(
        Arc::new(UnitEmbedder),
        Retriever::new(index, 5),
        PromptAssembler::from_config(&PromptConfig::default()),
        generator,
        &GenerationConfig::default(),
    )
}
