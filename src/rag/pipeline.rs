use std::sync::Arc;
use std::time::Instant;

use crate::core::config::GenerationConfig;

use super::embedder::Embedder;
use super::error::RagError;
use super::gate::GenerationGate;
use super::generator::Generator;
use super::prompt::PromptAssembler;
use super::retriever::Retriever;

/// Single-pass embed, retrieve, assemble, generate.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    prompt: PromptAssembler,
    generator: Arc<dyn Generator>,
    gate: GenerationGate,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        prompt: PromptAssembler,
        generator: Arc<dyn Generator>,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            embedder,
            retriever,
            prompt,
            generator,
            gate: GenerationGate::new(
                generation.max_concurrent,
                generation.max_pending,
                generation.timeout(),
            ),
        }
    }

    pub async fn answer(&self, question: &str) -> Result<String, RagError> {
        let started = Instant::now();

        let query = self.embedder.embed(question).await?;
        let documents = self.retriever.retrieve(&query).await?;
        let prompt = self.prompt.build(question, &documents);
        tracing::debug!(
            "Assembled prompt with {} documents ({} bytes)",
            documents.len(),
            prompt.len()
        );

        let generator = self.generator.clone();
        let answer = self
            .gate
            .run(async move { generator.generate(&prompt).await })
            .await?;

        tracing::info!(
            "Generated answer in {} ms ({} chars)",
            started.elapsed().as_millis(),
            answer.chars().count()
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::core::config::PromptConfig;
    use crate::rag::index::{IndexError, KnowledgeChunk, ScoredChunk, VectorIndex};

    struct FixedEmbedder {
        vector: Vec<f32>,
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            if self.fail {
                return Err(RagError::Embedding("server down".to_string()));
            }
            Ok(self.vector.clone())
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }
    }

    struct StaticIndex {
        chunks: Vec<ScoredChunk>,
        limits: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorIndex for StaticIndex {
        async fn search(&self, _query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, IndexError> {
            self.limits.lock().unwrap().push(limit);
            Ok(self.chunks.iter().take(limit).cloned().collect())
        }

        async fn replace_all(
            &self,
            chunks: Vec<KnowledgeChunk>,
            _embedding_model: &str,
        ) -> Result<usize, IndexError> {
            Ok(chunks.len())
        }

        async fn count(&self) -> Result<usize, IndexError> {
            Ok(self.chunks.len())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
        reply: Result<String, String>,
        delay: Option<Duration>,
    }

    impl RecordingGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                reply: Ok(reply.to_string()),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(RagError::Generation)
        }
    }

    fn passages(n: i64) -> Vec<ScoredChunk> {
        (1..=n)
            .map(|id| ScoredChunk {
                chunk_id: id,
                content: format!("passage-{}", id),
                score: 1.0 - id as f32 / 10.0,
            })
            .collect()
    }

    fn pipeline(
        embedder: FixedEmbedder,
        index: Arc<StaticIndex>,
        generator: Arc<RecordingGenerator>,
        generation: &GenerationConfig,
    ) -> RagPipeline {
        RagPipeline::new(
            Arc::new(embedder),
            Retriever::new(index, 3),
            PromptAssembler::from_config(&PromptConfig::default()),
            generator,
            generation,
        )
    }

    #[tokio::test]
    async fn single_pass_uses_top_k_documents_in_prompt() {
        let index = Arc::new(StaticIndex {
            chunks: passages(5),
            limits: Mutex::new(Vec::new()),
        });
        let generator = Arc::new(RecordingGenerator::replying("Ответ"));
        let rag = pipeline(
            FixedEmbedder { vector: vec![1.0, 0.0], fail: false },
            index.clone(),
            generator.clone(),
            &GenerationConfig::default(),
        );

        let answer = rag.answer("Как вернуть заказ?").await.unwrap();

        assert_eq!(answer, "Ответ");
        assert_eq!(*index.limits.lock().unwrap(), vec![3]);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("passage-1") && prompt.contains("passage-3"));
        assert!(!prompt.contains("passage-4"));
        assert!(prompt.contains("Вопрос: Как вернуть заказ?"));
    }

    #[tokio::test]
    async fn embedding_failure_skips_generation() {
        let generator = Arc::new(RecordingGenerator::replying("unused"));
        let rag = pipeline(
            FixedEmbedder { vector: vec![], fail: true },
            Arc::new(StaticIndex { chunks: passages(2), limits: Mutex::new(Vec::new()) }),
            generator.clone(),
            &GenerationConfig::default(),
        );

        let err = rag.answer("q").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generator_failure_is_not_retried() {
        let generator = Arc::new(RecordingGenerator {
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            reply: Err("model crashed".to_string()),
            delay: None,
        });
        let rag = pipeline(
            FixedEmbedder { vector: vec![1.0, 0.0], fail: false },
            Arc::new(StaticIndex { chunks: passages(2), limits: Mutex::new(Vec::new()) }),
            generator.clone(),
            &GenerationConfig::default(),
        );

        let err = rag.answer("q").await.unwrap_err();
        assert!(matches!(err, RagError::Generation(msg) if msg == "model crashed"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_maps_to_timeout() {
        let generator = Arc::new(RecordingGenerator {
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            reply: Ok("late".to_string()),
            delay: Some(Duration::from_secs(600)),
        });
        let config = GenerationConfig {
            timeout_secs: 1,
            ..GenerationConfig::default()
        };
        let rag = pipeline(
            FixedEmbedder { vector: vec![1.0, 0.0], fail: false },
            Arc::new(StaticIndex { chunks: passages(1), limits: Mutex::new(Vec::new()) }),
            generator,
            &config,
        );

        assert!(matches!(rag.answer("q").await, Err(RagError::Timeout(_))));
    }
}
