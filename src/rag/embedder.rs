//! Query embedding.
//!
//! Questions are prefixed with the same task instruction that was used when
//! the knowledge base was embedded, then normalized to unit length so cosine
//! and dot-product ranking agree.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::config::EmbeddingConfig;
use crate::llm::LlamaService;
use crate::vector_math::l2_normalize;

use super::error::RagError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns a unit-length vector of [`Embedder::dimension`] floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    fn dimension(&self) -> usize;
}

/// Embedder backed by a `llama-server` running in embedding mode.
pub struct LlamaEmbedder {
    server: LlamaService,
    instruction_prefix: String,
    dimension: usize,
}

impl LlamaEmbedder {
    pub fn new(server: LlamaService, config: &EmbeddingConfig) -> Self {
        Self {
            server,
            instruction_prefix: config.instruction_prefix.clone(),
            dimension: config.dimension,
        }
    }

    async fn request_raw(&self, input: &str) -> Result<Vec<f32>, RagError> {
        let url = format!("{}/embedding", self.server.base_url());
        let res = self
            .server
            .client()
            .post(&url)
            .json(&json!({ "content": input }))
            .send()
            .await
            .map_err(RagError::embedding)?;

        if !res.status().is_success() {
            return Err(RagError::Embedding(format!(
                "embedding server returned {}",
                res.status()
            )));
        }

        let data: Value = res.json().await.map_err(RagError::embedding)?;
        parse_embedding_response(&data)
            .ok_or_else(|| RagError::Embedding("invalid embedding response".to_string()))
    }
}

#[async_trait]
impl Embedder for LlamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let input = with_instruction(&self.instruction_prefix, text);
        let raw = self.request_raw(&input).await?;
        finalize_embedding(raw, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub fn with_instruction(prefix: &str, text: &str) -> String {
    format!("{}{}", prefix, text)
}

/// Checks the dimension and normalizes to unit length.
pub fn finalize_embedding(raw: Vec<f32>, dimension: usize) -> Result<Vec<f32>, RagError> {
    if raw.len() != dimension {
        return Err(RagError::Embedding(format!(
            "expected {} dimensions, got {}",
            dimension,
            raw.len()
        )));
    }

    l2_normalize(&raw)
        .ok_or_else(|| RagError::Embedding("embedding has zero or non-finite norm".to_string()))
}

/// Accepts both `llama-server` response shapes:
/// `{"embedding": [..]}` and `[{"index": 0, "embedding": [[..]]}]`.
pub fn parse_embedding_response(data: &Value) -> Option<Vec<f32>> {
    let embedding = match data {
        Value::Object(map) => map.get("embedding")?,
        Value::Array(items) => items.first()?.get("embedding")?,
        _ => return None,
    };

    let flat = match embedding.as_array()?.first() {
        Some(Value::Array(_)) => embedding.as_array()?.first()?,
        _ => embedding,
    };

    flat.as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}
