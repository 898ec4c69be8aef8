use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::config::SamplingConfig;
use crate::llm::LlamaService;

use super::error::RagError;

#[async_trait]
pub trait Generator: Send + Sync {
    /// One completion for `prompt`, trimmed of surrounding whitespace.
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}

/// Generator backed by the `llama-server` `/completion` endpoint.
pub struct LlamaGenerator {
    server: LlamaService,
    sampling: SamplingConfig,
}

impl LlamaGenerator {
    pub fn new(server: LlamaService, sampling: SamplingConfig) -> Self {
        Self { server, sampling }
    }
}

#[async_trait]
impl Generator for LlamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!("{}/completion", self.server.base_url());
        let res = self
            .server
            .client()
            .post(&url)
            .json(&completion_body(prompt, &self.sampling))
            .send()
            .await
            .map_err(RagError::generation)?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "completion server returned {}: {}",
                status, body
            )));
        }

        let data: Value = res.json().await.map_err(RagError::generation)?;
        extract_completion(&data)
    }
}

pub fn completion_body(prompt: &str, sampling: &SamplingConfig) -> Value {
    json!({
        "prompt": prompt,
        "n_predict": sampling.max_tokens,
        "temperature": sampling.temperature,
        "top_k": sampling.top_k,
        "top_p": sampling.top_p,
        "repeat_penalty": sampling.repeat_penalty,
        "seed": sampling.seed,
        "stream": false,
        "cache_prompt": true,
        "stop": ["<|eot_id|>"],
    })
}

pub fn extract_completion(data: &Value) -> Result<String, RagError> {
    let content = data
        .get("content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RagError::Generation("completion response has no content".to_string()))?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(RagError::Generation("model returned an empty completion".to_string()));
    }
    Ok(trimmed.to_string())
}
