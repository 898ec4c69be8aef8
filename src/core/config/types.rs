//! Typed application configuration.
//!
//! Every field has a default so a partial (or missing) `config.yml` still
//! yields a complete configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub generation: GenerationConfig,
    /// Path or name of the `llama-server` binary. Resolved from the
    /// project `bin/` directory or `PATH` when unset.
    pub llama_server_binary: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_question_length: usize,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_question_length: DEFAULT_MAX_QUESTION_LENGTH,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite connection string for the QA and audit tables.
    /// Falls back to `<data_dir>/helpdesk.db`.
    pub database_url: Option<String>,
    /// SQLite connection string for the knowledge index.
    /// Falls back to `<data_dir>/knowledge.db`.
    pub index_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            index_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Consult previously generated answers after a curated-table miss.
    pub use_answer_log: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_answer_log: true,
        }
    }
}

/// Where a model is served from.
///
/// With `base_url` set the server is managed externally and only health
/// checked; otherwise a local `llama-server` is spawned from `path`.
///
/// Fields missing from the YAML fall back to the defaults of the role the
/// endpoint belongs to, see [`ModelEndpointConfig::embedding`] and
/// [`ModelEndpointConfig::generation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEndpointConfig {
    pub model_id: String,
    pub path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub port: u16,
    pub n_ctx: u32,
    pub n_batch: u32,
    pub n_gpu_layers: i32,
    pub pooling: Option<String>,
}

impl ModelEndpointConfig {
    pub fn embedding() -> Self {
        Self {
            model_id: EMBEDDING_MODEL_ID.to_string(),
            path: None,
            base_url: None,
            port: EMBEDDING_PORT,
            n_ctx: EMBEDDING_N_CTX,
            n_batch: EMBEDDING_N_BATCH,
            n_gpu_layers: -1,
            pooling: Some(EMBEDDING_POOLING.to_string()),
        }
    }

    pub fn generation() -> Self {
        Self {
            model_id: GENERATION_MODEL_ID.to_string(),
            path: None,
            base_url: None,
            port: GENERATION_PORT,
            n_ctx: GENERATION_N_CTX,
            n_batch: GENERATION_N_BATCH,
            n_gpu_layers: -1,
            pooling: None,
        }
    }
}

/// Endpoint fields as written in the YAML, every one optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EndpointOverrides {
    model_id: Option<String>,
    path: Option<PathBuf>,
    base_url: Option<String>,
    port: Option<u16>,
    n_ctx: Option<u32>,
    n_batch: Option<u32>,
    n_gpu_layers: Option<i32>,
    pooling: Option<String>,
}

impl EndpointOverrides {
    fn apply(self, mut base: ModelEndpointConfig) -> ModelEndpointConfig {
        if let Some(model_id) = self.model_id {
            base.model_id = model_id;
        }
        if self.path.is_some() {
            base.path = self.path;
        }
        if self.base_url.is_some() {
            base.base_url = self.base_url;
        }
        if let Some(port) = self.port {
            base.port = port;
        }
        if let Some(n_ctx) = self.n_ctx {
            base.n_ctx = n_ctx;
        }
        if let Some(n_batch) = self.n_batch {
            base.n_batch = n_batch;
        }
        if let Some(n_gpu_layers) = self.n_gpu_layers {
            base.n_gpu_layers = n_gpu_layers;
        }
        if self.pooling.is_some() {
            base.pooling = self.pooling;
        }
        base
    }
}

fn embedding_endpoint<'de, D>(deserializer: D) -> Result<ModelEndpointConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(EndpointOverrides::deserialize(deserializer)?.apply(ModelEndpointConfig::embedding()))
}

fn generation_endpoint<'de, D>(deserializer: D) -> Result<ModelEndpointConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(EndpointOverrides::deserialize(deserializer)?.apply(ModelEndpointConfig::generation()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    #[serde(deserialize_with = "embedding_endpoint")]
    pub model: ModelEndpointConfig,
    pub instruction_prefix: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: ModelEndpointConfig::embedding(),
            instruction_prefix: EMBEDDING_INSTRUCTION_PREFIX.to_string(),
            dimension: EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub context_header: String,
    pub question_label: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            context_header: CONTEXT_HEADER.to_string(),
            question_label: QUESTION_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: SAMPLING_MAX_TOKENS,
            temperature: SAMPLING_TEMPERATURE,
            top_k: SAMPLING_TOP_K,
            top_p: SAMPLING_TOP_P,
            repeat_penalty: SAMPLING_REPEAT_PENALTY,
            seed: SAMPLING_SEED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(deserialize_with = "generation_endpoint")]
    pub model: ModelEndpointConfig,
    pub sampling: SamplingConfig,
    /// Generations allowed in flight at once. Keep at 1 unless the backend
    /// is known to handle parallel slots.
    pub max_concurrent: usize,
    /// Requests allowed to wait for a generation slot before new ones are
    /// rejected as overloaded.
    pub max_pending: usize,
    pub timeout_secs: u64,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: ModelEndpointConfig::generation(),
            sampling: SamplingConfig::default(),
            max_concurrent: GENERATION_MAX_CONCURRENT,
            max_pending: GENERATION_MAX_PENDING,
            timeout_secs: GENERATION_TIMEOUT_SECS,
        }
    }
}
