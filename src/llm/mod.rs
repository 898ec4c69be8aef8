pub mod llama_service;
pub mod types;

pub use llama_service::{LlamaService, LlmError};
pub use types::{ModelRole, ModelRuntimeConfig};
