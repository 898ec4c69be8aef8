use std::path::PathBuf;

use crate::core::config::ModelEndpointConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Generation,
    Embedding,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Generation => "generation",
            ModelRole::Embedding => "embedding",
        }
    }
}

/// Resolved launch parameters for one `llama-server` instance.
#[derive(Debug, Clone)]
pub struct ModelRuntimeConfig {
    pub role: ModelRole,
    pub model_key: String,
    pub model_path: Option<PathBuf>,
    pub external_url: Option<String>,
    pub port: u16,
    pub n_ctx: u32,
    pub n_batch: u32,
    pub n_gpu_layers: i32,
    pub seed: Option<u64>,
    pub pooling: Option<String>,
}

impl ModelRuntimeConfig {
    pub fn from_endpoint(role: ModelRole, endpoint: &ModelEndpointConfig, seed: Option<u64>) -> Self {
        Self {
            role,
            model_key: endpoint.model_id.clone(),
            model_path: endpoint.path.clone(),
            external_url: endpoint
                .base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            port: endpoint.port,
            n_ctx: endpoint.n_ctx,
            n_batch: endpoint.n_batch,
            n_gpu_layers: endpoint.n_gpu_layers,
            seed,
            pooling: endpoint.pooling.clone(),
        }
    }

    pub fn is_external(&self) -> bool {
        self.external_url.is_some()
    }

    pub fn base_url(&self) -> String {
        match &self.external_url {
            Some(url) => url.clone(),
            None => format!("http://127.0.0.1:{}", self.port),
        }
    }

    /// Command-line arguments for a managed `llama-server`.
    pub fn server_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.model_path {
            args.push("-m".to_string());
            args.push(path.to_string_lossy().to_string());
        }
        args.extend([
            "--host".to_string(),
            "127.0.0.1".to_string(),
            "--port".to_string(),
            self.port.to_string(),
            "-c".to_string(),
            self.n_ctx.to_string(),
            "-b".to_string(),
            self.n_batch.to_string(),
        ]);

        if self.n_gpu_layers >= 0 {
            args.push("-ngl".to_string());
            args.push(self.n_gpu_layers.to_string());
        }
        if let Some(seed) = self.seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        if self.role == ModelRole::Embedding {
            args.push("--embedding".to_string());
            if let Some(pooling) = &self.pooling {
                args.push("--pooling".to_string());
                args.push(pooling.clone());
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{EmbeddingConfig, GenerationConfig};

    #[test]
    fn embedding_args_enable_embedding_mode() {
        let mut endpoint = EmbeddingConfig::default().model;
        endpoint.path = Some(PathBuf::from("/models/embed.gguf"));
        let config = ModelRuntimeConfig::from_endpoint(ModelRole::Embedding, &endpoint, None);

        let args = config.server_args();
        assert!(args.contains(&"--embedding".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--pooling" && w[1] == "mean"));
        assert!(args.windows(2).any(|w| w[0] == "-m" && w[1] == "/models/embed.gguf"));
        assert!(!args.contains(&"--seed".to_string()));
    }

    #[test]
    fn generation_args_carry_context_batch_and_seed() {
        let endpoint = GenerationConfig::default().model;
        let config = ModelRuntimeConfig::from_endpoint(ModelRole::Generation, &endpoint, Some(42));

        let args = config.server_args();
        assert!(args.windows(2).any(|w| w[0] == "-c" && w[1] == "8192"));
        assert!(args.windows(2).any(|w| w[0] == "-b" && w[1] == "128"));
        assert!(args.windows(2).any(|w| w[0] == "--seed" && w[1] == "42"));
        assert!(!args.contains(&"--embedding".to_string()));
    }

    #[test]
    fn external_url_is_used_verbatim_without_trailing_slash() {
        let mut endpoint = GenerationConfig::default().model;
        endpoint.base_url = Some("http://gpu-box:8080/".to_string());
        let config = ModelRuntimeConfig::from_endpoint(ModelRole::Generation, &endpoint, None);

        assert!(config.is_external());
        assert_eq!(config.base_url(), "http://gpu-box:8080");
    }
}
