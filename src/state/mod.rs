use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::answer::AnswerService;
use crate::cache::{AnswerCache, SqliteAnswerCache};
use crate::core::config::{AppConfig, AppPaths};
use crate::llm::{LlamaService, ModelRole, ModelRuntimeConfig};
use crate::rag::{
    Embedder, LlamaEmbedder, LlamaGenerator, PromptAssembler, RagPipeline, Retriever,
    SqliteVectorIndex, VectorIndex,
};

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// Holds the configuration, both stores, the answer service built on top of
/// them, and the model servers that must be stopped on shutdown.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub answers: Arc<AnswerService>,
    pub cache: Arc<dyn AnswerCache>,
    pub index: Arc<dyn VectorIndex>,
    servers: Vec<LlamaService>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Opens the answer cache and the knowledge index
    /// 2. Starts (or health-checks) the embedding and generation servers
    /// 3. Checks that query vectors fit the index
    /// 4. Wires the RAG pipeline and the answer service
    pub async fn initialize(
        paths: Arc<AppPaths>,
        config: AppConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let cache = match &config.storage.database_url {
            Some(url) => SqliteAnswerCache::connect(url, config.storage.max_connections).await,
            None => SqliteAnswerCache::with_path(&paths.db_path, config.storage.max_connections).await,
        }
        .map_err(|e| InitializationError::Cache(e.into()))?
        .with_answer_log(config.cache.use_answer_log);

        let index = match &config.storage.index_url {
            Some(url) => SqliteVectorIndex::connect(url, config.embedding.dimension).await,
            None => SqliteVectorIndex::with_path(&paths.index_path, config.embedding.dimension).await,
        }
        .map_err(|e| InitializationError::Index(e.into()))?;

        match index.count().await {
            Ok(0) => tracing::warn!("Knowledge index is empty; answers will have no context"),
            Ok(n) => tracing::info!("Knowledge index holds {} chunks", n),
            Err(e) => tracing::warn!("Failed to count knowledge chunks: {}", e),
        }
        if let Ok(Some(model)) = index.embedding_model().await {
            if model != config.embedding.model.model_id {
                tracing::warn!(
                    "Knowledge index was built with '{}' but queries use '{}'",
                    model,
                    config.embedding.model.model_id
                );
            }
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| InitializationError::Http(e.into()))?;

        let embedding_server = LlamaService::new(
            ModelRuntimeConfig::from_endpoint(ModelRole::Embedding, &config.embedding.model, None),
            config.llama_server_binary.clone(),
            &paths,
            client.clone(),
        );
        let generation_server = LlamaService::new(
            ModelRuntimeConfig::from_endpoint(
                ModelRole::Generation,
                &config.generation.model,
                Some(config.generation.sampling.seed),
            ),
            config.llama_server_binary.clone(),
            &paths,
            client,
        );
        let servers = vec![embedding_server.clone(), generation_server.clone()];

        for server in &servers {
            if let Err(e) = server.start().await {
                for started in &servers {
                    started.shutdown().await;
                }
                return Err(InitializationError::Llm {
                    role: server.config().role.as_str(),
                    source: e.into(),
                });
            }
        }

        let cache: Arc<dyn AnswerCache> = Arc::new(cache);
        let index: Arc<dyn VectorIndex> = Arc::new(index);
        let embedder: Arc<dyn Embedder> =
            Arc::new(LlamaEmbedder::new(embedding_server, &config.embedding));

        if let Err(e) = check_dimensions(embedder.as_ref(), index.as_ref()) {
            for server in &servers {
                server.shutdown().await;
            }
            cache.close().await;
            index.close().await;
            return Err(e);
        }

        let rag = RagPipeline::new(
            embedder,
            Retriever::new(index.clone(), config.retrieval.top_k),
            PromptAssembler::from_config(&config.prompt),
            Arc::new(LlamaGenerator::new(
                generation_server,
                config.generation.sampling.clone(),
            )),
            &config.generation,
        );
        let answers = Arc::new(AnswerService::new(
            cache.clone(),
            rag,
            config.server.max_question_length,
        ));

        Ok(Self::from_parts(config, answers, cache, index, servers))
    }

    /// Assembles state from already built components.
    pub fn from_parts(
        config: AppConfig,
        answers: Arc<AnswerService>,
        cache: Arc<dyn AnswerCache>,
        index: Arc<dyn VectorIndex>,
        servers: Vec<LlamaService>,
    ) -> Arc<Self> {
        Arc::new(AppState {
            config: Arc::new(config),
            answers,
            cache,
            index,
            servers,
        })
    }

    /// Stops managed model servers and closes both store pools.
    pub async fn shutdown(&self) {
        for server in &self.servers {
            server.shutdown().await;
        }
        self.cache.close().await;
        self.index.close().await;
        tracing::info!("Model servers stopped and stores closed");
    }
}

/// Query vectors must have the width the index was built with.
fn check_dimensions(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
) -> Result<(), InitializationError> {
    if embedder.dimension() != index.dimension() {
        return Err(InitializationError::DimensionMismatch {
            embedder: embedder.dimension(),
            index: index.dimension(),
        });
    }
    Ok(())
}
