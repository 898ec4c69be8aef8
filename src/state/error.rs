use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to open answer cache: {0}")]
    Cache(#[source] anyhow::Error),

    #[error("Failed to open knowledge index: {0}")]
    Index(#[source] anyhow::Error),

    #[error("Embedding width {embedder} does not match knowledge index width {index}")]
    DimensionMismatch { embedder: usize, index: usize },

    #[error("Failed to build HTTP client: {0}")]
    Http(#[source] anyhow::Error),

    #[error("Failed to start {role} model server: {source}")]
    Llm {
        role: &'static str,
        #[source]
        source: anyhow::Error,
    },
}
