use std::time::Duration;

use thiserror::Error;

/// Failure of one RAG stage.
///
/// `Embedding`, `Retrieval` and `Generation` all count as a generation
/// failure for the caller; `Timeout` and `Overloaded` are reported
/// separately because they are transient.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("generation queue is full ({0} requests waiting)")]
    Overloaded(usize),
}

impl RagError {
    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::Embedding(err.to_string())
    }

    pub fn retrieval<E: std::fmt::Display>(err: E) -> Self {
        RagError::Retrieval(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        RagError::Generation(err.to_string())
    }
}
