//! Exact-match answer cache contract.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("answer cache lookup failed: {0}")]
    Lookup(#[source] sqlx::Error),
    #[error("failed to record answered question: {0}")]
    Write(#[source] sqlx::Error),
    #[error("answer cache is unavailable: {0}")]
    Connect(#[source] sqlx::Error),
}

/// Which table satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Curated QA pairs imported offline.
    Curated,
    /// Answers generated earlier and recorded in the answer log.
    AnswerLog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAnswer {
    pub id: i64,
    pub answer: String,
    pub tier: CacheTier,
}

#[async_trait]
pub trait AnswerCache: Send + Sync {
    /// Case-insensitive exact match. Whitespace is significant. When several
    /// rows match, the one with the lowest id wins.
    async fn lookup(&self, question: &str) -> Result<Option<CachedAnswer>, CacheError>;

    /// Appends one answered question and returns its id. Never deduplicates.
    async fn record(&self, question: &str, answer: &str) -> Result<i64, CacheError>;

    async fn count_answered(&self) -> Result<i64, CacheError>;

    /// Releases backing resources. Later calls may fail.
    async fn close(&self) {}
}

/// Lookup key for a question. Full Unicode lower-casing, nothing else.
pub fn normalize_question(question: &str) -> String {
    question.to_lowercase()
}
