use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::cache::{AnswerCache, CacheTier};
use crate::core::errors::ApiError;
use crate::rag::{RagError, RagPipeline};

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("invalid question: {0}")]
    InvalidQuestion(String),
    #[error("failed to generate an answer: {0}")]
    Generation(#[source] RagError),
    #[error("answer generation timed out after {}s", .0.as_secs())]
    GenerationTimeout(Duration),
    #[error("too many questions in progress ({0} waiting), try again later")]
    Overloaded(usize),
}

impl From<RagError> for AnswerError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Timeout(after) => AnswerError::GenerationTimeout(after),
            RagError::Overloaded(waiting) => AnswerError::Overloaded(waiting),
            other => AnswerError::Generation(other),
        }
    }
}

impl From<AnswerError> for ApiError {
    fn from(err: AnswerError) -> Self {
        let message = err.to_string();
        match err {
            AnswerError::InvalidQuestion(_) => ApiError::BadRequest(message),
            AnswerError::Generation(_) => ApiError::Internal(message),
            AnswerError::GenerationTimeout(_) => ApiError::GatewayTimeout(message),
            AnswerError::Overloaded(_) => ApiError::ServiceUnavailable(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Curated,
    GeneratedLog,
    Generated,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Curated => "curated",
            AnswerSource::GeneratedLog => "generated_log",
            AnswerSource::Generated => "generated",
        }
    }
}

impl From<CacheTier> for AnswerSource {
    fn from(tier: CacheTier) -> Self {
        match tier {
            CacheTier::Curated => AnswerSource::Curated,
            CacheTier::AnswerLog => AnswerSource::GeneratedLog,
        }
    }
}

/// Whether a freshly generated answer made it into the answer log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    NotNeeded,
    Recorded { id: i64 },
    Failed(String),
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::NotNeeded => "not_needed",
            AuditStatus::Recorded { .. } => "recorded",
            AuditStatus::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub question: String,
    pub answer: String,
    pub source: AnswerSource,
    pub audit: AuditStatus,
    /// The cache could not be read and was treated as a miss.
    pub lookup_degraded: bool,
}

pub struct AnswerService {
    cache: Arc<dyn AnswerCache>,
    rag: RagPipeline,
    max_question_length: usize,
}

impl AnswerService {
    pub fn new(cache: Arc<dyn AnswerCache>, rag: RagPipeline, max_question_length: usize) -> Self {
        Self {
            cache,
            rag,
            max_question_length,
        }
    }

    /// Answers from the cache when possible, otherwise generates and records
    /// the new pair. A failed record does not fail the answer.
    pub async fn answer(&self, question: &str) -> Result<AnswerOutcome, AnswerError> {
        self.validate(question)?;

        let mut lookup_degraded = false;
        match self.cache.lookup(question).await {
            Ok(Some(hit)) => {
                tracing::info!("Cache hit ({:?}, id={})", hit.tier, hit.id);
                return Ok(AnswerOutcome {
                    question: question.to_string(),
                    answer: hit.answer,
                    source: hit.tier.into(),
                    audit: AuditStatus::NotNeeded,
                    lookup_degraded,
                });
            }
            Ok(None) => tracing::debug!("Cache miss, falling back to generation"),
            Err(err) => {
                tracing::warn!("Answer cache unavailable, treating as miss: {}", err);
                lookup_degraded = true;
            }
        }

        let answer = self.rag.answer(question).await.map_err(|err| {
            tracing::error!("Answer generation failed: {}", err);
            AnswerError::from(err)
        })?;

        let audit = match self.cache.record(question, &answer).await {
            Ok(id) => AuditStatus::Recorded { id },
            Err(err) => {
                tracing::error!("Generated answer was not recorded: {}", err);
                AuditStatus::Failed(err.to_string())
            }
        };

        Ok(AnswerOutcome {
            question: question.to_string(),
            answer,
            source: AnswerSource::Generated,
            audit,
            lookup_degraded,
        })
    }

    fn validate(&self, question: &str) -> Result<(), AnswerError> {
        if question.trim().is_empty() {
            return Err(AnswerError::InvalidQuestion(
                "question must not be empty".to_string(),
            ));
        }
        let length = question.chars().count();
        if length > self.max_question_length {
            return Err(AnswerError::InvalidQuestion(format!(
                "question is {} characters long, the limit is {}",
                length, self.max_question_length
            )));
        }
        Ok(())
    }
}
