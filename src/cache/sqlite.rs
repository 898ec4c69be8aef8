//! SQLite-backed answer cache.
//!
//! Two append-only tables share one database: `qa_entries` holds curated
//! pairs from the offline import, `answered_questions` logs every generated
//! answer. Both carry a `question_lower` column filled in at insert time,
//! because SQLite's `lower()` only folds ASCII.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{normalize_question, AnswerCache, CacheError, CacheTier, CachedAnswer};

#[derive(Debug, Clone)]
pub struct SqliteAnswerCache {
    pool: SqlitePool,
    use_answer_log: bool,
}

impl SqliteAnswerCache {
    pub async fn with_path(db_path: &Path, max_connections: u32) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        Self::open(options, max_connections).await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(CacheError::Connect)?
            .create_if_missing(true);
        Self::open(options, max_connections).await
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, CacheError> {
        let options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(CacheError::Connect)?;

        let cache = Self {
            pool,
            use_answer_log: true,
        };
        cache.init_schema().await.map_err(CacheError::Connect)?;
        Ok(cache)
    }

    /// Whether a curated miss falls through to previously generated answers.
    pub fn with_answer_log(mut self, enabled: bool) -> Self {
        self.use_answer_log = enabled;
        self
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for table in ["qa_entries", "answered_questions"] {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    question TEXT NOT NULL,
                    question_lower TEXT NOT NULL,
                    answer TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )"
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_question_lower ON {table}(question_lower, id)"
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Adds a curated pair. Used by the offline import; the text is stored
    /// exactly as given.
    pub async fn insert_qa_entry(&self, question: &str, answer: &str) -> Result<i64, CacheError> {
        self.insert("qa_entries", question, answer).await
    }

    pub async fn count_qa_entries(&self) -> Result<i64, CacheError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM qa_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::Lookup)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert(&self, table: &str, question: &str, answer: &str) -> Result<i64, CacheError> {
        let result = sqlx::query(&format!(
            "INSERT INTO {table} (question, question_lower, answer, created_at)
             VALUES (?1, ?2, ?3, ?4)"
        ))
        .bind(question)
        .bind(normalize_question(question))
        .bind(answer)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(CacheError::Write)?;

        Ok(result.last_insert_rowid())
    }

    async fn find_in(&self, table: &str, key: &str) -> Result<Option<(i64, String)>, CacheError> {
        let row = sqlx::query(&format!(
            "SELECT id, answer FROM {table} WHERE question_lower = ?1 ORDER BY id ASC LIMIT 1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::Lookup)?;

        Ok(row.map(|row| (row.get("id"), row.get("answer"))))
    }
}

#[async_trait]
impl AnswerCache for SqliteAnswerCache {
    async fn lookup(&self, question: &str) -> Result<Option<CachedAnswer>, CacheError> {
        let key = normalize_question(question);

        if let Some((id, answer)) = self.find_in("qa_entries", &key).await? {
            return Ok(Some(CachedAnswer {
                id,
                answer,
                tier: CacheTier::Curated,
            }));
        }

        if !self.use_answer_log {
            return Ok(None);
        }

        Ok(self
            .find_in("answered_questions", &key)
            .await?
            .map(|(id, answer)| CachedAnswer {
                id,
                answer,
                tier: CacheTier::AnswerLog,
            }))
    }

    async fn record(&self, question: &str, answer: &str) -> Result<i64, CacheError> {
        self.insert("answered_questions", question, answer).await
    }

    async fn count_answered(&self) -> Result<i64, CacheError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM answered_questions")
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::Lookup)
    }

    async fn close(&self) {
        SqliteAnswerCache::close(self).await;
    }
}
