//! Exact-match cache of answered questions.

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteAnswerCache;
pub use store::{normalize_question, AnswerCache, CacheError, CacheTier, CachedAnswer};
