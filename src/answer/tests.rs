use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::*;
use crate::cache::{AnswerCache, SqliteAnswerCache};
use crate::core::errors::ApiError;
use crate::rag::RagError;
use crate::testing::{fake_pipeline, CountingGenerator, CountingIndex, MemoryCache, GENERATED_ANSWER};

struct Harness {
    service: AnswerService,
    index: Arc<CountingIndex>,
    generator: Arc<CountingGenerator>,
}

fn harness(cache: Arc<dyn AnswerCache>, generator_fails: bool) -> Harness {
    let index = Arc::new(CountingIndex::default());
    let generator = Arc::new(if generator_fails {
        CountingGenerator::failing()
    } else {
        CountingGenerator::default()
    });
    let rag = fake_pipeline(index.clone(), generator.clone());
    Harness {
        service: AnswerService::new(cache, rag, 2000),
        index,
        generator,
    }
}

#[tokio::test]
async fn cache_hit_skips_generation_and_recording() {
    let cache = Arc::new(MemoryCache::with_curated(&[("Как вернуть заказ?", "A")]));
    let h = harness(cache.clone(), false);

    let outcome = h.service.answer("КАК ВЕРНУТЬ ЗАКАЗ?").await.unwrap();

    assert_eq!(outcome.answer, "A");
    assert_eq!(outcome.question, "КАК ВЕРНУТЬ ЗАКАЗ?");
    assert_eq!(outcome.source, AnswerSource::Curated);
    assert_eq!(outcome.audit, AuditStatus::NotNeeded);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.index.searches.load(Ordering::SeqCst), 0);
    assert!(cache.logged().is_empty());
}

#[tokio::test]
async fn miss_retrieves_once_generates_once_and_records() {
    let cache = Arc::new(MemoryCache::default());
    let h = harness(cache.clone(), false);

    let outcome = h.service.answer("Сроки хранения на ПВЗ?").await.unwrap();

    assert_eq!(outcome.answer, GENERATED_ANSWER);
    assert_eq!(outcome.source, AnswerSource::Generated);
    assert_eq!(outcome.audit, AuditStatus::Recorded { id: 1 });
    assert!(!outcome.lookup_degraded);
    assert_eq!(h.index.searches.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);

    let prompt = h.generator.prompts.lock().unwrap()[0].clone();
    for id in 1..=5 {
        assert!(prompt.contains(&format!("doc-{}", id)));
    }
    assert!(prompt.contains("Сроки хранения на ПВЗ?"));
    assert_eq!(
        cache.logged(),
        vec![(
            "Сроки хранения на ПВЗ?".to_string(),
            GENERATED_ANSWER.to_string()
        )]
    );
}

#[tokio::test]
async fn write_failure_still_returns_answer() {
    let cache = Arc::new(MemoryCache::default());
    cache.fail_write.store(true, Ordering::SeqCst);
    let h = harness(cache.clone(), false);

    let outcome = h.service.answer("Новый вопрос").await.unwrap();

    assert_eq!(outcome.answer, GENERATED_ANSWER);
    assert!(matches!(outcome.audit, AuditStatus::Failed(_)));
    assert_eq!(outcome.audit.as_str(), "failed");
    assert!(cache.logged().is_empty());
}

#[tokio::test]
async fn generator_failure_records_nothing() {
    let cache = Arc::new(MemoryCache::default());
    let h = harness(cache.clone(), true);

    let err = h.service.answer("Новый вопрос").await.unwrap_err();

    assert!(matches!(err, AnswerError::Generation(RagError::Generation(_))));
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
    assert!(cache.logged().is_empty());
    assert!(matches!(ApiError::from(err), ApiError::Internal(_)));
}

#[tokio::test]
async fn lookup_failure_is_treated_as_miss() {
    let cache = Arc::new(MemoryCache::with_curated(&[("Q", "cached")]));
    cache.fail_lookup.store(true, Ordering::SeqCst);
    let h = harness(cache.clone(), false);

    let outcome = h.service.answer("Q").await.unwrap();

    assert!(outcome.lookup_degraded);
    assert_eq!(outcome.source, AnswerSource::Generated);
    assert_eq!(outcome.answer, GENERATED_ANSWER);
    assert_eq!(cache.logged().len(), 1);
}

#[tokio::test]
async fn invalid_questions_are_rejected_before_lookup() {
    let cache = Arc::new(MemoryCache::default());
    let h = harness(cache.clone(), false);

    for question in ["", "   \n\t"] {
        let err = h.service.answer(question).await.unwrap_err();
        assert!(matches!(err, AnswerError::InvalidQuestion(_)));
    }
    let long = "я".repeat(2001);
    let err = h.service.answer(&long).await.unwrap_err();
    assert!(matches!(ApiError::from(err), ApiError::BadRequest(_)));

    assert!(h.service.answer(&"я".repeat(2000)).await.is_ok());
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_question_is_served_from_answer_log() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(
        SqliteAnswerCache::with_path(&dir.path().join("helpdesk.db"), 2)
            .await
            .unwrap(),
    );
    let h = harness(cache.clone(), false);

    let first = h.service.answer("Как принять возврат?").await.unwrap();
    let second = h.service.answer("как принять возврат?").await.unwrap();

    assert_eq!(first.source, AnswerSource::Generated);
    assert_eq!(second.source, AnswerSource::GeneratedLog);
    assert_eq!(second.answer, first.answer);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.count_answered().await.unwrap(), 1);
}

#[tokio::test]
async fn repeated_question_without_answer_log_generates_and_appends_again() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(
        SqliteAnswerCache::with_path(&dir.path().join("helpdesk.db"), 2)
            .await
            .unwrap()
            .with_answer_log(false),
    );
    let h = harness(cache.clone(), false);

    let first = h.service.answer("Как принять возврат?").await.unwrap();
    let second = h.service.answer("Как принять возврат?").await.unwrap();

    assert_eq!(first.answer, second.answer);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.count_answered().await.unwrap(), 2);
}

#[test]
fn rag_errors_map_to_distinct_answer_errors() {
    use std::time::Duration;

    let timeout = AnswerError::from(RagError::Timeout(Duration::from_secs(120)));
    assert!(matches!(timeout, AnswerError::GenerationTimeout(_)));
    assert!(matches!(ApiError::from(timeout), ApiError::GatewayTimeout(_)));

    let overloaded = AnswerError::from(RagError::Overloaded(16));
    assert!(matches!(ApiError::from(overloaded), ApiError::ServiceUnavailable(_)));

    let retrieval = AnswerError::from(RagError::Retrieval("index gone".into()));
    assert!(matches!(retrieval, AnswerError::Generation(_)));
}
