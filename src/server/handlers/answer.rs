use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub const ANSWER_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-answer-source");
pub const AUDIT_STATUS_HEADER: HeaderName = HeaderName::from_static("x-audit-status");
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

#[derive(Debug, Deserialize)]
pub struct AnswerQuery {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub question: String,
    pub answer: String,
}

pub async fn get_answer(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnswerQuery>,
) -> Result<Response, ApiError> {
    let question = query.question.unwrap_or_default();
    let outcome = state.answers.answer(&question).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        ANSWER_SOURCE_HEADER,
        HeaderValue::from_static(outcome.source.as_str()),
    );
    headers.insert(
        AUDIT_STATUS_HEADER,
        HeaderValue::from_static(outcome.audit.as_str()),
    );
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(if outcome.lookup_degraded {
            "degraded"
        } else {
            "ok"
        }),
    );

    let body = AnswerResponse {
        question: outcome.question,
        answer: outcome.answer,
    };
    Ok((headers, Json(body)).into_response())
}
