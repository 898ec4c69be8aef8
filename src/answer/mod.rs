//! Cache-first answering of support questions.

mod service;
#[cfg(test)]
mod tests;

pub use service::{AnswerError, AnswerOutcome, AnswerService, AnswerSource, AuditStatus};
