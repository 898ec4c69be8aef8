//! Support-desk answer service: exact-match answer cache with a
//! retrieval-augmented generation fallback over a local knowledge base.

pub mod answer;
pub mod cache;
pub mod core;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;

#[cfg(test)]
mod testing;
