//! Retrieval-augmented generation: question in, grounded answer out.

pub mod embedder;
pub mod error;
pub mod gate;
pub mod generator;
pub mod index;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod sqlite;

pub use embedder::{Embedder, LlamaEmbedder};
pub use error::RagError;
pub use generator::{Generator, LlamaGenerator};
pub use index::{IndexError, KnowledgeChunk, ScoredChunk, VectorIndex};
pub use pipeline::RagPipeline;
pub use prompt::PromptAssembler;
pub use retriever::Retriever;
pub use sqlite::SqliteVectorIndex;
