//! Configuration loading, document indexing, retrieval and question answering.

pub mod answer;
pub mod config;
pub mod indexer;
pub mod retriever;

pub use answer::{AnswerError, AnswerPipeline, NOT_FOUND_MESSAGE};
pub use config::Config;
pub use indexer::{IndexOutcome, Indexer};
pub use retriever::{Retrieved, RetrievedChunk, Retriever};
