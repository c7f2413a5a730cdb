//! Core traits for the remote text and embedding service.

mod embedder;
mod llm;

pub use embedder::*;
pub use llm::*;
