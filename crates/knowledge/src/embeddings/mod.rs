//! Embedding providers.
//!
//! Text becomes vectors through the [`EmbeddingProvider`] trait. The trigram
//! provider is deterministic and offline; the Ollama provider calls a local
//! embedding model.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
