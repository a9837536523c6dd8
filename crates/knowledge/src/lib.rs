//! Evidence retrieval for the Diligence research agent.
//!
//! Fragments of filings, news and encyclopedia articles live in a vector
//! index. Retrieval fuses semantic similarity with BM25, candidates are
//! reranked, pools from many searches are deduplicated, and a bias policy
//! lifts under-served groups before synthesis.
//!
//! ```text
//! query ─► HybridSearchEngine ─► Reranker ─► aggregate ─► BiasAdjuster ─► EvidenceSet
//! ```

pub mod aggregate;
pub mod bias;
pub mod corpus;
pub mod embeddings;
pub mod hybrid;
pub mod lexical;
pub mod rerank;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use aggregate::{aggregate, EvidenceSet};
pub use bias::{BiasAdjuster, BiasPolicy};
pub use corpus::{load_corpus, parse_corpus, seed_index, CorpusEntry};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use hybrid::{CorpusStats, HybridSearchEngine, Retriever};
pub use rerank::{build_reranker, Reranker};
pub use types::{CandidatePool, Category, Fragment, Provenance};
pub use vector_index::{MemoryIndex, VectorIndex};
