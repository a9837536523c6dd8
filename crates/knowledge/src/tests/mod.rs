//! Cross-module retrieval tests.

mod retrieval_pipeline;
