//! Reranker that keeps retrieval order.

use async_trait::async_trait;

use super::traits::{fallback_order, Reranker};
use crate::types::Fragment;

/// Keeps retrieval order; used when reranking is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn rerank(&self, _query: &str, candidates: Vec<Fragment>, top_k: usize) -> Vec<Fragment> {
        fallback_order(candidates, top_k)
    }
}
