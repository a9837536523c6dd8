//! Reranker trait definition.

use async_trait::async_trait;
use tracing::warn;

use crate::types::Fragment;

/// Reorders candidates by relevance to a query.
///
/// Reranking never fails: an implementation that cannot score the
/// candidates returns them in input order, truncated to `top_k`, with their
/// scores untouched.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Return at most `top_k` candidates, most relevant first.
    ///
    /// Successful scoring sets each returned fragment's `rerank_score` and
    /// replaces its `final_score`.
    async fn rerank(&self, query: &str, candidates: Vec<Fragment>, top_k: usize) -> Vec<Fragment>;
}

/// Input order truncated to `top_k`, scores untouched.
pub fn fallback_order(mut candidates: Vec<Fragment>, top_k: usize) -> Vec<Fragment> {
    candidates.truncate(top_k);
    candidates
}

/// Log the failure and fall back to input order.
pub(crate) fn fallback_with_warning(
    reranker: &str,
    reason: &str,
    candidates: Vec<Fragment>,
    top_k: usize,
) -> Vec<Fragment> {
    warn!(
        reranker,
        candidates = candidates.len(),
        "Rerank failed, keeping retrieval order: {}",
        reason
    );
    fallback_order(candidates, top_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    #[test]
    fn test_fallback_keeps_order_and_scores() {
        let candidates = vec![
            Fragment::new("a", "", Category::News).with_fused_score(0.2),
            Fragment::new("b", "", Category::News).with_fused_score(0.9),
            Fragment::new("c", "", Category::News).with_fused_score(0.5),
        ];

        let kept = fallback_order(candidates, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].fragment_id, "a");
        assert_eq!(kept[0].final_score, 0.2);
        assert!(kept[0].rerank_score.is_none());
    }
}
