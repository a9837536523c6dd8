//! Pointwise reranking through a cross-encoder relevance model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{fallback_with_warning, Reranker};
use crate::types::Fragment;
use diligence_core::{AppError, AppResult};
use diligence_llm::providers::{send_error, status_error};

const RERANK_ENDPOINT: &str = "/rerank";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Scores (query, passage) pairs jointly.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// One score per passage, in input order.
    async fn score_batch(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>>;

    async fn score(&self, query: &str, passage: &str) -> AppResult<f32> {
        let scores = self.score_batch(query, &[passage.to_string()]).await?;
        scores
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Retrieval("Relevance model returned no score".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    index: usize,
    score: f32,
}

/// Relevance scorer for a text-embeddings-inference style `/rerank` endpoint.
#[derive(Debug, Clone)]
pub struct HttpRelevanceScorer {
    client: Client,
    base_url: String,
}

impl HttpRelevanceScorer {
    pub fn new(endpoint: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Retrieval(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RelevanceScorer for HttpRelevanceScorer {
    async fn score_batch(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}{}", self.base_url, RERANK_ENDPOINT);
        let request = ScoreRequest {
            query,
            texts: passages,
            raw_scores: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error("cross-encoder", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("cross-encoder", status, &body));
        }

        let entries: Vec<ScoreEntry> = response.json().await.map_err(|e| {
            AppError::Retrieval(format!("Failed to parse cross-encoder response: {}", e))
        })?;

        let mut scores = vec![None; passages.len()];
        for entry in entries {
            if let Some(slot) = scores.get_mut(entry.index) {
                *slot = Some(entry.score);
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                score.ok_or_else(|| {
                    AppError::Retrieval(format!("Cross-encoder returned no score for passage {}", i))
                })
            })
            .collect()
    }
}

/// Reranker that scores every candidate with a [`RelevanceScorer`].
pub struct CrossEncoderReranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl CrossEncoderReranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    fn name(&self) -> &str {
        "pointwise"
    }

    async fn rerank(&self, query: &str, candidates: Vec<Fragment>, top_k: usize) -> Vec<Fragment> {
        if candidates.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let passages: Vec<String> = candidates.iter().map(|f| f.text.clone()).collect();
        let scores = match self.scorer.score_batch(query, &passages).await {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                let reason = format!(
                    "expected {} scores, got {}",
                    candidates.len(),
                    scores.len()
                );
                return fallback_with_warning(self.name(), &reason, candidates, top_k);
            }
            Err(e) => return fallback_with_warning(self.name(), &e.to_string(), candidates, top_k),
        };

        let mut scored: Vec<(f32, Fragment)> = scores.into_iter().zip(candidates).collect();
        // sort_by is stable, so equal scores keep input order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        debug!(returned = scored.len(), "Pointwise rerank applied");

        scored
            .into_iter()
            .map(|(score, mut fragment)| {
                fragment.apply_rerank_score(score);
                fragment
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    /// Scores passages by how often they mention the query.
    struct CountingScorer;

    #[async_trait]
    impl RelevanceScorer for CountingScorer {
        async fn score_batch(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>> {
            let needle = query.to_lowercase();
            Ok(passages
                .iter()
                .map(|p| p.to_lowercase().matches(&needle).count() as f32 / 10.0)
                .collect())
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl RelevanceScorer for FailingScorer {
        async fn score_batch(&self, _query: &str, _passages: &[String]) -> AppResult<Vec<f32>> {
            Err(AppError::Timeout("cross-encoder".to_string()))
        }
    }

    struct ShortScorer;

    #[async_trait]
    impl RelevanceScorer for ShortScorer {
        async fn score_batch(&self, _query: &str, _passages: &[String]) -> AppResult<Vec<f32>> {
            Ok(vec![0.9])
        }
    }

    fn candidates() -> Vec<Fragment> {
        vec![
            Fragment::new("a", "nothing relevant", Category::News).with_fused_score(0.8),
            Fragment::new("b", "apple apple", Category::News).with_fused_score(0.1),
            Fragment::new("c", "apple once", Category::News).with_fused_score(0.2),
            Fragment::new("d", "still nothing", Category::News).with_fused_score(0.3),
        ]
    }

    fn ids(fragments: &[Fragment]) -> Vec<&str> {
        fragments.iter().map(|f| f.fragment_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_sorted_by_relevance_with_stable_ties() {
        let reranker = CrossEncoderReranker::new(Arc::new(CountingScorer));
        let ranked = reranker.rerank("apple", candidates(), 4).await;

        assert_eq!(ids(&ranked), vec!["b", "c", "a", "d"]);
        assert_eq!(ranked[0].rerank_score, Some(0.2));
        assert_eq!(ranked[0].final_score, 0.2);
        assert_eq!(ranked[2].final_score, 0.0);
    }

    #[tokio::test]
    async fn test_truncates_to_top_k() {
        let reranker = CrossEncoderReranker::new(Arc::new(CountingScorer));
        let ranked = reranker.rerank("apple", candidates(), 1).await;
        assert_eq!(ids(&ranked), vec!["b"]);
    }

    #[tokio::test]
    async fn test_scorer_failure_falls_back() {
        let reranker = CrossEncoderReranker::new(Arc::new(FailingScorer));
        let ranked = reranker.rerank("apple", candidates(), 2).await;

        assert_eq!(ids(&ranked), vec!["a", "b"]);
        assert!(ranked.iter().all(|f| f.rerank_score.is_none()));
        assert_eq!(ranked[0].final_score, 0.8);
    }

    #[tokio::test]
    async fn test_score_count_mismatch_falls_back() {
        let reranker = CrossEncoderReranker::new(Arc::new(ShortScorer));
        let ranked = reranker.rerank("apple", candidates(), 3).await;
        assert_eq!(ids(&ranked), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_single_score_default() {
        let score = CountingScorer.score("apple", "Apple and apple").await.unwrap();
        assert!((score - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let scorer = HttpRelevanceScorer::new("http://127.0.0.1:9/").unwrap();
        assert_eq!(scorer.base_url, "http://127.0.0.1:9");

        let reranker = CrossEncoderReranker::new(Arc::new(scorer));
        let ranked = reranker.rerank("apple", candidates(), 4).await;
        assert_eq!(ids(&ranked), vec!["a", "b", "c", "d"]);
    }
}
