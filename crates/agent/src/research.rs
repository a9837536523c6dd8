//! Evidence gathering across sub-queries and source categories.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::types::SubQuery;
use diligence_core::config::PipelineConfig;
use diligence_core::AppResult;
use diligence_knowledge::{
    aggregate, BiasAdjuster, CandidatePool, Category, EvidenceSet, Reranker, Retriever,
};

/// Sizes and fan-out limits of the retrieval stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchSettings {
    pub categories: Vec<Category>,
    pub retrieval_top_k: usize,
    pub candidate_rerank_top_k: usize,
    pub evidence_size: usize,
    pub concurrency: usize,
}

impl ResearchSettings {
    pub fn from_pipeline(pipeline: &PipelineConfig) -> AppResult<Self> {
        let categories = if pipeline.categories.is_empty() {
            Category::ALL.to_vec()
        } else {
            Category::parse_list(&pipeline.categories)?
        };

        Ok(Self {
            categories,
            retrieval_top_k: pipeline.retrieval_top_k,
            candidate_rerank_top_k: pipeline.candidate_rerank_top_k,
            evidence_size: pipeline.evidence_size,
            concurrency: pipeline.retrieval_concurrency.max(1),
        })
    }
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            retrieval_top_k: 20,
            candidate_rerank_top_k: 10,
            evidence_size: 10,
            concurrency: 4,
        }
    }
}

/// Runs the retrieve stage: search, rerank, aggregate, bias, final ranking.
pub struct Researcher {
    retriever: Arc<dyn Retriever>,
    reranker: Arc<dyn Reranker>,
    global_reranker: Option<Arc<dyn Reranker>>,
    bias: BiasAdjuster,
    settings: ResearchSettings,
}

impl Researcher {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        reranker: Arc<dyn Reranker>,
        bias: BiasAdjuster,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            retriever,
            reranker,
            global_reranker: None,
            bias,
            settings,
        }
    }

    /// Rerank the aggregated pool against the original query before truncation.
    pub fn with_global_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.global_reranker = Some(reranker);
        self
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Gather the evidence set for `query` from every sub-query × category.
    ///
    /// A failed search contributes an empty pool; this stage never fails.
    pub async fn research(&self, query: &str, sub_queries: &[SubQuery]) -> EvidenceSet {
        let branches: Vec<(&SubQuery, Category)> = sub_queries
            .iter()
            .flat_map(|sq| self.settings.categories.iter().map(move |&c| (sq, c)))
            .collect();

        info!(
            sub_queries = sub_queries.len(),
            branches = branches.len(),
            "Retrieving evidence"
        );

        let pools: Vec<CandidatePool> = stream::iter(branches)
            .map(|(sub_query, category)| self.search_branch(sub_query, category))
            .buffered(self.settings.concurrency)
            .collect()
            .await;

        let retrieved: usize = pools.iter().map(Vec::len).sum();
        let aggregated = aggregate(pools);
        debug!(
            retrieved,
            unique = aggregated.len(),
            "Aggregated candidate pools"
        );

        let adjusted = self.bias.adjust_default(aggregated.into_fragments());
        let mut evidence = EvidenceSet::from_fragments(adjusted);
        evidence.sort_by_final_score();

        if let Some(global) = &self.global_reranker {
            let ranked = global
                .rerank(query, evidence.into_fragments(), self.settings.evidence_size)
                .await;
            evidence = EvidenceSet::from_fragments(ranked);
        }
        evidence.truncate(self.settings.evidence_size);

        info!(
            fragments = evidence.len(),
            mean_score = evidence.mean_final_score(),
            "Evidence set ready"
        );
        evidence
    }

    async fn search_branch(&self, sub_query: &SubQuery, category: Category) -> CandidatePool {
        let pool = match self
            .retriever
            .search(&sub_query.text, self.settings.retrieval_top_k, Some(category))
            .await
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(
                    sub_query = %sub_query.text,
                    category = %category,
                    "Search failed, continuing without this branch: {}",
                    e
                );
                return Vec::new();
            }
        };

        if pool.is_empty() {
            return pool;
        }

        let mut ranked = self
            .reranker
            .rerank(&sub_query.text, pool, self.settings.candidate_rerank_top_k)
            .await;
        for fragment in &mut ranked {
            fragment.provenance.originating_sub_query = Some(sub_query.text.clone());
        }

        debug!(
            sub_query = %sub_query.text,
            category = %category,
            returned = ranked.len(),
            "Branch complete"
        );
        ranked
    }
}
