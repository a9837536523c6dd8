//! Hybrid retrieval: semantic similarity fused with normalized BM25.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::lexical::{normalize_scores, tokenize, Bm25Index};
use crate::types::{sort_by_score_desc, CandidatePool, Category};
use crate::vector_index::{FragmentPayload, IndexFilter, VectorIndex};
use diligence_core::{AppError, AppResult};

/// Records fetched per scroll call while building the lexical index.
const SCROLL_PAGE_SIZE: usize = 100;

/// Anything that can turn a query into a candidate pool.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        category: Option<Category>,
    ) -> AppResult<CandidatePool>;
}

/// Fragment counts of the loaded corpus.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStats {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
}

impl CorpusStats {
    pub fn count(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut stats = Self::default();
        for category in categories {
            stats.total += 1;
            *stats.by_category.entry(category).or_insert(0) += 1;
        }
        stats
    }
}

/// Hybrid search over a vector index and an in-memory BM25 index.
pub struct HybridSearchEngine {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    alpha: f32,
    ids: Vec<String>,
    payloads: Vec<FragmentPayload>,
    bm25: Bm25Index,
}

impl HybridSearchEngine {
    /// Scan the whole index and build the lexical side.
    ///
    /// `alpha` weights the semantic score: `fused = alpha * semantic + (1 - alpha) * lexical`.
    pub async fn build(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        alpha: f32,
    ) -> AppResult<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(AppError::Config(format!(
                "fusion alpha must be within [0, 1], got {}",
                alpha
            )));
        }

        let mut ids = Vec::new();
        let mut payloads = Vec::new();
        let mut offset = 0;

        loop {
            let page = index.scroll(offset, SCROLL_PAGE_SIZE).await?;
            for record in page.records {
                ids.push(record.id);
                payloads.push(record.payload);
            }
            match page.next_offset {
                Some(next) => offset = next,
                None => break,
            }
        }

        let bm25 = Bm25Index::new(payloads.iter().map(|p| p.text.as_str()));

        tracing::info!(
            fragments = ids.len(),
            embedder = embedder.provider_name(),
            alpha,
            "Hybrid search engine ready"
        );

        Ok(Self {
            index,
            embedder,
            alpha,
            ids,
            payloads,
            bm25,
        })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Number of fragments known to the lexical index.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn corpus_stats(&self) -> CorpusStats {
        CorpusStats::count(self.payloads.iter().map(|p| p.category))
    }

    /// Score the fragments matching `category` against `query`.
    ///
    /// An empty candidate set is an empty pool, not an error.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        category: Option<Category>,
    ) -> AppResult<CandidatePool> {
        let positions: Vec<usize> = (0..self.payloads.len())
            .filter(|&i| category.map_or(true, |c| self.payloads[i].category == c))
            .collect();

        if positions.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let filter = IndexFilter { category };
        let hits = self
            .index
            .query(&query_vector, Some(&filter), positions.len())
            .await?;
        let semantic: HashMap<&str, f32> = hits
            .iter()
            .map(|hit| (hit.id.as_str(), hit.score.clamp(0.0, 1.0)))
            .collect();

        let tokens = tokenize(query);
        let raw_lexical: Vec<f32> = positions
            .iter()
            .map(|&i| self.bm25.score_tokens(&tokens, i))
            .collect();
        let lexical = normalize_scores(&raw_lexical);

        let mut pool: CandidatePool = positions
            .iter()
            .zip(lexical)
            .map(|(&i, lexical_score)| {
                let id = &self.ids[i];
                let semantic_score = semantic.get(id.as_str()).copied().unwrap_or(0.0);
                let fused = fuse(self.alpha, semantic_score, lexical_score);

                let mut fragment = self.payloads[i].to_fragment(id).with_fused_score(fused);
                fragment.semantic_score = semantic_score;
                fragment.lexical_score = lexical_score;
                fragment
            })
            .collect();

        sort_by_score_desc(&mut pool, |f| f.fused_score);
        pool.truncate(top_k);

        debug!(
            query,
            category = ?category,
            candidates = positions.len(),
            returned = pool.len(),
            top_score = pool.first().map(|f| f.fused_score),
            "Hybrid search complete"
        );

        Ok(pool)
    }
}

#[async_trait::async_trait]
impl Retriever for HybridSearchEngine {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        category: Option<Category>,
    ) -> AppResult<CandidatePool> {
        HybridSearchEngine::search(self, query, top_k, category).await
    }
}

/// Linear fusion of the two normalized scores.
fn fuse(alpha: f32, semantic: f32, lexical: f32) -> f32 {
    alpha * semantic + (1.0 - alpha) * lexical
}
