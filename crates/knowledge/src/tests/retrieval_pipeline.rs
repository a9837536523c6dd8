//! Corpus → hybrid search → rerank → aggregate → bias, end to end.

use std::sync::Arc;

use crate::aggregate::aggregate;
use crate::bias::{BiasAdjuster, BiasPolicy};
use crate::corpus::{parse_corpus, seed_index};
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::hybrid::{HybridSearchEngine, Retriever};
use crate::rerank::{ListwiseReranker, PassthroughReranker, Reranker};
use crate::types::{CandidatePool, Category};
use crate::vector_index::{MemoryIndex, VectorIndex};
use diligence_llm::MockLlmClient;
use diligence_prompt::{builtin_prompt, RERANK_PROMPT};

const CORPUS: &str = r#"{"id": "a-10k", "text": "Company A annual report: revenue grew 12 percent on strong cloud demand", "category": "10-K", "group_attributes": ["Company A"]}
{"id": "a-news", "text": "Company A shares rose after cloud revenue beat estimates", "category": "news", "group_attributes": ["Company A"]}
{"id": "b-10k", "text": "Company B annual report: revenue declined amid supply chain risk", "category": "10-K", "group_attributes": ["Company B"]}
{"id": "b-news", "text": "Company B faces lawsuit over supply chain disclosures", "category": "news", "group_attributes": ["Company B"]}
{"id": "c-wiki", "text": "Company C is a semiconductor manufacturer founded in 1968", "category": "wikipedia", "group_attributes": ["Company C"]}
"#;

async fn engine() -> Arc<HybridSearchEngine> {
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(256));

    let entries = parse_corpus(CORPUS).unwrap();
    seed_index(index.as_ref(), embedder.as_ref(), entries)
        .await
        .unwrap();

    Arc::new(HybridSearchEngine::build(index, embedder, 0.7).await.unwrap())
}

async fn search_all(
    engine: &dyn Retriever,
    reranker: &dyn Reranker,
    sub_queries: &[&str],
) -> Vec<CandidatePool> {
    let mut pools = Vec::new();
    for sub_query in sub_queries {
        for category in Category::ALL {
            let pool = engine.search(sub_query, 10, Some(category)).await.unwrap();
            let mut ranked = reranker.rerank(sub_query, pool, 10).await;
            for fragment in &mut ranked {
                fragment.provenance.originating_sub_query = Some(sub_query.to_string());
            }
            pools.push(ranked);
        }
    }
    pools
}

#[tokio::test]
async fn test_overlapping_sub_queries_deduplicate() {
    let engine = engine().await;
    let pools = search_all(
        engine.as_ref(),
        &PassthroughReranker,
        &["Company A cloud revenue", "Company A annual report"],
    )
    .await;

    let total: usize = pools.iter().map(Vec::len).sum();
    let evidence = aggregate(pools);

    assert_eq!(total, 10);
    assert_eq!(evidence.len(), 5);

    let mut ids: Vec<&str> = evidence.iter().map(|f| f.fragment_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn test_category_pools_stay_in_category() {
    let engine = engine().await;
    let pool = engine
        .search("supply chain risk", 10, Some(Category::News))
        .await
        .unwrap();

    assert_eq!(pool.len(), 2);
    assert!(pool.iter().all(|f| f.category == Category::News));
    assert_eq!(pool[0].fragment_id, "b-news");
}

#[tokio::test]
async fn test_listwise_rerank_then_bias() {
    let engine = engine().await;
    let mock = MockLlmClient::with_responder(|_| Ok(r#"{"ranked_indices": [1, 0]}"#.to_string()));
    let reranker = ListwiseReranker::new(
        Arc::new(mock.clone()),
        "test-model",
        builtin_prompt(RERANK_PROMPT).unwrap(),
        300,
    );

    let pool = engine
        .search("annual report revenue", 10, Some(Category::Form10K))
        .await
        .unwrap();
    let original_second = pool[1].fragment_id.clone();

    let ranked = reranker.rerank("annual report revenue", pool, 10).await;
    assert_eq!(ranked[0].fragment_id, original_second);
    assert_eq!(ranked[0].final_score, 1.0);
    assert!((ranked[1].final_score - 0.99).abs() < 1e-6);

    let mut evidence = aggregate(vec![ranked]);
    evidence.sort_by_final_score();

    let adjuster = BiasAdjuster::new(
        BiasPolicy::new(0.60, 1.05).with_group("Company B", None, Some(0.2)),
    );
    let adjusted = adjuster.adjust_default(evidence.into_fragments());

    let b = adjusted.iter().find(|f| f.fragment_id == "b-10k").unwrap();
    let a = adjusted.iter().find(|f| f.fragment_id == "a-10k").unwrap();
    assert!(b.bias_boosted);
    assert!(b.final_score <= 1.0);
    assert!(!a.bias_boosted);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_corpus_stats() {
    let engine = engine().await;
    let stats = engine.corpus_stats();

    assert_eq!(stats.total, 5);
    assert_eq!(stats.by_category[&Category::Form10K], 2);
    assert_eq!(stats.by_category[&Category::News], 2);
    assert_eq!(stats.by_category[&Category::Wikipedia], 1);
    assert!(!stats.by_category.contains_key(&Category::Form10Q));
}
