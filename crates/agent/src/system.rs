//! Service bootstrap and the `submit` request boundary.

use std::sync::Arc;

use tracing::info;

use crate::evaluator::Evaluator;
use crate::planner::Planner;
use crate::research::{ResearchSettings, Researcher};
use crate::synthesizer::Synthesizer;
use crate::types::ResearchReport;
use crate::workflow::{WorkflowController, WorkflowOutcome};
use diligence_core::{AppConfig, AppError, AppResult, RerankStrategy};
use diligence_knowledge::{
    build_reranker, create_provider, load_corpus, seed_index, BiasAdjuster, BiasPolicy,
    CandidatePool, Category, CorpusStats, EmbeddingProvider, HybridSearchEngine, MemoryIndex,
    Reranker, VectorIndex,
};
use diligence_llm::{create_client, LlmClient, RetryPolicy};
use diligence_prompt::{
    load_prompt, EVALUATE_PROMPT, PLAN_PROMPT, RERANK_PROMPT, SYNTHESIZE_PROMPT,
};

/// A fully wired research pipeline.
pub struct ResearchSystem {
    controller: WorkflowController,
    engine: Arc<HybridSearchEngine>,
    reranker: Arc<dyn Reranker>,
    rerank_top_k: usize,
    retrieval_top_k: usize,
}

impl ResearchSystem {
    /// Connect to the configured services and load the corpus into a fresh index.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let retry = RetryPolicy::from(&config.retry);
        let endpoint = config.resolve_endpoint(&config.provider);
        let api_key = config.resolve_api_key(&config.provider);
        let client = create_client(&config.provider, endpoint.as_deref(), api_key.as_deref(), retry)?;
        let embedder = create_provider(&config.embedding, retry)?;

        let entries = load_corpus(&config.corpus_path())?;
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());
        seed_index(index.as_ref(), embedder.as_ref(), entries).await?;

        Self::assemble(config, client, index, embedder).await
    }

    /// Wire the pipeline around already constructed services.
    pub async fn assemble(
        config: &AppConfig,
        client: Arc<dyn LlmClient>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let pipeline = &config.pipeline;
        let workspace = &config.workspace;
        let model = config.model.as_str();

        let engine =
            Arc::new(HybridSearchEngine::build(index, embedder, pipeline.fusion_alpha).await?);

        let reranker = build_reranker(
            &config.reranker,
            client.clone(),
            model,
            load_prompt(workspace, RERANK_PROMPT)?,
        )?;

        let mut researcher = Researcher::new(
            engine.clone(),
            reranker.clone(),
            BiasAdjuster::new(BiasPolicy::from(&config.bias)),
            ResearchSettings::from_pipeline(pipeline)?,
        );
        if pipeline.global_rerank && config.reranker.strategy != RerankStrategy::None {
            researcher = researcher.with_global_reranker(reranker.clone());
        }

        let controller = WorkflowController::new(
            Planner::new(
                client.clone(),
                model,
                load_prompt(workspace, PLAN_PROMPT)?,
                pipeline.target_sub_query_count,
            ),
            researcher,
            Synthesizer::new(client.clone(), model, load_prompt(workspace, SYNTHESIZE_PROMPT)?),
            Evaluator::new(client, model, load_prompt(workspace, EVALUATE_PROMPT)?),
            pipeline.max_iterations,
        );

        info!(
            provider = %config.provider,
            model,
            reranker = reranker.name(),
            fragments = engine.len(),
            "Research system ready"
        );

        Ok(Self {
            controller,
            engine,
            reranker,
            rerank_top_k: pipeline.rerank_top_k,
            retrieval_top_k: pipeline.retrieval_top_k,
        })
    }

    /// Run the full workflow and keep the trace.
    pub async fn run(&self, query: &str) -> AppResult<WorkflowOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Workflow("Query must not be empty".to_string()));
        }
        self.controller.run(query).await
    }

    /// Answer `query` with the best attempt the workflow produced.
    pub async fn submit(&self, query: &str) -> AppResult<ResearchReport> {
        let outcome = self.run(query).await?;
        ResearchReport::try_from(outcome)
    }

    /// Hybrid search, optionally reranked, for inspecting retrieval.
    ///
    /// `top_k` defaults to the configured rerank size.
    pub async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        top_k: Option<usize>,
        rerank: bool,
    ) -> AppResult<CandidatePool> {
        let top_k = top_k.unwrap_or(self.rerank_top_k);
        let mut pool = self
            .engine
            .search(query, self.retrieval_top_k.max(top_k), category)
            .await?;

        if rerank {
            pool = self.reranker.rerank(query, pool, top_k).await;
        } else {
            pool.truncate(top_k);
        }
        Ok(pool)
    }

    pub fn corpus_stats(&self) -> CorpusStats {
        self.engine.corpus_stats()
    }
}

impl TryFrom<WorkflowOutcome> for ResearchReport {
    type Error = AppError;

    fn try_from(outcome: WorkflowOutcome) -> AppResult<Self> {
        let state = outcome.state;
        let answer = state
            .answer
            .ok_or_else(|| AppError::Workflow("Run finished without an answer".to_string()))?;

        Ok(ResearchReport {
            answer_text: answer.text,
            sources: answer.cited_sources,
            confidence: answer.confidence,
            hallucination_score: state
                .evaluation
                .as_ref()
                .map_or(0.0, |e| e.hallucination_score),
            iteration_count: state.iteration,
            decision: state.evaluation.map(|e| e.decision),
        })
    }
}
