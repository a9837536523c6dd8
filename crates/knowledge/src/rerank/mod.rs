//! Candidate reranking.
//!
//! Three strategies share the [`Reranker`] contract:
//! - [`ListwiseReranker`]: one LLM call orders the whole candidate set
//! - [`CrossEncoderReranker`]: a relevance model scores each pair
//! - [`PassthroughReranker`]: retrieval order, truncated

pub mod listwise;
pub mod passthrough;
pub mod pointwise;
pub mod traits;

use std::sync::Arc;

use diligence_core::config::RerankerSettings;
use diligence_core::{AppError, AppResult, RerankStrategy};
use diligence_llm::LlmClient;
use diligence_prompt::PromptDefinition;

pub use listwise::ListwiseReranker;
pub use passthrough::PassthroughReranker;
pub use pointwise::{CrossEncoderReranker, HttpRelevanceScorer, RelevanceScorer};
pub use traits::{fallback_order, Reranker};

/// Create the configured reranker.
///
/// The listwise strategy uses `client`/`model` with `rerank_prompt`; the
/// pointwise strategy needs `settings.endpoint`.
pub fn build_reranker(
    settings: &RerankerSettings,
    client: Arc<dyn LlmClient>,
    model: &str,
    rerank_prompt: PromptDefinition,
) -> AppResult<Arc<dyn Reranker>> {
    match settings.strategy {
        RerankStrategy::Listwise => Ok(Arc::new(ListwiseReranker::new(
            client,
            model,
            rerank_prompt,
            settings.snippet_chars,
        ))),
        RerankStrategy::Pointwise => {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("reranker.endpoint is required for the pointwise strategy".to_string())
            })?;
            let scorer = HttpRelevanceScorer::new(endpoint)?;
            Ok(Arc::new(CrossEncoderReranker::new(Arc::new(scorer))))
        }
        RerankStrategy::None => Ok(Arc::new(PassthroughReranker)),
    }
}
