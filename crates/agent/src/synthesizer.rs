//! Grounded answer generation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::types::{Answer, SourceRef};
use diligence_core::AppResult;
use diligence_knowledge::EvidenceSet;
use diligence_llm::LlmClient;
use diligence_prompt::{build_prompt, PromptDefinition};

/// Answer returned when retrieval found nothing.
pub const NO_INFORMATION_ANSWER: &str =
    "I couldn't find relevant information to answer your query.";

/// Writes a cited answer strictly from the evidence set.
pub struct Synthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
        }
    }

    /// Answer `query` from `evidence`.
    ///
    /// Empty evidence yields [`NO_INFORMATION_ANSWER`] without a model call.
    /// Confidence is the mean final score of the evidence.
    pub async fn synthesize(&self, query: &str, evidence: &EvidenceSet) -> AppResult<Answer> {
        if evidence.is_empty() {
            info!("No evidence retrieved, skipping synthesis");
            return Ok(Answer {
                text: NO_INFORMATION_ANSWER.to_string(),
                cited_sources: Vec::new(),
                confidence: 0.0,
            });
        }

        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("documents".to_string(), format_documents(evidence));

        let request = build_prompt(&self.prompt, variables)?.to_request(&self.model);
        let response = self.client.complete(&request).await?;

        let answer = Answer {
            text: response.content.trim().to_string(),
            cited_sources: evidence.iter().map(SourceRef::from).collect(),
            confidence: evidence.mean_final_score(),
        };

        info!(
            sources = answer.cited_sources.len(),
            confidence = answer.confidence,
            "Synthesized answer"
        );
        debug!("Answer: {}", answer.text);

        Ok(answer)
    }
}

/// Evidence rendered for the prompt, one labelled block per fragment.
fn format_documents(evidence: &EvidenceSet) -> String {
    evidence
        .iter()
        .map(|fragment| format!("[Source: {}]\n{}", fragment.source_label(), fragment.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use diligence_knowledge::{Category, Fragment};
    use diligence_llm::MockLlmClient;
    use diligence_prompt::{builtin_prompt, SYNTHESIZE_PROMPT};

    fn synthesizer(mock: &MockLlmClient) -> Synthesizer {
        Synthesizer::new(
            Arc::new(mock.clone()),
            "test-model",
            builtin_prompt(SYNTHESIZE_PROMPT).unwrap(),
        )
    }

    fn evidence() -> EvidenceSet {
        EvidenceSet::from_fragments(vec![
            Fragment::new("a1", "Company A revenue was $10B.", Category::Form10K)
                .with_metadata("company", "Company A")
                .with_fused_score(0.8),
            Fragment::new("b1", "Company B revenue was $7B.", Category::News)
                .with_metadata("company", "Company B")
                .with_fused_score(0.4),
        ])
    }

    #[tokio::test]
    async fn test_empty_evidence_skips_model() {
        let mock = MockLlmClient::new();
        let answer = synthesizer(&mock)
            .synthesize("anything", &EvidenceSet::default())
            .await
            .unwrap();

        assert_eq!(answer.text, NO_INFORMATION_ANSWER);
        assert_eq!(answer.confidence, 0.0);
        assert!(answer.cited_sources.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_answer_sources_and_confidence() {
        let mock = MockLlmClient::new();
        mock.push_response("  Company A earned more [Company A - 10-K].\n");

        let answer = synthesizer(&mock)
            .synthesize("Compare revenue", &evidence())
            .await
            .unwrap();

        assert_eq!(answer.text, "Company A earned more [Company A - 10-K].");
        assert!((answer.confidence - 0.6).abs() < 1e-6);
        let ids: Vec<&str> = answer.cited_sources.iter().map(|s| s.fragment_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1"]);
        assert_eq!(answer.cited_sources[1].content, "Company B revenue was $7B.");
        assert_eq!(answer.cited_sources[0].label, "Company A - 10-K");
    }

    #[tokio::test]
    async fn test_prompt_carries_documents_and_system() {
        let mock = MockLlmClient::new();
        mock.push_response("ok");

        synthesizer(&mock)
            .synthesize("Compare revenue", &evidence())
            .await
            .unwrap();

        let request = &mock.requests()[0];
        assert!(request.system().unwrap().contains("ONLY on the provided documents"));
        let user = request.user_text();
        assert!(user.contains("[Source: Company A - 10-K]\nCompany A revenue was $10B."));
        assert!(user.contains("[Company - Source]"));
        assert_eq!(request.temperature, Some(0.5));
    }
}
