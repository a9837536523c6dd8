//! Fact-checking answers against their sources.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::types::{Decision, EvaluationResult, SourceRef};
use diligence_core::AppResult;
use diligence_llm::{extract_json_object, LlmClient};
use diligence_prompt::{build_prompt, PromptDefinition};

/// Reason recorded when the verdict cannot be parsed.
pub const EVALUATION_FAILED_REASON: &str = "Evaluation failed, defaulting to approval.";

/// Characters of each source shown to the fact-checker.
const SOURCE_CHARS: usize = 2000;
const NO_SOURCES_TEXT: &str = "No external context was provided.";
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Judges whether an answer is grounded in its sources.
pub struct Evaluator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    current_date: Option<String>,
}

impl Evaluator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            current_date: None,
        }
    }

    /// Fix the "current date" shown to the model instead of today's month.
    pub fn with_current_date(mut self, date: impl Into<String>) -> Self {
        self.current_date = Some(date.into());
        self
    }

    /// Approve or reject `answer` for `query` given `sources`.
    ///
    /// Unusable model output approves with a zero hallucination score so a
    /// formatting failure never loops the workflow. Transport errors are
    /// returned.
    pub async fn evaluate(
        &self,
        query: &str,
        answer: &str,
        sources: &[SourceRef],
    ) -> AppResult<EvaluationResult> {
        let current_date = self
            .current_date
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%B %Y").to_string());

        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("sources".to_string(), format_sources(sources));
        variables.insert("answer".to_string(), answer.to_string());
        variables.insert("currentDate".to_string(), current_date);

        let request = build_prompt(&self.prompt, variables)?.to_request(&self.model);
        let response = self.client.complete(&request).await?;

        let result = match extract_json_object(&response.content) {
            Ok(map) => parse_verdict(&map),
            Err(e) => {
                warn!("Evaluator output unparseable, defaulting to approval: {}", e);
                fallback_verdict()
            }
        };

        info!(
            decision = %result.decision,
            confidence = result.confidence,
            hallucination_score = result.hallucination_score,
            "Evaluation: {}",
            result.reason
        );

        Ok(result)
    }
}

fn format_sources(sources: &[SourceRef]) -> String {
    if sources.is_empty() {
        return NO_SOURCES_TEXT.to_string();
    }

    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let content: String = source.content.chars().take(SOURCE_CHARS).collect();
            format!("--- Source {} ---\n{}", i + 1, content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn fallback_verdict() -> EvaluationResult {
    EvaluationResult {
        decision: Decision::Approve,
        reason: EVALUATION_FAILED_REASON.to_string(),
        confidence: DEFAULT_CONFIDENCE,
        hallucination_score: 0.0,
    }
}

/// Read a verdict object, defaulting missing or malformed fields.
fn parse_verdict(map: &Map<String, Value>) -> EvaluationResult {
    let decision = match map.get("decision").and_then(Value::as_str) {
        Some(d) if d.trim().eq_ignore_ascii_case("reject") => Decision::Reject,
        _ => Decision::Approve,
    };

    let reason = map
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason provided")
        .to_string();

    EvaluationResult {
        decision,
        reason,
        confidence: unit_score(map.get("confidence")).unwrap_or(DEFAULT_CONFIDENCE),
        hallucination_score: unit_score(map.get("hallucination_score")).unwrap_or(0.0),
    }
}

/// A number (or numeric string) clamped to [0, 1].
fn unit_score(value: Option<&Value>) -> Option<f32> {
    let raw = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    raw.is_finite().then(|| (raw as f32).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diligence_core::AppError;
    use diligence_knowledge::{Category, Provenance};
    use diligence_llm::{MockLlmClient, MockReply};
    use diligence_prompt::{builtin_prompt, EVALUATE_PROMPT};

    fn evaluator(mock: &MockLlmClient) -> Evaluator {
        Evaluator::new(
            Arc::new(mock.clone()),
            "test-model",
            builtin_prompt(EVALUATE_PROMPT).unwrap(),
        )
        .with_current_date("October 2026")
    }

    fn source(content: &str) -> SourceRef {
        SourceRef {
            fragment_id: "s1".to_string(),
            label: "Company A - news".to_string(),
            category: Category::News,
            group_attributes: vec![],
            provenance: Provenance::default(),
            content: content.to_string(),
            score: 0.5,
        }
    }

    #[tokio::test]
    async fn test_reject_verdict() {
        let mock = MockLlmClient::new();
        mock.push_response(
            r#"{"decision": "REJECT", "reason": "Mentions Company C", "confidence": 0.95, "hallucination_score": 0.9}"#,
        );

        let result = evaluator(&mock)
            .evaluate("q", "answer", &[source("text")])
            .await
            .unwrap();

        assert_eq!(result.decision, Decision::Reject);
        assert_eq!(result.reason, "Mentions Company C");
        assert!((result.hallucination_score - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_citation_in_prose_does_not_hide_reject() {
        let mock = MockLlmClient::new();
        mock.push_response(
            "Source [1] does not mention Company C.\n{\"decision\": \"reject\", \"reason\": \"Company C is not in the sources\", \"confidence\": 0.9, \"hallucination_score\": 0.95}",
        );

        let result = evaluator(&mock)
            .evaluate("q", "answer", &[source("text")])
            .await
            .unwrap();

        assert_eq!(result.decision, Decision::Reject);
        assert_eq!(result.reason, "Company C is not in the sources");
        assert!((result.hallucination_score - 0.95).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_keys_use_defaults() {
        let mock = MockLlmClient::new();
        mock.push_response(r#"{"decision": "maybe"}"#);

        let result = evaluator(&mock).evaluate("q", "a", &[]).await.unwrap();
        assert_eq!(result.decision, Decision::Approve);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.hallucination_score, 0.0);
        assert_eq!(result.reason, "No reason provided");
    }

    #[tokio::test]
    async fn test_scores_clamped() {
        let mock = MockLlmClient::new();
        mock.push_response(r#"{"decision": "approve", "confidence": "1.7", "hallucination_score": -2}"#);

        let result = evaluator(&mock).evaluate("q", "a", &[]).await.unwrap();
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.hallucination_score, 0.0);
    }

    #[tokio::test]
    async fn test_unparseable_output_approves() {
        let mock = MockLlmClient::new();
        mock.push_response("The answer looks fine to me.");
        mock.push_response("[1, 2]");

        let evaluator = evaluator(&mock);
        for _ in 0..2 {
            let result = evaluator.evaluate("q", "a", &[]).await.unwrap();
            assert_eq!(result.decision, Decision::Approve);
            assert_eq!(result.hallucination_score, 0.0);
            assert_eq!(result.reason, EVALUATION_FAILED_REASON);
        }
    }

    #[tokio::test]
    async fn test_prompt_sources_and_date() {
        let mock = MockLlmClient::new();
        mock.push_response(r#"{"decision": "approve"}"#);

        let long = "x".repeat(2500);
        evaluator(&mock)
            .evaluate("Apple revenue?", "It grew.", &[source("first source"), source(&long)])
            .await
            .unwrap();

        let request = &mock.requests()[0];
        let prompt = request.user_text();
        assert!(prompt.contains("--- Source 1 ---\nfirst source"));
        assert!(prompt.contains("--- Source 2 ---"));
        assert!(prompt.contains(&"x".repeat(2000)));
        assert!(!prompt.contains(&"x".repeat(2001)));
        assert!(prompt.contains("October 2026"));
        assert!(prompt.contains("It grew."));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_no_sources_stated() {
        let mock = MockLlmClient::new();
        mock.push_response(r#"{"decision": "approve"}"#);

        evaluator(&mock).evaluate("q", "a", &[]).await.unwrap();
        assert!(mock.requests()[0].user_text().contains(NO_SOURCES_TEXT));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mock = MockLlmClient::new();
        mock.push(MockReply::RateLimited);

        let result = evaluator(&mock).evaluate("q", "a", &[]).await;
        assert!(matches!(result, Err(AppError::RateLimited(_))));
    }
}
