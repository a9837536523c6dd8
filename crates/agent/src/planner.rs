//! Query decomposition into sub-queries.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::types::SubQuery;
use diligence_core::AppResult;
use diligence_llm::{extract_json, LlmClient};
use diligence_prompt::{build_prompt, PromptDefinition};

/// Breaks a research query into a fixed number of retrievable sub-queries.
pub struct Planner {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    target_count: usize,
}

impl Planner {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        target_count: usize,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            target_count,
        }
    }

    /// Plan sub-queries for `query`, steering away from `feedback` when a
    /// previous answer was rejected.
    ///
    /// Unusable model output degrades to the query itself as the only
    /// sub-query. Model transport errors are returned.
    pub async fn plan(&self, query: &str, feedback: Option<&str>) -> AppResult<Vec<SubQuery>> {
        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("targetCount".to_string(), self.target_count.to_string());
        if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
            variables.insert("feedback".to_string(), feedback.to_string());
        }

        let request = build_prompt(&self.prompt, variables)?.to_request(&self.model);
        let response = self.client.complete(&request).await?;

        let texts = match extract_json(&response.content) {
            Ok(value) => sub_query_texts(&value),
            Err(e) => {
                warn!("Planner output unparseable, using the query as-is: {}", e);
                Vec::new()
            }
        };

        if texts.is_empty() {
            warn!("Planner produced no sub-queries, using the query as-is");
            return Ok(vec![SubQuery::new(query, query)]);
        }

        let sub_queries: Vec<SubQuery> = texts
            .into_iter()
            .take(self.target_count)
            .map(|text| SubQuery::new(text, query))
            .collect();

        info!(
            count = sub_queries.len(),
            replan = feedback.is_some(),
            "Planned sub-queries"
        );
        for (i, sub_query) in sub_queries.iter().enumerate() {
            debug!("  {}. {}", i + 1, sub_query.text);
        }

        Ok(sub_queries)
    }
}

/// Non-blank strings from `{"sub_queries": [...]}` or a bare array.
fn sub_query_texts(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Object(map) => map.get("sub_queries").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    };

    items
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use diligence_core::AppError;
    use diligence_llm::{MockLlmClient, MockReply};
    use diligence_prompt::{builtin_prompt, PLAN_PROMPT};

    fn planner(mock: &MockLlmClient, target: usize) -> Planner {
        Planner::new(
            Arc::new(mock.clone()),
            "test-model",
            builtin_prompt(PLAN_PROMPT).unwrap(),
            target,
        )
    }

    fn texts(sub_queries: &[SubQuery]) -> Vec<&str> {
        sub_queries.iter().map(|s| s.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_object_output() {
        let mock = MockLlmClient::new();
        mock.push_response(r#"{"sub_queries": ["Apple revenue 2023", "  ", "Apple risks"]}"#);

        let plan = planner(&mock, 5).plan("Apple outlook", None).await.unwrap();
        assert_eq!(texts(&plan), vec!["Apple revenue 2023", "Apple risks"]);
        assert!(plan.iter().all(|s| s.parent_query == "Apple outlook"));
    }

    #[tokio::test]
    async fn test_bracketed_prose_before_object() {
        let mock = MockLlmClient::new();
        mock.push_response(
            "Following guideline [1], split by filing.\n{\"sub_queries\": [\"Apple 10-K risks\"]}",
        );

        let plan = planner(&mock, 5).plan("Apple outlook", None).await.unwrap();
        assert_eq!(texts(&plan), vec!["Apple 10-K risks"]);
    }

    #[tokio::test]
    async fn test_bare_array_truncated_to_target() {
        let mock = MockLlmClient::new();
        mock.push_response("```json\n[\"a\", \"b\", \"c\", \"d\"]\n```");

        let plan = planner(&mock, 2).plan("q", None).await.unwrap();
        assert_eq!(texts(&plan), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unparseable_output_falls_back_to_query() {
        let mock = MockLlmClient::new();
        mock.push_response("Sure! Here are some ideas: revenue, risks.");
        mock.push_response(r#"{"sub_queries": []}"#);

        let planner = planner(&mock, 5);
        let first = planner.plan("Apple outlook", None).await.unwrap();
        assert_eq!(texts(&first), vec!["Apple outlook"]);

        let second = planner.plan("Apple outlook", None).await.unwrap();
        assert_eq!(texts(&second), vec!["Apple outlook"]);
    }

    #[tokio::test]
    async fn test_feedback_and_count_in_prompt() {
        let mock = MockLlmClient::new();
        mock.push_response(r#"["x"]"#);
        mock.push_response(r#"["y"]"#);

        let planner = planner(&mock, 5);
        planner.plan("Apple outlook", None).await.unwrap();
        planner
            .plan("Apple outlook", Some("Answer cited Company C"))
            .await
            .unwrap();

        let requests = mock.requests();
        let first = requests[0].user_text();
        assert!(first.contains("Generate exactly 5 sub-queries"));
        assert!(!first.contains("rejected"));

        let second = requests[1].user_text();
        assert!(second.contains("Answer cited Company C"));
        assert_eq!(requests[1].temperature, Some(0.2));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mock = MockLlmClient::new();
        mock.push(MockReply::Timeout);

        let result = planner(&mock, 5).plan("q", None).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }
}
