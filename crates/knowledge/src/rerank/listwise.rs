//! Listwise reranking with a generative model.
//!
//! All candidates are shown to the model at once as numbered snippets and the
//! model answers with an ordering of their indices. Rank position `r` maps to
//! the synthetic score `1.0 - 0.01 * r`, floored at 0.0; candidates the model
//! leaves out are appended in input order with score 0.0.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::traits::{fallback_with_warning, Reranker};
use crate::types::Fragment;
use diligence_llm::{extract_json, LlmClient};
use diligence_prompt::{build_prompt, PromptDefinition};

/// Score step between consecutive rank positions.
const RANK_STEP: f32 = 0.01;

/// Reranker that asks an LLM for a relevance ordering.
pub struct ListwiseReranker {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    snippet_chars: usize,
}

impl ListwiseReranker {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        snippet_chars: usize,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            snippet_chars,
        }
    }

    /// `[i] snippet` lines, newlines flattened, truncated per candidate.
    fn format_snippets(&self, candidates: &[Fragment]) -> String {
        candidates
            .iter()
            .enumerate()
            .map(|(i, fragment)| {
                let snippet: String = fragment
                    .text
                    .chars()
                    .take(self.snippet_chars)
                    .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
                    .collect();
                format!("[{}] {}", i, snippet)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Valid, first-occurrence indices from `{"ranked_indices": [...]}` or a bare array.
fn ranked_indices(value: &Value, candidate_count: usize) -> Vec<usize> {
    let items = match value {
        Value::Object(map) => map.get("ranked_indices").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    };

    let mut seen = HashSet::new();
    items
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        })
        .filter(|&i| i < candidate_count && seen.insert(i))
        .collect()
}

fn rank_score(rank: usize) -> f32 {
    (1.0 - RANK_STEP * rank as f32).max(0.0)
}

/// Reorder `candidates` by `order`, assigning synthetic rank scores.
fn apply_ranking(candidates: Vec<Fragment>, order: &[usize], top_k: usize) -> Vec<Fragment> {
    let mut slots: Vec<Option<Fragment>> = candidates.into_iter().map(Some).collect();
    let mut ranked = Vec::with_capacity(slots.len());

    for (rank, &index) in order.iter().enumerate() {
        if let Some(mut fragment) = slots[index].take() {
            fragment.apply_rerank_score(rank_score(rank));
            ranked.push(fragment);
        }
    }

    for mut fragment in slots.into_iter().flatten() {
        fragment.apply_rerank_score(0.0);
        ranked.push(fragment);
    }

    ranked.truncate(top_k);
    ranked
}

#[async_trait]
impl Reranker for ListwiseReranker {
    fn name(&self) -> &str {
        "listwise"
    }

    async fn rerank(&self, query: &str, candidates: Vec<Fragment>, top_k: usize) -> Vec<Fragment> {
        if candidates.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("snippets".to_string(), self.format_snippets(&candidates));

        let request = match build_prompt(&self.prompt, variables) {
            Ok(built) => built.to_request(&self.model),
            Err(e) => return fallback_with_warning(self.name(), &e.to_string(), candidates, top_k),
        };

        let response = match self.client.complete(&request).await {
            Ok(response) => response,
            Err(e) => return fallback_with_warning(self.name(), &e.to_string(), candidates, top_k),
        };

        let order = match extract_json(&response.content) {
            Ok(value) => ranked_indices(&value, candidates.len()),
            Err(e) => return fallback_with_warning(self.name(), &e.to_string(), candidates, top_k),
        };

        if order.is_empty() {
            return fallback_with_warning(self.name(), "empty ranking", candidates, top_k);
        }

        debug!(
            candidates = candidates.len(),
            ranked = order.len(),
            "Listwise rerank applied"
        );

        apply_ranking(candidates, &order, top_k)
    }
}
