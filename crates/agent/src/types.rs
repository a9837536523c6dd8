//! Values produced by the research stages.

use serde::{Deserialize, Serialize};
use std::fmt;

use diligence_knowledge::{Category, Fragment, Provenance};

/// A focused question derived from the user's query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    pub text: String,
    pub parent_query: String,
}

impl SubQuery {
    pub fn new(text: impl Into<String>, parent_query: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parent_query: parent_query.into(),
        }
    }
}

/// Coarse topic of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Financial,
    Risk,
    Market,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClassification {
    pub query_type: QueryType,
    pub complexity: Complexity,
}

/// A cited fragment, with the text the evaluator checks the answer against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub fragment_id: String,
    pub label: String,
    pub category: Category,
    pub group_attributes: Vec<String>,
    pub provenance: Provenance,
    pub content: String,
    pub score: f32,
}

impl From<&Fragment> for SourceRef {
    fn from(fragment: &Fragment) -> Self {
        Self {
            fragment_id: fragment.fragment_id.clone(),
            label: fragment.source_label(),
            category: fragment.category,
            group_attributes: fragment.group_attributes.clone(),
            provenance: fragment.provenance.clone(),
            content: fragment.text.clone(),
            score: fragment.final_score,
        }
    }
}

/// Synthesized answer and the evidence it was drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub cited_sources: Vec<SourceRef>,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => f.write_str("approve"),
            Decision::Reject => f.write_str("reject"),
        }
    }
}

/// Fact-check verdict on an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub decision: Decision,
    pub reason: String,
    /// Certainty of the decision, in [0, 1]
    pub confidence: f32,
    /// 0 = fully grounded, 1 = complete fiction
    pub hallucination_score: f32,
}

/// What the caller of `submit` receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub answer_text: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub hallucination_score: f32,
    pub iteration_count: u32,
    pub decision: Option<Decision>,
}
