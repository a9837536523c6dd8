//! Core types for retrieved evidence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use diligence_core::AppError;

/// Document-source type of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "10-K")]
    Form10K,
    #[serde(rename = "10-Q")]
    Form10Q,
    #[serde(rename = "news")]
    News,
    #[serde(rename = "wikipedia")]
    Wikipedia,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Form10K,
        Category::Form10Q,
        Category::News,
        Category::Wikipedia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Form10K => "10-K",
            Category::Form10Q => "10-Q",
            Category::News => "news",
            Category::Wikipedia => "wikipedia",
        }
    }

    /// Parse a list of configured category names.
    pub fn parse_list(names: &[String]) -> Result<Vec<Category>, AppError> {
        names.iter().map(|name| name.parse()).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "10-k" | "10k" | "sec" | "filing" => Ok(Category::Form10K),
            "10-q" | "10q" => Ok(Category::Form10Q),
            "news" => Ok(Category::News),
            "wikipedia" | "wiki" => Ok(Category::Wikipedia),
            other => Err(AppError::Config(format!(
                "Unknown category '{}'. Supported: 10-K, 10-Q, news, wikipedia",
                other
            ))),
        }
    }
}

/// Where a fragment instance came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Sub-query whose search produced this instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_sub_query: Option<String>,
}

/// A retrievable unit of a source document with its scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub fragment_id: String,
    pub text: String,
    pub category: Category,

    /// Grouping tags (tickers, entity names, demographic tags)
    #[serde(default)]
    pub group_attributes: Vec<String>,

    /// Free-form descriptive fields (company, title, date)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub semantic_score: f32,
    #[serde(default)]
    pub lexical_score: f32,
    #[serde(default)]
    pub fused_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    #[serde(default)]
    pub final_score: f32,

    #[serde(default)]
    pub provenance: Provenance,

    /// Set once the bias stage has boosted this instance
    #[serde(default)]
    pub bias_boosted: bool,
}

impl Fragment {
    pub fn new(fragment_id: impl Into<String>, text: impl Into<String>, category: Category) -> Self {
        Self {
            fragment_id: fragment_id.into(),
            text: text.into(),
            category,
            group_attributes: Vec::new(),
            metadata: BTreeMap::new(),
            semantic_score: 0.0,
            lexical_score: 0.0,
            fused_score: 0.0,
            rerank_score: None,
            final_score: 0.0,
            provenance: Provenance::default(),
            bias_boosted: false,
        }
    }

    pub fn with_group_attributes(mut self, groups: Vec<String>) -> Self {
        self.group_attributes = groups;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the fused score; the final score starts out equal to it.
    pub fn with_fused_score(mut self, fused: f32) -> Self {
        self.fused_score = fused;
        self.final_score = fused;
        self
    }

    /// Record a successful rerank: the rerank score becomes the final score.
    pub fn apply_rerank_score(&mut self, score: f32) {
        self.rerank_score = Some(score);
        self.final_score = score;
    }

    /// Human-readable label used in prompts and citations.
    pub fn source_label(&self) -> String {
        let company = self
            .metadata
            .get("company")
            .cloned()
            .or_else(|| self.group_attributes.first().cloned())
            .unwrap_or_else(|| "Unknown".to_string());

        match self.metadata.get("date") {
            Some(date) => format!("{} - {} - {}", company, self.category, date),
            None => format!("{} - {}", company, self.category),
        }
    }
}

/// Scored fragments from one search, sorted by fused score descending.
pub type CandidatePool = Vec<Fragment>;

/// Sort by `key` descending, ties by fragment id ascending.
pub fn sort_by_score_desc(fragments: &mut [Fragment], key: impl Fn(&Fragment) -> f32) {
    fragments.sort_by(|a, b| {
        key(b)
            .total_cmp(&key(a))
            .then_with(|| a.fragment_id.cmp(&b.fragment_id))
    });
}
