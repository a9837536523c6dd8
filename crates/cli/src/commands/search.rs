//! Search command handler.
//!
//! Exposes the retrieval layer on its own, for checking what evidence a
//! query would surface.

use anyhow::Context;
use clap::Args;
use diligence_agent::ResearchSystem;
use diligence_core::config::AppConfig;
use diligence_knowledge::Category;

/// Run hybrid search over the corpus
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search query
    pub query: String,

    /// Restrict to one category (10-K, 10-Q, news, wikipedia)
    #[arg(long)]
    pub category: Option<Category>,

    /// Number of results (default: pipeline.rerankTopK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Apply the configured reranker
    #[arg(long)]
    pub rerank: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing search command");
        tracing::debug!("Search options: {:?}", self);

        let system = ResearchSystem::from_config(config)
            .await
            .context("Failed to start the research system")?;

        let pool = system
            .search(&self.query, self.category, self.top_k, self.rerank)
            .await
            .with_context(|| format!("Search failed for '{}'", self.query))?;

        if self.json {
            let output = serde_json::json!({
                "query": self.query,
                "category": self.category.map(|c| c.to_string()),
                "reranked": self.rerank,
                "results": pool,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if pool.is_empty() {
            println!("No results.");
            return Ok(());
        }

        for (i, fragment) in pool.iter().enumerate() {
            println!(
                "{:>2}. [{}] {}  fused {:.3} (sem {:.3}, lex {:.3}){}",
                i + 1,
                fragment.fragment_id,
                fragment.source_label(),
                fragment.fused_score,
                fragment.semantic_score,
                fragment.lexical_score,
                fragment
                    .rerank_score
                    .map(|s| format!(", rerank {:.3}", s))
                    .unwrap_or_default()
            );
            println!("    {}", preview(&fragment.text, 160));
        }

        Ok(())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
