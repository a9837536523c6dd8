//! Stats command handler.
//!
//! Reports what the workspace would research with: the corpus by category
//! and the prompt set in effect.

use anyhow::Context;
use clap::Args;
use diligence_core::config::AppConfig;
use diligence_knowledge::{load_corpus, CorpusStats};
use diligence_prompt::list_prompts;

/// Show corpus and prompt statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");

        let corpus_path = config.corpus_path();
        let entries = load_corpus(&corpus_path)
            .with_context(|| format!("Failed to load corpus {}", corpus_path.display()))?;
        let stats = CorpusStats::count(entries.iter().map(|e| e.category));
        let prompts = list_prompts(&config.workspace)?;

        if self.json {
            let output = serde_json::json!({
                "corpus": corpus_path.display().to_string(),
                "fragments": stats,
                "prompts": prompts,
                "provider": config.provider,
                "model": config.model,
                "reranker": config.reranker.strategy,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("Corpus: {}", corpus_path.display());
        println!("Fragments: {}", stats.total);
        for (category, count) in &stats.by_category {
            println!("  {:<10} {}", category.as_str(), count);
        }
        println!("Prompts:");
        for id in &prompts {
            println!("  {}", id);
        }
        println!("Provider: {} ({})", config.provider, config.model);

        Ok(())
    }
}
