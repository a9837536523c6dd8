//! Ask command handler.
//!
//! Runs the full research workflow for one question.

use anyhow::{bail, Context};
use clap::Args;
use diligence_agent::{ResearchReport, ResearchSystem};
use diligence_core::config::AppConfig;
use std::path::PathBuf;

/// Research a question and print the checked answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to research
    pub query: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Print the stages the workflow went through
    #[arg(long)]
    pub trace: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let query = self.read_query()?;
        let system = ResearchSystem::from_config(config)
            .await
            .context("Failed to start the research system")?;

        let outcome = system.run(&query).await.context("Research run failed")?;
        let stages: Vec<String> = outcome.trace.iter().map(ToString::to_string).collect();
        let run_id = outcome.run_id.clone();
        tracing::debug!(run_id = %run_id, evaluations = outcome.evaluations, "Run finished");
        let report = ResearchReport::try_from(outcome)?;

        if self.json {
            let mut output = serde_json::to_value(&report)?;
            output["runId"] = serde_json::Value::from(run_id);
            if self.trace {
                output["trace"] = serde_json::Value::from(stages);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_report(&report);
            if self.trace {
                println!("\nTrace: {}", stages.join(" → "));
            }
        }

        Ok(())
    }

    fn read_query(&self) -> anyhow::Result<String> {
        let query = match (&self.query, &self.file) {
            (Some(query), _) => query.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read question from {}", path.display()))?,
            (None, None) => bail!("No question provided. Usage: diligence ask \"<question>\""),
        };

        let query = query.trim().to_string();
        if query.is_empty() {
            bail!("Question is empty");
        }
        Ok(query)
    }
}

fn print_report(report: &ResearchReport) {
    println!("{}", report.answer_text);

    if !report.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in report.sources.iter().enumerate() {
            println!("  [{}] {} (score {:.2})", i + 1, source.label, source.score);
        }
    }

    let decision = report
        .decision
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unchecked".to_string());
    println!(
        "\nVerdict: {} | confidence {:.2} | hallucination {:.2} | replans {}",
        decision, report.confidence, report.hallucination_score, report.iteration_count
    );
}
