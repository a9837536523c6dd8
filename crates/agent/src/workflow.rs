//! The bounded research state machine.
//!
//! ```text
//! Classify ─► Plan ─► Retrieve ─► Synthesize ─► Evaluate ─┬─► Terminate
//!              ▲                                          │
//!              └──────── reject, iteration < max ─────────┘
//! ```
//!
//! Every rejection below the iteration cap increments the counter and sends
//! the rejection reason back to the planner. Once the cap is reached the
//! current answer is returned whatever the verdict.

use std::fmt;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::classify;
use crate::evaluator::Evaluator;
use crate::planner::Planner;
use crate::research::Researcher;
use crate::state::{StateUpdate, WorkflowState};
use crate::synthesizer::Synthesizer;
use crate::types::{Decision, EvaluationResult};
use diligence_core::{AppError, AppResult};

/// Workflow stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStage {
    Classify,
    Plan,
    Retrieve,
    Synthesize,
    Evaluate,
    Terminate,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStage::Classify => "classify",
            WorkflowStage::Plan => "plan",
            WorkflowStage::Retrieve => "retrieve",
            WorkflowStage::Synthesize => "synthesize",
            WorkflowStage::Evaluate => "evaluate",
            WorkflowStage::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

/// Where to go after an evaluation.
pub fn route_after_evaluation(
    evaluation: &EvaluationResult,
    iteration: u32,
    max_iterations: u32,
) -> WorkflowStage {
    if evaluation.decision == Decision::Reject && iteration < max_iterations {
        WorkflowStage::Plan
    } else {
        WorkflowStage::Terminate
    }
}

/// Result of one workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub run_id: String,
    pub state: WorkflowState,
    /// Stages in the order they ran, ending with `Terminate`
    pub trace: Vec<WorkflowStage>,
    pub evaluations: u32,
}

/// Drives one query through the stages.
pub struct WorkflowController {
    planner: Planner,
    researcher: Researcher,
    synthesizer: Synthesizer,
    evaluator: Evaluator,
    max_iterations: u32,
}

impl WorkflowController {
    pub fn new(
        planner: Planner,
        researcher: Researcher,
        synthesizer: Synthesizer,
        evaluator: Evaluator,
        max_iterations: u32,
    ) -> Self {
        Self {
            planner,
            researcher,
            synthesizer,
            evaluator,
            max_iterations,
        }
    }

    pub fn researcher(&self) -> &Researcher {
        &self.researcher
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Upper bound on executed stages: classify plus four stages per attempt.
    fn step_ceiling(&self) -> usize {
        1 + 4 * (self.max_iterations as usize + 1)
    }

    /// Run the state machine to termination.
    pub async fn run(&self, query: &str) -> AppResult<WorkflowOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_inner(run_id, query).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, query: &str) -> AppResult<WorkflowOutcome> {
        info!(query, max_iterations = self.max_iterations, "Starting research run");

        let mut state = WorkflowState::new(query);
        let mut stage = WorkflowStage::Classify;
        let mut trace = Vec::new();
        let mut evaluations = 0u32;
        let ceiling = self.step_ceiling();

        while stage != WorkflowStage::Terminate {
            if trace.len() >= ceiling {
                return Err(AppError::Workflow(format!(
                    "Run exceeded {} stages without terminating",
                    ceiling
                )));
            }
            trace.push(stage);
            info!(stage = %stage, iteration = state.iteration, "Entering stage");

            let (update, next) = match stage {
                WorkflowStage::Classify => {
                    let classification = classify(&state.query);
                    info!(
                        query_type = ?classification.query_type,
                        complexity = ?classification.complexity,
                        "Classified query"
                    );
                    (
                        StateUpdate::new().classification(classification),
                        WorkflowStage::Plan,
                    )
                }

                WorkflowStage::Plan => {
                    let sub_queries = self
                        .planner
                        .plan(&state.query, state.feedback.as_deref())
                        .await?;
                    (
                        StateUpdate::new().sub_queries(sub_queries),
                        WorkflowStage::Retrieve,
                    )
                }

                WorkflowStage::Retrieve => {
                    let evidence = self
                        .researcher
                        .research(&state.query, &state.sub_queries)
                        .await;
                    (
                        StateUpdate::new().evidence_set(evidence),
                        WorkflowStage::Synthesize,
                    )
                }

                WorkflowStage::Synthesize => {
                    let answer = self
                        .synthesizer
                        .synthesize(&state.query, &state.evidence_set)
                        .await?;
                    (StateUpdate::new().answer(answer), WorkflowStage::Evaluate)
                }

                WorkflowStage::Evaluate => {
                    let answer = state.answer.as_ref().ok_or_else(|| {
                        AppError::Workflow("Evaluate reached without an answer".to_string())
                    })?;
                    let evaluation = self
                        .evaluator
                        .evaluate(&state.query, &answer.text, &answer.cited_sources)
                        .await?;
                    evaluations += 1;

                    let next =
                        route_after_evaluation(&evaluation, state.iteration, self.max_iterations);
                    let mut update = StateUpdate::new().evaluation(evaluation.clone());

                    if next == WorkflowStage::Plan {
                        info!(
                            iteration = state.iteration + 1,
                            "Answer rejected, replanning: {}",
                            evaluation.reason
                        );
                        update = update
                            .iteration(state.iteration + 1)
                            .feedback(evaluation.reason);
                    } else if evaluation.decision == Decision::Reject {
                        warn!(
                            iterations = state.iteration,
                            "Iteration limit reached, returning rejected answer"
                        );
                    }
                    (update, next)
                }

                WorkflowStage::Terminate => break,
            };

            state = state.merge(update);
            stage = next;
        }

        trace.push(WorkflowStage::Terminate);
        info!(
            evaluations,
            iteration = state.iteration,
            decision = ?state.evaluation.as_ref().map(|e| e.decision),
            "Research run complete"
        );

        Ok(WorkflowOutcome {
            run_id: run_id.to_string(),
            state,
            trace,
            evaluations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(decision: Decision) -> EvaluationResult {
        EvaluationResult {
            decision,
            reason: "r".to_string(),
            confidence: 0.9,
            hallucination_score: 0.0,
        }
    }

    #[test]
    fn test_routing() {
        let reject = verdict(Decision::Reject);
        let approve = verdict(Decision::Approve);

        assert_eq!(route_after_evaluation(&reject, 0, 2), WorkflowStage::Plan);
        assert_eq!(route_after_evaluation(&reject, 1, 2), WorkflowStage::Plan);
        assert_eq!(route_after_evaluation(&reject, 2, 2), WorkflowStage::Terminate);
        assert_eq!(route_after_evaluation(&approve, 0, 2), WorkflowStage::Terminate);
        assert_eq!(route_after_evaluation(&reject, 0, 0), WorkflowStage::Terminate);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(WorkflowStage::Synthesize.to_string(), "synthesize");
        assert_eq!(
            serde_json::to_string(&WorkflowStage::Terminate).unwrap(),
            "\"terminate\""
        );
    }
}
