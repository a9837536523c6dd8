//! Research orchestration for the Diligence agent.
//!
//! A query is classified, decomposed into sub-queries, researched across
//! every source category, answered from the resulting evidence and
//! fact-checked. A rejected answer sends the checker's reason back to the
//! planner until the iteration limit is reached.

pub mod classify;
pub mod evaluator;
pub mod planner;
pub mod research;
pub mod state;
pub mod synthesizer;
pub mod system;
pub mod types;
pub mod workflow;


// Re-export main types
pub use classify::classify;
pub use evaluator::Evaluator;
pub use planner::Planner;
pub use research::{ResearchSettings, Researcher};
pub use state::{StateUpdate, WorkflowState};
pub use synthesizer::Synthesizer;
pub use system::ResearchSystem;
pub use types::{
    Answer, Complexity, Decision, EvaluationResult, QueryClassification, QueryType,
    ResearchReport, SourceRef, SubQuery,
};
pub use workflow::{route_after_evaluation, WorkflowController, WorkflowOutcome, WorkflowStage};
