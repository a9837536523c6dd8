//! Typed workflow state.
//!
//! Stages never mutate the state they are given. Each returns a
//! [`StateUpdate`] whose set fields replace the corresponding fields of a new
//! state value; unset fields carry over unchanged.

use serde::Serialize;

use crate::types::{Answer, EvaluationResult, QueryClassification, SubQuery};
use diligence_knowledge::EvidenceSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowState {
    pub query: String,
    pub classification: Option<QueryClassification>,
    pub sub_queries: Vec<SubQuery>,
    pub evidence_set: EvidenceSet,
    pub answer: Option<Answer>,
    pub evaluation: Option<EvaluationResult>,
    /// Completed replan cycles
    pub iteration: u32,
    /// Rejection reason carried into the next plan
    pub feedback: Option<String>,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// New state with `update` applied.
    pub fn merge(self, update: StateUpdate) -> Self {
        Self {
            query: self.query,
            classification: update.classification.or(self.classification),
            sub_queries: update.sub_queries.unwrap_or(self.sub_queries),
            evidence_set: update.evidence_set.unwrap_or(self.evidence_set),
            answer: update.answer.or(self.answer),
            evaluation: update.evaluation.or(self.evaluation),
            iteration: update.iteration.unwrap_or(self.iteration),
            feedback: update.feedback.or(self.feedback),
        }
    }
}

/// Fields produced by one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub classification: Option<QueryClassification>,
    pub sub_queries: Option<Vec<SubQuery>>,
    pub evidence_set: Option<EvidenceSet>,
    pub answer: Option<Answer>,
    pub evaluation: Option<EvaluationResult>,
    pub iteration: Option<u32>,
    pub feedback: Option<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classification(mut self, classification: QueryClassification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn sub_queries(mut self, sub_queries: Vec<SubQuery>) -> Self {
        self.sub_queries = Some(sub_queries);
        self
    }

    pub fn evidence_set(mut self, evidence_set: EvidenceSet) -> Self {
        self.evidence_set = Some(evidence_set);
        self
    }

    pub fn answer(mut self, answer: Answer) -> Self {
        self.answer = Some(answer);
        self
    }

    pub fn evaluation(mut self, evaluation: EvaluationResult) -> Self {
        self.evaluation = Some(evaluation);
        self
    }

    pub fn iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complexity, Decision, QueryType};

    #[test]
    fn test_unset_fields_carry_over() {
        let state = WorkflowState::new("q").merge(
            StateUpdate::new()
                .classification(QueryClassification {
                    query_type: QueryType::General,
                    complexity: Complexity::Simple,
                })
                .sub_queries(vec![SubQuery::new("s1", "q")]),
        );

        let next = state.clone().merge(StateUpdate::new().iteration(1).feedback("try again"));

        assert_eq!(next.query, "q");
        assert_eq!(next.sub_queries, state.sub_queries);
        assert_eq!(next.classification, state.classification);
        assert_eq!(next.iteration, 1);
        assert_eq!(next.feedback.as_deref(), Some("try again"));
    }

    #[test]
    fn test_set_fields_replace() {
        let evaluation = |decision| EvaluationResult {
            decision,
            reason: String::new(),
            confidence: 0.5,
            hallucination_score: 0.0,
        };

        let state = WorkflowState::new("q")
            .merge(StateUpdate::new().evaluation(evaluation(Decision::Reject)))
            .merge(StateUpdate::new().evaluation(evaluation(Decision::Approve)));

        assert_eq!(state.evaluation.unwrap().decision, Decision::Approve);
    }

    #[test]
    fn test_empty_update_is_identity() {
        let state = WorkflowState::new("q").merge(StateUpdate::new().iteration(2));
        assert_eq!(state.clone().merge(StateUpdate::new()), state);
    }
}
