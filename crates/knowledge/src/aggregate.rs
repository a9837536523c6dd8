//! Merging candidate pools into one deduplicated evidence set.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{sort_by_score_desc, CandidatePool, Fragment};

/// Deduplicated fragments, at most one instance per fragment id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvidenceSet {
    fragments: Vec<Fragment>,
}

impl EvidenceSet {
    /// Deduplicate `fragments` by id, keeping the highest `final_score`.
    ///
    /// Equal scores keep the first instance seen. The retained instance
    /// takes the position of the id's first occurrence.
    pub fn from_fragments(fragments: impl IntoIterator<Item = Fragment>) -> Self {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut kept: Vec<Fragment> = Vec::new();

        for fragment in fragments {
            match positions.get(&fragment.fragment_id) {
                Some(&pos) => {
                    if fragment.final_score > kept[pos].final_score {
                        kept[pos] = fragment;
                    }
                }
                None => {
                    positions.insert(fragment.fragment_id.clone(), kept.len());
                    kept.push(fragment);
                }
            }
        }

        Self { fragments: kept }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fragment> {
        self.fragments.iter()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    pub fn truncate(&mut self, len: usize) {
        self.fragments.truncate(len);
    }

    /// Highest `final_score` first, ties by fragment id.
    pub fn sort_by_final_score(&mut self) {
        sort_by_score_desc(&mut self.fragments, |f| f.final_score);
    }

    /// Mean `final_score`, 0.0 when empty.
    pub fn mean_final_score(&self) -> f32 {
        if self.fragments.is_empty() {
            return 0.0;
        }
        self.fragments.iter().map(|f| f.final_score).sum::<f32>() / self.fragments.len() as f32
    }
}

impl<'a> IntoIterator for &'a EvidenceSet {
    type Item = &'a Fragment;
    type IntoIter = std::slice::Iter<'a, Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.iter()
    }
}

/// Flatten `pools` in order and deduplicate by fragment id.
pub fn aggregate(pools: Vec<CandidatePool>) -> EvidenceSet {
    EvidenceSet::from_fragments(pools.into_iter().flatten())
}
