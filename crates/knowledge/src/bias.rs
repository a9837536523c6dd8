//! Score boosting for under-served groups.
//!
//! Tracked groups whose average score falls below a floor have each of their
//! fragments' `final_score` multiplied by a boost factor, capped at 1.0.
//! The policy only ever raises scores.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::types::Fragment;
use diligence_core::config::BiasSettings;

/// Per-group thresholds and historical averages, keyed by lower-cased group name.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasPolicy {
    pub min_score_threshold: f32,
    pub boost_factor: f32,
    groups: BTreeMap<String, GroupPolicy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GroupPolicy {
    min_score: Option<f32>,
    historical_average: Option<f32>,
}

impl BiasPolicy {
    pub fn new(min_score_threshold: f32, boost_factor: f32) -> Self {
        Self {
            min_score_threshold,
            boost_factor,
            groups: BTreeMap::new(),
        }
    }

    /// Track `group` with optional threshold override and historical average.
    pub fn with_group(
        mut self,
        group: &str,
        min_score: Option<f32>,
        historical_average: Option<f32>,
    ) -> Self {
        self.groups.insert(
            group.to_lowercase(),
            GroupPolicy {
                min_score,
                historical_average,
            },
        );
        self
    }

    pub fn is_tracked(&self, group: &str) -> bool {
        self.groups.contains_key(&group.to_lowercase())
    }

    pub fn tracked_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    fn threshold_for(&self, group: &str) -> f32 {
        self.groups
            .get(group)
            .and_then(|g| g.min_score)
            .unwrap_or(self.min_score_threshold)
    }

    fn historical_average(&self, group: &str) -> Option<f32> {
        self.groups.get(group).and_then(|g| g.historical_average)
    }

    /// Tracked group of `fragment`: its first tracked group attribute, else a
    /// tracked group named in the sub-query that retrieved it.
    pub fn default_group_key(&self, fragment: &Fragment) -> Option<String> {
        if let Some(group) = fragment
            .group_attributes
            .iter()
            .map(|g| g.to_lowercase())
            .find(|g| self.groups.contains_key(g))
        {
            return Some(group);
        }

        let sub_query = fragment.provenance.originating_sub_query.as_deref()?.to_lowercase();
        self.groups
            .keys()
            .find(|group| sub_query.contains(group.as_str()))
            .cloned()
    }
}

impl From<&BiasSettings> for BiasPolicy {
    fn from(settings: &BiasSettings) -> Self {
        settings.groups.iter().fold(
            BiasPolicy::new(settings.min_score_threshold, settings.boost_factor),
            |policy, (group, overrides)| {
                policy.with_group(group, overrides.min_score, overrides.historical_average)
            },
        )
    }
}

/// Applies a [`BiasPolicy`] to a batch of fragments.
#[derive(Debug, Clone)]
pub struct BiasAdjuster {
    policy: BiasPolicy,
}

impl BiasAdjuster {
    pub fn new(policy: BiasPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BiasPolicy {
        &self.policy
    }

    /// Boost fragments of under-threshold groups.
    ///
    /// `group_key` maps a fragment to a tracked group; keys that are not
    /// tracked are ignored. Fragments already marked `bias_boosted` are left
    /// alone and do not count toward group averages.
    pub fn adjust<F>(&self, mut fragments: Vec<Fragment>, group_key: F) -> Vec<Fragment>
    where
        F: Fn(&Fragment) -> Option<String>,
    {
        let keys: Vec<Option<String>> = fragments
            .iter()
            .map(|f| {
                if f.bias_boosted {
                    return None;
                }
                group_key(f)
                    .map(|k| k.to_lowercase())
                    .filter(|k| self.policy.groups.contains_key(k))
            })
            .collect();

        let mut live: HashMap<&str, (f32, usize)> = HashMap::new();
        for (fragment, key) in fragments.iter().zip(&keys) {
            if let Some(key) = key {
                let entry = live.entry(key.as_str()).or_insert((0.0, 0));
                entry.0 += fragment.final_score;
                entry.1 += 1;
            }
        }

        let boosted_groups: Vec<String> = live
            .iter()
            .filter_map(|(&group, &(sum, count))| {
                let average = self
                    .policy
                    .historical_average(group)
                    .unwrap_or(sum / count as f32);
                let threshold = self.policy.threshold_for(group);
                debug!(group, average, threshold, "Group score average");
                (average < threshold).then(|| group.to_string())
            })
            .collect();

        if boosted_groups.is_empty() {
            return fragments;
        }

        let mut boosted = 0usize;
        for (fragment, key) in fragments.iter_mut().zip(&keys) {
            if key.as_ref().is_some_and(|k| boosted_groups.contains(k)) {
                fragment.final_score = (fragment.final_score * self.policy.boost_factor).min(1.0);
                fragment.bias_boosted = true;
                boosted += 1;
            }
        }

        info!(
            groups = ?boosted_groups,
            fragments = boosted,
            factor = self.policy.boost_factor,
            "Applied bias boost"
        );

        fragments
    }

    /// [`adjust`](Self::adjust) with [`BiasPolicy::default_group_key`].
    pub fn adjust_default(&self, fragments: Vec<Fragment>) -> Vec<Fragment> {
        self.adjust(fragments, |f| self.policy.default_group_key(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use diligence_core::config::GroupSettings;

    fn fragment(id: &str, group: &str, score: f32) -> Fragment {
        Fragment::new(id, "text", Category::News)
            .with_group_attributes(vec![group.to_string()])
            .with_fused_score(score)
    }

    fn policy() -> BiasPolicy {
        BiasPolicy::new(0.60, 1.05).with_group("AAPL", None, None).with_group("MSFT", None, None)
    }

    #[test]
    fn test_under_threshold_group_boosted() {
        let adjuster = BiasAdjuster::new(policy());
        let adjusted = adjuster.adjust_default(vec![
            fragment("a1", "AAPL", 0.40),
            fragment("a2", "AAPL", 0.60),
            fragment("m1", "MSFT", 0.90),
        ]);

        assert!((adjusted[0].final_score - 0.42).abs() < 1e-6);
        assert!((adjusted[1].final_score - 0.63).abs() < 1e-6);
        assert!(adjusted[0].bias_boosted);
        assert_eq!(adjusted[2].final_score, 0.90);
        assert!(!adjusted[2].bias_boosted);
    }

    #[test]
    fn test_boost_capped_at_one() {
        // 0.97 * 1.05 = 1.0185, capped
        let adjuster = BiasAdjuster::new(BiasPolicy::new(0.99, 1.05).with_group("AAPL", None, None));
        let adjusted = adjuster.adjust_default(vec![
            fragment("a1", "aapl", 0.97),
            fragment("a2", "AAPL", 0.10),
        ]);
        assert_eq!(adjusted[0].final_score, 1.0);
        assert!((adjusted[1].final_score - 0.105).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_groups_untouched() {
        let adjuster = BiasAdjuster::new(policy());
        let adjusted = adjuster.adjust_default(vec![fragment("t1", "TSLA", 0.10)]);
        assert_eq!(adjusted[0].final_score, 0.10);
        assert!(!adjusted[0].bias_boosted);
    }

    #[test]
    fn test_historical_average_overrides_live_mean() {
        let adjuster =
            BiasAdjuster::new(BiasPolicy::new(0.60, 1.10).with_group("AAPL", None, Some(0.50)));
        let adjusted = adjuster.adjust_default(vec![fragment("a1", "AAPL", 0.90)]);
        assert!((adjusted[0].final_score - 0.99).abs() < 1e-6);

        let adjuster =
            BiasAdjuster::new(BiasPolicy::new(0.60, 1.10).with_group("AAPL", None, Some(0.80)));
        let adjusted = adjuster.adjust_default(vec![fragment("a1", "AAPL", 0.10)]);
        assert_eq!(adjusted[0].final_score, 0.10);
    }

    #[test]
    fn test_group_threshold_override() {
        let adjuster =
            BiasAdjuster::new(BiasPolicy::new(0.60, 1.10).with_group("AAPL", Some(0.30), None));
        let adjusted = adjuster.adjust_default(vec![fragment("a1", "AAPL", 0.40)]);
        assert_eq!(adjusted[0].final_score, 0.40);
    }

    #[test]
    fn test_repeated_adjust_does_not_compound() {
        let adjuster = BiasAdjuster::new(policy());
        let once = adjuster.adjust_default(vec![fragment("a1", "AAPL", 0.40)]);
        let twice = adjuster.adjust_default(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_group_detected_from_sub_query() {
        let adjuster = BiasAdjuster::new(policy());
        let mut fragment = Fragment::new("x", "text", Category::News).with_fused_score(0.5);
        fragment.provenance.originating_sub_query = Some("What are msft's cloud risks?".to_string());

        assert_eq!(adjuster.policy().default_group_key(&fragment).as_deref(), Some("msft"));
        let adjusted = adjuster.adjust_default(vec![fragment]);
        assert!(adjusted[0].bias_boosted);
    }

    #[test]
    fn test_custom_group_key() {
        let adjuster = BiasAdjuster::new(policy());
        let fragments = vec![Fragment::new("x", "text", Category::News)
            .with_metadata("ticker", "AAPL")
            .with_fused_score(0.2)];

        let adjusted = adjuster.adjust(fragments, |f| f.metadata.get("ticker").cloned());
        assert!((adjusted[0].final_score - 0.21).abs() < 1e-6);
    }

    #[test]
    fn test_policy_from_settings() {
        let mut settings = BiasSettings::default();
        settings.groups.insert(
            "Company A".to_string(),
            GroupSettings {
                min_score: Some(0.7),
                historical_average: None,
            },
        );

        let policy = BiasPolicy::from(&settings);
        assert!(policy.is_tracked("company a"));
        assert_eq!(policy.threshold_for("company a"), 0.7);
        assert_eq!(policy.tracked_groups().collect::<Vec<_>>(), vec!["company a"]);
    }
}
