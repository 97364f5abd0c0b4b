//! Relevance scoring and ranking.

use crate::types::config::ScoringConfig;
use crate::types::tender::{ScoredTender, TenderRecord};

/// Scores tender records against fixed domain rules and optional keywords.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    config: ScoringConfig,
}

impl RelevanceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one record. Every rule is evaluated independently.
    pub fn score(&self, record: &TenderRecord, keywords: &[String]) -> f64 {
        let c = &self.config;
        let name = record.tender_name.to_lowercase();
        let org = record.org_name.to_lowercase();

        let mut score = c.base_score;

        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.iter().any(|k| name.contains(k.as_str())) {
            score += c.name_keyword_bonus;
        }
        if keywords.iter().any(|k| org.contains(k.as_str())) {
            score += c.org_keyword_bonus;
        }

        // Each domain keyword counts on its own
        let domain_hits = c
            .domain_keywords
            .iter()
            .filter(|k| name.contains(k.to_lowercase().as_str()))
            .count();
        score += c.domain_keyword_bonus * domain_hits as f64;

        if c
            .priority_orgs
            .iter()
            .any(|p| org.contains(p.to_lowercase().as_str()))
        {
            score += c.priority_org_bonus;
        }

        if let Some(amount) = record.budget_amount {
            if let Some((_, bonus)) = c
                .budget_tiers
                .iter()
                .find(|(threshold, _)| amount > *threshold)
            {
                score += bonus;
            }
        }

        if !c.open_tender_marker.is_empty() && record.tender_method.contains(&c.open_tender_marker)
        {
            score += c.open_tender_bonus;
        }

        if record.is_correction {
            score -= c.correction_penalty;
        }

        score
    }

    /// Score, drop non-positive scores, and sort descending.
    ///
    /// The sort is stable: equal scores keep their upstream order.
    pub fn filter_and_rank(&self, records: Vec<TenderRecord>, keywords: &[String]) -> Vec<ScoredTender> {
        let mut scored: Vec<ScoredTender> = records
            .into_iter()
            .map(|record| {
                let score = self.score(&record, keywords);
                ScoredTender { record, score }
            })
            .filter(|s| s.score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored
    }
}

/// Records budgeted at or above `min_amount`, largest budget first.
///
/// Records without a published budget never qualify. Equal budgets keep
/// their input order.
pub fn rank_by_budget(records: Vec<TenderRecord>, min_amount: u64) -> Vec<TenderRecord> {
    let mut qualifying: Vec<TenderRecord> = records
        .into_iter()
        .filter(|r| r.budget_amount.is_some_and(|amount| amount >= min_amount))
        .collect();
    qualifying.sort_by_key(|r| std::cmp::Reverse(r.budget_amount.unwrap_or(0)));
    qualifying
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::default()
    }

    fn plain(name: &str) -> TenderRecord {
        TenderRecord::new("某鄉公所", name)
    }

    #[test]
    fn test_base_score() {
        assert_eq!(scorer().score(&plain("道路修繕"), &[]), 1.0);
    }

    #[test]
    fn test_keyword_in_name_and_org_both_count() {
        let record = TenderRecord::new("雲端推動辦公室", "雲端平台建置");
        let keywords = vec!["雲端".to_string()];
        // base 1 + name 3 + org 1 + domain "雲端" 2
        assert_eq!(scorer().score(&record, &keywords), 7.0);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let record = plain("Cloud Migration Service");
        let keywords = vec!["CLOUD".to_string()];
        assert_eq!(scorer().score(&record, &keywords), 4.0);
    }

    #[test]
    fn test_each_domain_keyword_counts() {
        // 資訊, 系統, 軟體
        assert_eq!(scorer().score(&plain("資訊系統軟體採購"), &[]), 7.0);
        // Lowercased name still matches the mixed-case "AI" keyword
        assert_eq!(scorer().score(&plain("ai 影像辨識"), &[]), 3.0);
    }

    #[test]
    fn test_priority_org_counts_once() {
        let record = TenderRecord::new("行政院經濟部聯合採購", "辦公桌椅");
        assert_eq!(scorer().score(&record, &[]), 3.0);
    }

    #[test]
    fn test_budget_tiers_are_exclusive() {
        let s = scorer();
        assert_eq!(s.score(&plain("x").with_budget(150_000_000), &[]), 4.0);
        assert_eq!(s.score(&plain("x").with_budget(60_000_000), &[]), 3.0);
        assert_eq!(s.score(&plain("x").with_budget(20_000_000), &[]), 2.0);
        assert_eq!(s.score(&plain("x").with_budget(10_000_000), &[]), 1.0);
        assert_eq!(s.score(&plain("x"), &[]), 1.0);
    }

    #[test]
    fn test_open_tender_and_correction() {
        let record = plain("x").with_method("公開招標").correction();
        assert_eq!(scorer().score(&record, &[]), 1.5);
    }

    #[test]
    fn test_budget_monotonicity() {
        let s = scorer();
        let high = s.score(&plain("x").with_budget(150_000_000), &[]);
        let low = s.score(&plain("x").with_budget(5_000_000), &[]);
        assert!(high - low >= 2.0);
    }

    #[test]
    fn test_filter_drops_non_positive() {
        let config = ScoringConfig {
            base_score: 0.0,
            ..ScoringConfig::default()
        };
        let ranked = RelevanceScorer::new(config).filter_and_rank(
            vec![plain("道路"), plain("資訊設備")],
            &[],
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].record.tender_name, "資訊設備");
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let ranked = scorer().filter_and_rank(
            vec![plain("a"), plain("資訊 b"), plain("c"), plain("d")],
            &[],
        );
        let names: Vec<_> = ranked.iter().map(|s| s.record.tender_name.as_str()).collect();
        assert_eq!(names, vec!["資訊 b", "a", "c", "d"]);
    }

    #[test]
    fn test_rank_by_budget_floor_and_order() {
        let records = vec![
            plain("a").with_budget(60_000_000),
            plain("b"),
            plain("c").with_budget(49_999_999),
            plain("d").with_budget(120_000_000),
            plain("e").with_budget(50_000_000),
        ];
        let names: Vec<_> = rank_by_budget(records, 50_000_000)
            .into_iter()
            .map(|r| r.tender_name)
            .collect();
        assert_eq!(names, vec!["d", "a", "e"]);
    }

    proptest! {
        #[test]
        fn prop_higher_budget_never_scores_lower(low in 0u64..200_000_000, extra in 0u64..200_000_000) {
            let s = scorer();
            let a = s.score(&plain("x").with_budget(low), &[]);
            let b = s.score(&plain("x").with_budget(low + extra), &[]);
            prop_assert!(b >= a);
        }

        #[test]
        fn prop_ranking_is_sorted_descending(budgets in proptest::collection::vec(0u64..200_000_000, 0..30)) {
            let records = budgets.iter().map(|b| plain("x").with_budget(*b)).collect();
            let ranked = scorer().filter_and_rank(records, &[]);
            prop_assert_eq!(ranked.len(), budgets.len());
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
