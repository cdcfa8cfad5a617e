// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::{AnnotationRow, FilterGroup, FilterState, ParsedRowCache, ReviewStatus};

/// Counts shown next to a filter chip: `total` ignores every filter,
/// `filtered` applies all active groups except the chip's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterCount {
    pub total: usize,
    pub filtered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewMetrics {
    pub prompt_counts: BTreeMap<String, FilterCount>,
    pub action_counts: BTreeMap<String, FilterCount>,
    pub reviewed: FilterCount,
    pub not_reviewed: FilterCount,
    pub total_rows: usize,
}

impl ViewMetrics {
    /// One pass over the rows; each group's `filtered` count relaxes that
    /// group's own constraint while honoring the others.
    pub fn compute(rows: &[AnnotationRow], filter: &FilterState, cache: &ParsedRowCache) -> Self {
        let mut metrics = Self {
            total_rows: rows.len(),
            ..Self::default()
        };

        for (original_index, row) in rows.iter().enumerate() {
            let action = cache.action_category(original_index);

            let prompt_count = metrics
                .prompt_counts
                .entry(row.prompt_name.clone())
                .or_default();
            prompt_count.total += 1;
            if filter.matches(row, action, Some(FilterGroup::Prompt)) {
                prompt_count.filtered += 1;
            }

            let action_count = metrics.action_counts.entry(action.to_owned()).or_default();
            action_count.total += 1;
            if filter.matches(row, action, Some(FilterGroup::Action)) {
                action_count.filtered += 1;
            }

            let review_count = if row.is_reviewed() {
                &mut metrics.reviewed
            } else {
                &mut metrics.not_reviewed
            };
            review_count.total += 1;
            if filter.matches(row, action, Some(FilterGroup::Review)) {
                review_count.filtered += 1;
            }
        }

        metrics
    }

    pub fn review_count(&self, status: ReviewStatus) -> FilterCount {
        match status {
            ReviewStatus::Reviewed => self.reviewed,
            ReviewStatus::NotReviewed => self.not_reviewed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ViewMetrics;
    use crate::{AnnotationRow, FilterGroup, FilterState, INVALID_ACTION, ParsedRowCache};

    fn row(prompt: &str, action: &str, reviewed: bool) -> AnnotationRow {
        AnnotationRow {
            prompt_name: prompt.to_owned(),
            input: String::new(),
            output: if action == "broken" {
                "broken".to_owned()
            } else {
                format!(r#"{{"action":"{action}"}}"#)
            },
            manually_reviewed: reviewed.then_some(true),
            manually_reviewed_ts: None,
            last_updated_ts: None,
        }
    }

    fn fixture() -> Vec<AnnotationRow> {
        vec![
            row("a", "invite", false),
            row("a", "kick", true),
            row("b", "invite", false),
            row("b", "broken", false),
            row("c", "invite", true),
        ]
    }

    #[test]
    fn totals_ignore_all_filters() {
        let rows = fixture();
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Prompt, "a");

        let metrics = ViewMetrics::compute(&rows, &filter, &cache);
        assert_eq!(metrics.total_rows, 5);
        assert_eq!(metrics.prompt_counts["a"].total, 2);
        assert_eq!(metrics.prompt_counts["b"].total, 2);
        assert_eq!(metrics.action_counts["invite"].total, 3);
        assert_eq!(metrics.action_counts[INVALID_ACTION].total, 1);
        assert_eq!(metrics.reviewed.total, 2);
        assert_eq!(metrics.not_reviewed.total, 3);
    }

    #[test]
    fn filtered_counts_relax_own_group_only() {
        let rows = fixture();
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Prompt, "a");
        filter.toggle(FilterGroup::Action, "invite");

        let metrics = ViewMetrics::compute(&rows, &filter, &cache);
        // Prompt chips see the action filter but not the prompt filter.
        assert_eq!(metrics.prompt_counts["a"].filtered, 1);
        assert_eq!(metrics.prompt_counts["b"].filtered, 1);
        assert_eq!(metrics.prompt_counts["c"].filtered, 1);
        // Action chips see the prompt filter but not the action filter.
        assert_eq!(metrics.action_counts["invite"].filtered, 1);
        assert_eq!(metrics.action_counts["kick"].filtered, 1);
        assert_eq!(metrics.action_counts[INVALID_ACTION].filtered, 0);
        // Review counts see both active groups.
        assert_eq!(metrics.reviewed.filtered, 0);
        assert_eq!(metrics.not_reviewed.filtered, 1);
    }

    #[test]
    fn filtered_never_exceeds_total() {
        let rows = fixture();
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Prompt, "b");
        filter.toggle(FilterGroup::Review, "not-reviewed");

        let metrics = ViewMetrics::compute(&rows, &filter, &cache);
        for count in metrics
            .prompt_counts
            .values()
            .chain(metrics.action_counts.values())
            .chain([&metrics.reviewed, &metrics.not_reviewed])
        {
            assert!(count.filtered <= count.total);
        }
    }

    #[test]
    fn no_active_filters_makes_filtered_equal_total() {
        let rows = fixture();
        let cache = ParsedRowCache::build(&rows);
        let metrics = ViewMetrics::compute(&rows, &FilterState::default(), &cache);

        for count in metrics
            .prompt_counts
            .values()
            .chain(metrics.action_counts.values())
        {
            assert_eq!(count.filtered, count.total);
        }
        assert_eq!(metrics.reviewed.filtered, metrics.reviewed.total);
    }
}
