// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{AnnotationRow, FilterGroup, ParsedRowCache, ReviewStatus};

/// Active filter values per group. An empty group places no constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub prompts: BTreeSet<String>,
    pub actions: BTreeSet<String>,
    pub review: BTreeSet<ReviewStatus>,
}

impl FilterState {
    pub fn has_active_filters(&self) -> bool {
        !self.prompts.is_empty() || !self.actions.is_empty() || !self.review.is_empty()
    }

    /// Toggle a value in a group; returns true when the value is now active.
    /// Unparseable review values are ignored.
    pub fn toggle(&mut self, group: FilterGroup, value: &str) -> bool {
        match group {
            FilterGroup::Prompt => toggle_set(&mut self.prompts, value.to_owned()),
            FilterGroup::Action => toggle_set(&mut self.actions, value.to_owned()),
            FilterGroup::Review => match ReviewStatus::parse(value) {
                Some(status) => toggle_set(&mut self.review, status),
                None => false,
            },
        }
    }

    pub fn remove(&mut self, group: FilterGroup, value: &str) {
        match group {
            FilterGroup::Prompt => {
                self.prompts.remove(value);
            }
            FilterGroup::Action => {
                self.actions.remove(value);
            }
            FilterGroup::Review => {
                if let Some(status) = ReviewStatus::parse(value) {
                    self.review.remove(&status);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.prompts.clear();
        self.actions.clear();
        self.review.clear();
    }

    /// Active chips in display order, as (group, value) pairs.
    pub fn active_values(&self) -> Vec<(FilterGroup, String)> {
        let mut values = Vec::new();
        for prompt in &self.prompts {
            values.push((FilterGroup::Prompt, prompt.clone()));
        }
        for action in &self.actions {
            values.push((FilterGroup::Action, action.clone()));
        }
        for status in &self.review {
            values.push((FilterGroup::Review, status.as_str().to_owned()));
        }
        values
    }

    /// Whether a row passes every active group, optionally relaxing one group
    /// (used by the dual-count metrics pass).
    pub fn matches(
        &self,
        row: &AnnotationRow,
        action_category: &str,
        exclude: Option<FilterGroup>,
    ) -> bool {
        if exclude != Some(FilterGroup::Prompt)
            && !self.prompts.is_empty()
            && !self.prompts.contains(&row.prompt_name)
        {
            return false;
        }

        if exclude != Some(FilterGroup::Action)
            && !self.actions.is_empty()
            && !self.actions.contains(action_category)
        {
            return false;
        }

        if exclude != Some(FilterGroup::Review)
            && !self.review.is_empty()
            && !self.review.iter().any(|status| status.matches(row))
        {
            return false;
        }

        true
    }
}

fn toggle_set<T: Ord>(set: &mut BTreeSet<T>, value: T) -> bool {
    if set.remove(&value) {
        false
    } else {
        set.insert(value);
        true
    }
}

/// The filtered subsequence and its bidirectional index mapping. Always
/// recomputed whole; never patched incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilteredView {
    filtered_to_original: Vec<usize>,
    original_to_filtered: Vec<Option<usize>>,
}

impl FilteredView {
    pub fn build(rows: &[AnnotationRow], filter: &FilterState, cache: &ParsedRowCache) -> Self {
        if !filter.has_active_filters() {
            return Self {
                filtered_to_original: (0..rows.len()).collect(),
                original_to_filtered: (0..rows.len()).map(Some).collect(),
            };
        }

        let mut filtered_to_original = Vec::new();
        let mut original_to_filtered = vec![None; rows.len()];
        for (original_index, row) in rows.iter().enumerate() {
            let action = cache.action_category(original_index);
            if filter.matches(row, action, None) {
                original_to_filtered[original_index] = Some(filtered_to_original.len());
                filtered_to_original.push(original_index);
            }
        }

        Self {
            filtered_to_original,
            original_to_filtered,
        }
    }

    pub fn len(&self) -> usize {
        self.filtered_to_original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered_to_original.is_empty()
    }

    pub fn map_filtered_to_original(&self, filtered_index: usize) -> Option<usize> {
        self.filtered_to_original.get(filtered_index).copied()
    }

    pub fn map_original_to_filtered(&self, original_index: usize) -> Option<usize> {
        self.original_to_filtered
            .get(original_index)
            .copied()
            .flatten()
    }

    pub fn contains_original(&self, original_index: usize) -> bool {
        self.map_original_to_filtered(original_index).is_some()
    }

    pub fn first_original_index(&self) -> Option<usize> {
        self.filtered_to_original.first().copied()
    }

    /// Original indices of the filtered rows, in original relative order.
    pub fn members(&self) -> &[usize] {
        &self.filtered_to_original
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterState, FilteredView};
    use crate::{AnnotationRow, FilterGroup, INVALID_ACTION, ParsedRowCache};

    fn row(prompt: &str, action: &str) -> AnnotationRow {
        AnnotationRow {
            prompt_name: prompt.to_owned(),
            input: String::new(),
            output: if action == "broken" {
                "{not json".to_owned()
            } else {
                format!(r#"{{"action":"{action}"}}"#)
            },
            manually_reviewed: None,
            manually_reviewed_ts: None,
            last_updated_ts: None,
        }
    }

    fn prompt_rows(prompts: &[&str]) -> Vec<AnnotationRow> {
        prompts.iter().map(|prompt| row(prompt, "noop")).collect()
    }

    #[test]
    fn empty_filter_yields_identity_mapping() {
        let rows = prompt_rows(&["a", "b", "c"]);
        let cache = ParsedRowCache::build(&rows);
        let view = FilteredView::build(&rows, &FilterState::default(), &cache);

        assert_eq!(view.len(), rows.len());
        for index in 0..rows.len() {
            assert_eq!(view.map_filtered_to_original(index), Some(index));
            assert_eq!(view.map_original_to_filtered(index), Some(index));
        }
    }

    #[test]
    fn prompt_filter_preserves_order_and_maps_both_ways() {
        // Scenario fixture: 10 rows, prompts a,a,b,a,c,b,a,a,b,c.
        let rows = prompt_rows(&["a", "a", "b", "a", "c", "b", "a", "a", "b", "c"]);
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Prompt, "a");

        let view = FilteredView::build(&rows, &filter, &cache);
        assert_eq!(view.len(), 5);
        assert_eq!(view.members(), &[0, 1, 3, 6, 7]);

        for filtered_index in 0..view.len() {
            let original = view
                .map_filtered_to_original(filtered_index)
                .expect("filtered index maps");
            assert_eq!(view.map_original_to_filtered(original), Some(filtered_index));
        }
        assert_eq!(view.map_original_to_filtered(2), None);
        assert_eq!(view.map_original_to_filtered(4), None);
    }

    #[test]
    fn filtered_indices_are_strictly_increasing() {
        let rows = prompt_rows(&["x", "y", "x", "z", "x", "y"]);
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Prompt, "x");
        filter.toggle(FilterGroup::Prompt, "z");

        let view = FilteredView::build(&rows, &filter, &cache);
        let members = view.members();
        assert!(members.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(members.iter().all(|&index| index < rows.len()));
    }

    #[test]
    fn groups_combine_with_and_values_with_or() {
        let rows = vec![
            row("a", "invite"),
            row("a", "kick"),
            row("b", "invite"),
            row("a", "invite"),
        ];
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Prompt, "a");
        filter.toggle(FilterGroup::Action, "invite");
        filter.toggle(FilterGroup::Action, "kick");

        let view = FilteredView::build(&rows, &filter, &cache);
        assert_eq!(view.members(), &[0, 1, 3]);
    }

    #[test]
    fn unparseable_output_is_filterable_as_invalid() {
        let rows = vec![row("a", "invite"), row("a", "broken"), row("b", "broken")];
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Action, INVALID_ACTION);

        let view = FilteredView::build(&rows, &filter, &cache);
        assert_eq!(view.members(), &[1, 2]);
    }

    #[test]
    fn review_filter_matches_flag() {
        let mut rows = prompt_rows(&["a", "b", "c"]);
        rows[1].manually_reviewed = Some(true);
        let cache = ParsedRowCache::build(&rows);

        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Review, "reviewed");
        let view = FilteredView::build(&rows, &filter, &cache);
        assert_eq!(view.members(), &[1]);

        filter.toggle(FilterGroup::Review, "not-reviewed");
        let both = FilteredView::build(&rows, &filter, &cache);
        assert_eq!(both.len(), 3);
    }

    #[test]
    fn rebuilding_with_same_inputs_is_stable() {
        let rows = prompt_rows(&["a", "b", "a"]);
        let cache = ParsedRowCache::build(&rows);
        let mut filter = FilterState::default();
        filter.toggle(FilterGroup::Prompt, "a");

        let first = FilteredView::build(&rows, &filter, &cache);
        let second = FilteredView::build(&rows, &filter, &cache);
        assert_eq!(first, second);
    }

    #[test]
    fn toggle_returns_activation_state_and_ignores_bad_review_values() {
        let mut filter = FilterState::default();
        assert!(filter.toggle(FilterGroup::Prompt, "a"));
        assert!(!filter.toggle(FilterGroup::Prompt, "a"));
        assert!(!filter.toggle(FilterGroup::Review, "nonsense"));
        assert!(!filter.has_active_filters());

        filter.toggle(FilterGroup::Review, "reviewed");
        filter.remove(FilterGroup::Review, "reviewed");
        assert!(!filter.has_active_filters());
    }
}
