// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{FilterGroup, FilterState, ReviewStatus};

/// A shareable view address: cursor row plus active filters, rendered as a
/// query string (`row=7&prompts=a,b&actions=invite&review=reviewed`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeepLink {
    pub row: Option<usize>,
    pub filter: FilterState,
}

impl DeepLink {
    /// Parse a query string, with or without a leading `?`. Parsing is
    /// tolerant: unknown keys, malformed row numbers, and unknown review
    /// values are dropped rather than rejected.
    pub fn parse(query: &str) -> Self {
        let mut link = Self::default();
        let query = query.trim().trim_start_matches('?');
        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "row" => {
                    if let Ok(row) = value.parse::<usize>() {
                        link.row = Some(row);
                    }
                }
                key => {
                    if let Some(group) = FilterGroup::parse(key) {
                        for item in value.split(',') {
                            let item = item.trim();
                            if item.is_empty() {
                                continue;
                            }
                            match group {
                                FilterGroup::Prompt => {
                                    link.filter.prompts.insert(item.to_owned());
                                }
                                FilterGroup::Action => {
                                    link.filter.actions.insert(item.to_owned());
                                }
                                FilterGroup::Review => {
                                    if let Some(status) = ReviewStatus::parse(item) {
                                        link.filter.review.insert(status);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        link
    }

    /// Render back to a query string. Empty groups are omitted; an entirely
    /// empty link renders as an empty string.
    pub fn encode(&self) -> String {
        let mut parts = Vec::new();
        if let Some(row) = self.row {
            parts.push(format!("row={row}"));
        }
        if !self.filter.prompts.is_empty() {
            parts.push(format!(
                "prompts={}",
                join_values(self.filter.prompts.iter().map(String::as_str))
            ));
        }
        if !self.filter.actions.is_empty() {
            parts.push(format!(
                "actions={}",
                join_values(self.filter.actions.iter().map(String::as_str))
            ));
        }
        if !self.filter.review.is_empty() {
            parts.push(format!(
                "review={}",
                join_values(self.filter.review.iter().map(|status| status.as_str()))
            ));
        }
        parts.join("&")
    }
}

fn join_values<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::DeepLink;
    use crate::ReviewStatus;

    #[test]
    fn parses_full_query() {
        let link = DeepLink::parse("row=7&prompts=a,b&actions=invite&review=reviewed");
        assert_eq!(link.row, Some(7));
        assert_eq!(
            link.filter.prompts.iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(link.filter.actions.contains("invite"));
        assert!(link.filter.review.contains(&ReviewStatus::Reviewed));
    }

    #[test]
    fn leading_question_mark_is_accepted() {
        let link = DeepLink::parse("?row=3");
        assert_eq!(link.row, Some(3));
    }

    #[test]
    fn malformed_pieces_are_dropped_not_fatal() {
        let link = DeepLink::parse("row=abc&prompts=,a,,&bogus=1&review=reviewed,wat&=empty");
        assert_eq!(link.row, None);
        assert_eq!(link.filter.prompts.iter().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(link.filter.review.len(), 1);
    }

    #[test]
    fn encode_round_trips() {
        let original = "row=7&prompts=a,b&actions=invite&review=not-reviewed";
        let link = DeepLink::parse(original);
        assert_eq!(link.encode(), original);
        assert_eq!(DeepLink::parse(&link.encode()), link);
    }

    #[test]
    fn empty_link_encodes_to_empty_string() {
        assert_eq!(DeepLink::default().encode(), "");
        assert_eq!(DeepLink::parse(""), DeepLink::default());
    }
}
