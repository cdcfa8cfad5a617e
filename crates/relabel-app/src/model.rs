// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category assigned when the embedded output JSON cannot be parsed or
/// carries no action field. It participates in filtering like any other
/// action value.
pub const INVALID_ACTION: &str = "invalid";

/// One dataset row. Rows have no stored id; identity is the position in the
/// unfiltered row set (the "original index").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub prompt_name: String,
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manually_reviewed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manually_reviewed_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_ts: Option<String>,
}

impl AnnotationRow {
    pub fn is_reviewed(&self) -> bool {
        self.manually_reviewed == Some(true)
    }
}

/// Best-effort parse of the JSON embedded in a row's `output` field.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ParsedOutput {
    pub action: Option<String>,
    pub requester: Option<String>,
    #[serde(default)]
    pub requested_users: Vec<String>,
    #[serde(default)]
    pub action_metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub output: Option<ParsedOutput>,
    pub input: Option<serde_json::Value>,
    pub parse_error: bool,
}

impl ParsedRow {
    pub fn from_row(row: &AnnotationRow) -> Self {
        let (output, parse_error) = match serde_json::from_str(&row.output) {
            Ok(parsed) => (Some(parsed), false),
            Err(_) => (None, true),
        };
        // Input parsing is optional; most inputs are plain text.
        let input = serde_json::from_str(&row.input).ok();
        Self {
            output,
            input,
            parse_error,
        }
    }

    /// Derived action category, falling back to the sentinel when the output
    /// failed to parse or has no action field.
    pub fn action_category(&self) -> &str {
        if self.parse_error {
            return INVALID_ACTION;
        }
        self.output
            .as_ref()
            .and_then(|parsed| parsed.action.as_deref())
            .filter(|action| !action.is_empty())
            .unwrap_or(INVALID_ACTION)
    }
}

/// Memoized per-row parses, keyed by original index. Rebuilt whole whenever
/// the row set is replaced; never patched in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedRowCache {
    entries: Vec<ParsedRow>,
}

impl ParsedRowCache {
    pub fn build(rows: &[AnnotationRow]) -> Self {
        Self {
            entries: rows.iter().map(ParsedRow::from_row).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, original_index: usize) -> Option<&ParsedRow> {
        self.entries.get(original_index)
    }

    pub fn action_category(&self, original_index: usize) -> &str {
        self.entries
            .get(original_index)
            .map(ParsedRow::action_category)
            .unwrap_or(INVALID_ACTION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReviewStatus {
    Reviewed,
    NotReviewed,
}

impl ReviewStatus {
    pub const ALL: [Self; 2] = [Self::Reviewed, Self::NotReviewed];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reviewed => "reviewed",
            Self::NotReviewed => "not-reviewed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reviewed" => Some(Self::Reviewed),
            "not-reviewed" => Some(Self::NotReviewed),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Reviewed => "reviewed",
            Self::NotReviewed => "not reviewed",
        }
    }

    pub fn matches(self, row: &AnnotationRow) -> bool {
        match self {
            Self::Reviewed => row.is_reviewed(),
            Self::NotReviewed => !row.is_reviewed(),
        }
    }
}

/// A named filter dimension. Values inside a group combine with OR; active
/// groups combine with AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterGroup {
    Prompt,
    Action,
    Review,
}

impl FilterGroup {
    pub const ALL: [Self; 3] = [Self::Prompt, Self::Action, Self::Review];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompts",
            Self::Action => "actions",
            Self::Review => "review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prompts" => Some(Self::Prompt),
            "actions" => Some(Self::Action),
            "review" => Some(Self::Review),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Action => "action",
            Self::Review => "review",
        }
    }
}

/// Pretty-print a JSON payload for the editor; malformed text passes through
/// unchanged so the sentinel category stays editable.
pub fn format_json(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_owned()),
        Err(_) => text.to_owned(),
    }
}
