// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use relabel_app::AnnotationRow;
use std::path::PathBuf;
use time::{Date, Duration, Month, OffsetDateTime, Time};
use time::format_description::well_known::Rfc3339;

const PROMPT_NAMES: [&str; 8] = [
    "room_admin_v1",
    "room_admin_v2",
    "invite_flow",
    "moderation_baseline",
    "moderation_strict",
    "onboarding",
    "escalation",
    "bulk_actions",
];

const ACTIONS: [&str; 7] = [
    "invite_user",
    "kick_user",
    "ban_user",
    "create_room",
    "archive_room",
    "promote_user",
    "noop",
];

const REQUESTERS: [&str; 10] = [
    "avery", "jordan", "taylor", "riley", "morgan", "casey", "alex", "quinn", "parker", "drew",
];

const TARGET_USERS: [&str; 12] = [
    "walker", "martin", "hill", "evans", "lopez", "gray", "ward", "young", "diaz", "reed",
    "campbell", "turner",
];

const ROOMS: [&str; 8] = [
    "general",
    "announcements",
    "support",
    "engineering",
    "design",
    "random",
    "incidents",
    "release",
];

const REQUEST_VERBS: [&str; 6] = [
    "please add", "can you remove", "invite", "kick", "set up", "archive",
];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Deterministic generator of annotation rows for tests and demo data.
/// Roughly one row in eight carries a malformed output payload so the
/// "invalid" category always has members in generated datasets.
#[derive(Debug, Clone)]
pub struct RowFaker {
    rng: DeterministicRng,
}

impl RowFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn row(&mut self) -> AnnotationRow {
        let prompt = self.pick(&PROMPT_NAMES);
        let requester = self.pick(&REQUESTERS);
        let target = self.pick(&TARGET_USERS);
        let room = self.pick(&ROOMS);

        let input = format!(
            "{} {} to #{}",
            self.pick(&REQUEST_VERBS),
            target,
            room
        );
        let output = if self.rng.int_n(8) == 0 {
            format!("{{\"action\": \"{}\"", self.pick(&ACTIONS))
        } else {
            let action = self.pick(&ACTIONS);
            format!(
                "{{\"action\":\"{action}\",\"requester\":\"{requester}\",\"requested_users\":[\"{target}\"],\"action_metadata\":{{\"room\":\"{room}\"}}}}"
            )
        };

        let mut row = AnnotationRow {
            prompt_name: prompt.to_owned(),
            input,
            output,
            manually_reviewed: None,
            manually_reviewed_ts: None,
            last_updated_ts: None,
        };

        if self.rng.int_n(10) < 3 {
            let reviewed_at = self.random_datetime_between(
                reference_now() - Duration::days(90),
                reference_now(),
            );
            row.manually_reviewed = Some(true);
            row.manually_reviewed_ts = Some(reviewed_at.unix_timestamp());
            row.last_updated_ts = reviewed_at.format(&Rfc3339).ok();
        }

        row
    }

    pub fn rows(&mut self, count: usize) -> Vec<AnnotationRow> {
        (0..count).map(|_| self.row()).collect()
    }

    /// Rows with a fixed prompt sequence, for tests that assert on exact
    /// original indices.
    pub fn rows_with_prompts(&mut self, prompts: &[&str]) -> Vec<AnnotationRow> {
        prompts
            .iter()
            .map(|prompt| {
                let mut row = self.row();
                row.prompt_name = (*prompt).to_owned();
                row
            })
            .collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn random_datetime_between(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> OffsetDateTime {
        let start_ts = start.unix_timestamp();
        let end_ts = end.unix_timestamp();
        if end_ts <= start_ts {
            return start;
        }
        let span = (end_ts - start_ts) as u64;
        let offset = self.rng.next_u64() % (span + 1);
        OffsetDateTime::from_unix_timestamp(start_ts + offset as i64).expect("valid unix timestamp")
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("relabel.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

pub fn prompt_names() -> &'static [&'static str] {
    &PROMPT_NAMES
}

pub fn action_names() -> &'static [&'static str] {
    &ACTIONS
}

fn reference_now() -> OffsetDateTime {
    let date = Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1)
        .expect("valid calendar date");
    let midnight = Time::from_hms(0, 0, 0).expect("valid midnight");
    date.with_time(midnight).assume_utc()
}

#[cfg(test)]
mod tests {
    use super::{RowFaker, action_names, prompt_names};
    use relabel_app::{INVALID_ACTION, ParsedRowCache};
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_same_rows() {
        let mut left = RowFaker::new(42);
        let mut right = RowFaker::new(42);
        assert_eq!(left.rows(25), right.rows(25));
    }

    #[test]
    fn generated_rows_cover_valid_and_invalid_outputs() {
        let mut faker = RowFaker::new(7);
        let rows = faker.rows(200);
        let cache = ParsedRowCache::build(&rows);

        let categories: BTreeSet<&str> = (0..rows.len())
            .map(|index| cache.action_category(index))
            .collect();
        assert!(categories.contains(INVALID_ACTION));
        assert!(categories.iter().any(|category| *category != INVALID_ACTION));
    }

    #[test]
    fn reviewed_rows_carry_timestamps() {
        let mut faker = RowFaker::new(11);
        let rows = faker.rows(100);

        let reviewed: Vec<_> = rows.iter().filter(|row| row.is_reviewed()).collect();
        assert!(!reviewed.is_empty());
        for row in reviewed {
            assert!(row.manually_reviewed_ts.is_some());
            assert!(row.last_updated_ts.is_some());
        }
    }

    #[test]
    fn rows_with_prompts_pins_the_sequence() {
        let mut faker = RowFaker::new(3);
        let rows = faker.rows_with_prompts(&["a", "a", "b"]);
        let prompts: Vec<_> = rows.iter().map(|row| row.prompt_name.as_str()).collect();
        assert_eq!(prompts, vec!["a", "a", "b"]);
    }

    #[test]
    fn variety_across_seeds() {
        let mut inputs = BTreeSet::new();
        for seed in 0_u64..20_u64 {
            let mut faker = RowFaker::new(seed);
            inputs.insert(faker.row().input);
        }
        assert!(inputs.len() >= 10, "got {}", inputs.len());
    }

    #[test]
    fn pools_are_non_empty() {
        assert!(!prompt_names().is_empty());
        assert!(!action_names().is_empty());
    }
}
