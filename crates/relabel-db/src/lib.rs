// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use relabel_app::AnnotationRow;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "relabel";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "datasets",
        &["dataset", "split", "fingerprint", "row_count", "refreshed_at"],
    ),
    (
        "rows",
        &[
            "dataset",
            "split",
            "original_index",
            "prompt_name",
            "input",
            "output",
            "manually_reviewed",
            "manually_reviewed_ts",
            "last_updated_ts",
        ],
    ),
    (
        "annotation_journal",
        &[
            "id",
            "dataset",
            "split",
            "original_index",
            "payload",
            "saved_at",
            "pushed_at",
        ],
    ),
    ("settings", &["key", "value", "updated_at"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_rows_prompt_name",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_rows_prompt_name ON rows (dataset, split, prompt_name);",
    },
    RequiredIndex {
        name: "idx_journal_dataset",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_journal_dataset ON annotation_journal (dataset, split);",
    },
    RequiredIndex {
        name: "idx_journal_pushed_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_journal_pushed_at ON annotation_journal (pushed_at);",
    },
];

/// Keys for the single-value settings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    LastLink,
    LastDataset,
    LastSplit,
}

impl SettingKey {
    pub const ALL: [Self; 3] = [Self::LastLink, Self::LastDataset, Self::LastSplit];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastLink => "last_link",
            Self::LastDataset => "last_dataset",
            Self::LastSplit => "last_split",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "last_link" => Some(Self::LastLink),
            "last_dataset" => Some(Self::LastDataset),
            "last_split" => Some(Self::LastSplit),
            _ => None,
        }
    }
}

/// One saved annotation waiting to be (or already) pushed to the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub id: i64,
    pub dataset: String,
    pub split: String,
    pub original_index: usize,
    pub row: AnnotationRow,
    pub saved_at: String,
    pub pushed_at: Option<String>,
}

/// Summary line for a stored dataset snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSnapshot {
    pub dataset: String,
    pub split: String,
    pub fingerprint: String,
    pub row_count: usize,
    pub refreshed_at: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    /// Replace the stored snapshot for one dataset/split with a fresh row
    /// set, atomically. Row identity is positional, so the whole set is
    /// swapped rather than merged.
    pub fn replace_rows(&mut self, dataset: &str, split: &str, rows: &[AnnotationRow]) -> Result<()> {
        let fingerprint = fingerprint_rows(rows);
        let refreshed_at = now_rfc3339()?;

        let tx = self.conn.transaction().context("begin replace transaction")?;
        tx.execute(
            "DELETE FROM rows WHERE dataset = ? AND split = ?",
            params![dataset, split],
        )
        .context("clear previous rows")?;

        {
            let mut stmt = tx
                .prepare(
                    "
                    INSERT INTO rows (
                      dataset, split, original_index, prompt_name, input, output,
                      manually_reviewed, manually_reviewed_ts, last_updated_ts
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ",
                )
                .context("prepare row insert")?;
            for (original_index, row) in rows.iter().enumerate() {
                stmt.execute(params![
                    dataset,
                    split,
                    original_index as i64,
                    row.prompt_name,
                    row.input,
                    row.output,
                    row.manually_reviewed.map(i64::from),
                    row.manually_reviewed_ts,
                    row.last_updated_ts,
                ])
                .with_context(|| format!("insert row {original_index}"))?;
            }
        }

        tx.execute(
            "
            INSERT INTO datasets (dataset, split, fingerprint, row_count, refreshed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (dataset, split) DO UPDATE SET
              fingerprint = excluded.fingerprint,
              row_count = excluded.row_count,
              refreshed_at = excluded.refreshed_at
            ",
            params![dataset, split, fingerprint, rows.len() as i64, refreshed_at],
        )
        .context("record dataset snapshot")?;

        tx.commit().context("commit replace transaction")
    }

    /// Stored rows in original-index order.
    pub fn load_rows(&self, dataset: &str, split: &str) -> Result<Vec<AnnotationRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT prompt_name, input, output,
                       manually_reviewed, manually_reviewed_ts, last_updated_ts
                FROM rows
                WHERE dataset = ? AND split = ?
                ORDER BY original_index ASC
                ",
            )
            .context("prepare rows query")?;
        let rows = stmt
            .query_map(params![dataset, split], |row| {
                let manually_reviewed: Option<i64> = row.get(3)?;
                Ok(AnnotationRow {
                    prompt_name: row.get(0)?,
                    input: row.get(1)?,
                    output: row.get(2)?,
                    manually_reviewed: manually_reviewed.map(|value| value != 0),
                    manually_reviewed_ts: row.get(4)?,
                    last_updated_ts: row.get(5)?,
                })
            })
            .context("query rows")?;

        rows.collect::<rusqlite::Result<Vec<_>>>().context("collect rows")
    }

    pub fn snapshot(&self, dataset: &str, split: &str) -> Result<Option<DatasetSnapshot>> {
        self.conn
            .query_row(
                "
                SELECT fingerprint, row_count, refreshed_at
                FROM datasets
                WHERE dataset = ? AND split = ?
                ",
                params![dataset, split],
                |row| {
                    let row_count: i64 = row.get(1)?;
                    Ok(DatasetSnapshot {
                        dataset: dataset.to_owned(),
                        split: split.to_owned(),
                        fingerprint: row.get(0)?,
                        row_count: row_count.max(0) as usize,
                        refreshed_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("query dataset snapshot")
    }

    pub fn stored_fingerprint(&self, dataset: &str, split: &str) -> Result<Option<String>> {
        Ok(self.snapshot(dataset, split)?.map(|snapshot| snapshot.fingerprint))
    }

    /// Persist one edited row and append a journal entry in the same
    /// transaction, so a crash cannot record a save without its journal line.
    pub fn save_row(
        &mut self,
        dataset: &str,
        split: &str,
        original_index: usize,
        row: &AnnotationRow,
    ) -> Result<i64> {
        let payload = serde_json::to_string(row).context("serialize annotation payload")?;
        let saved_at = now_rfc3339()?;

        let tx = self.conn.transaction().context("begin save transaction")?;
        let updated = tx
            .execute(
                "
                UPDATE rows SET
                  prompt_name = ?, input = ?, output = ?,
                  manually_reviewed = ?, manually_reviewed_ts = ?, last_updated_ts = ?
                WHERE dataset = ? AND split = ? AND original_index = ?
                ",
                params![
                    row.prompt_name,
                    row.input,
                    row.output,
                    row.manually_reviewed.map(i64::from),
                    row.manually_reviewed_ts,
                    row.last_updated_ts,
                    dataset,
                    split,
                    original_index as i64,
                ],
            )
            .context("update stored row")?;
        if updated == 0 {
            bail!("row {original_index} does not exist in {dataset}/{split}; refresh first");
        }

        tx.execute(
            "
            INSERT INTO annotation_journal (dataset, split, original_index, payload, saved_at)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![dataset, split, original_index as i64, payload, saved_at],
        )
        .context("append journal entry")?;
        let journal_id = tx.last_insert_rowid();

        tx.commit().context("commit save transaction")?;
        Ok(journal_id)
    }

    /// Journal entries not yet acknowledged by the hub, oldest first.
    pub fn pending_journal(&self) -> Result<Vec<JournalEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, dataset, split, original_index, payload, saved_at, pushed_at
                FROM annotation_journal
                WHERE pushed_at IS NULL
                ORDER BY id ASC
                ",
            )
            .context("prepare pending journal query")?;
        let rows = stmt
            .query_map([], journal_entry_from_row)
            .context("query pending journal")?;

        let entries = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect pending journal")?;
        entries
            .into_iter()
            .map(|(entry, payload)| {
                let row = serde_json::from_str(&payload)
                    .with_context(|| format!("journal entry {} payload is corrupt", entry.id))?;
                Ok(JournalEntry { row, ..entry })
            })
            .collect()
    }

    pub fn mark_pushed(&self, journal_id: i64) -> Result<()> {
        let pushed_at = now_rfc3339()?;
        let updated = self
            .conn
            .execute(
                "UPDATE annotation_journal SET pushed_at = ? WHERE id = ? AND pushed_at IS NULL",
                params![pushed_at, journal_id],
            )
            .context("mark journal entry pushed")?;
        if updated == 0 {
            bail!("journal entry {journal_id} does not exist or is already pushed");
        }
        Ok(())
    }

    pub fn get_setting(&self, key: SettingKey) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("read setting {}", key.as_str()))
    }

    pub fn set_setting(&self, key: SettingKey, value: &str) -> Result<()> {
        let updated_at = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT (key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key.as_str(), value, updated_at],
            )
            .with_context(|| format!("write setting {}", key.as_str()))?;
        Ok(())
    }

    /// Install a small fixed row set so the viewer can be explored without an
    /// annotation hub. Covers reviewed and unreviewed rows, several prompts
    /// and actions, and one malformed output.
    pub fn seed_demo_data(&mut self) -> Result<()> {
        self.replace_rows(DEMO_DATASET, DEMO_SPLIT, &demo_rows())
    }
}

pub const DEMO_DATASET: &str = "demo";
pub const DEMO_SPLIT: &str = "train";

fn demo_rows() -> Vec<AnnotationRow> {
    let specs: [(&str, &str, &str, Option<i64>); 8] = [
        (
            "room_admin_v1",
            "please invite dana to the garden channel",
            r#"{"action": "invite_user", "requester": "admin_bot", "requested_users": ["dana"], "action_metadata": {"room": "garden"}}"#,
            Some(1_770_000_000),
        ),
        (
            "room_admin_v1",
            "kick the spam account from general",
            r#"{"action": "kick_user", "requester": "moderator", "requested_users": ["spam_account"], "action_metadata": {"room": "general"}}"#,
            None,
        ),
        (
            "invite_flow",
            "add the whole design team to critique",
            r#"{"action": "invite_user", "requester": "lead", "requested_users": ["mika", "ren", "sol"], "action_metadata": {"room": "critique"}}"#,
            None,
        ),
        (
            "moderation_baseline",
            "ban the account that keeps posting links",
            r#"{"action": "ban_user", "requester": "moderator", "requested_users": ["linkspam"], "action_metadata": {"room": "general"}}"#,
            Some(1_770_100_000),
        ),
        (
            "moderation_baseline",
            "this one is just a greeting, do nothing",
            r#"{"action": "noop", "requester": "user", "requested_users": [], "action_metadata": {}}"#,
            None,
        ),
        (
            "onboarding",
            "make a room for the q3 planning work",
            r#"{"action": "create_room", "requester": "pm", "requested_users": [], "action_metadata": {"room": "q3-planning"}}"#,
            None,
        ),
        (
            "escalation",
            "promote sol to moderator in general",
            r#"{"action": "promote_user", "requester": "admin", "requested_users": ["sol"], "action_metadata": {"room": "general"}}"#,
            None,
        ),
        // Truncated output, which the viewer surfaces as the invalid category.
        (
            "bulk_actions",
            "archive every room from the old workspace",
            r#"{"action": "archive_room""#,
            None,
        ),
    ];

    specs
        .into_iter()
        .map(|(prompt, input, output, reviewed_ts)| AnnotationRow {
            prompt_name: prompt.to_owned(),
            input: input.to_owned(),
            output: output.to_owned(),
            manually_reviewed: reviewed_ts.map(|_| true),
            manually_reviewed_ts: reviewed_ts,
            last_updated_ts: None,
        })
        .collect()
}

type RawJournalRow = (JournalEntry, String);

fn journal_entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJournalRow> {
    let original_index: i64 = row.get(3)?;
    let payload: String = row.get(4)?;
    Ok((
        JournalEntry {
            id: row.get(0)?,
            dataset: row.get(1)?,
            split: row.get(2)?,
            original_index: original_index.max(0) as usize,
            row: AnnotationRow {
                prompt_name: String::new(),
                input: String::new(),
                output: String::new(),
                manually_reviewed: None,
                manually_reviewed_ts: None,
                last_updated_ts: None,
            },
            saved_at: row.get(5)?,
            pushed_at: row.get(6)?,
        },
        payload,
    ))
}

/// Content fingerprint of a row set. Field boundaries are length-prefixed so
/// adjacent fields cannot collide by concatenation.
pub fn fingerprint_rows(rows: &[AnnotationRow]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((rows.len() as u64).to_le_bytes());
    for row in rows {
        for field in [&row.prompt_name, &row.input, &row.output] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update([match row.manually_reviewed {
            Some(true) => 2u8,
            Some(false) => 1,
            None => 0,
        }]);
        hasher.update(row.manually_reviewed_ts.unwrap_or(i64::MIN).to_le_bytes());
        let last_updated = row.last_updated_ts.as_deref().unwrap_or("");
        hasher.update((last_updated.len() as u64).to_le_bytes());
        hasher.update(last_updated.as_bytes());
    }

    let digest = hasher.finalize();
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("RELABEL_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set RELABEL_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("relabel.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a relabel-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}
