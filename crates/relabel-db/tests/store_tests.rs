// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use relabel_app::AnnotationRow;
use relabel_db::{SettingKey, Store, fingerprint_rows, validate_db_path};
use relabel_testkit::{RowFaker, temp_db_path};

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("/tmp/relabel.db").is_ok());
}

#[test]
fn bootstrap_creates_schema() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    // A second bootstrap against the created schema must validate cleanly.
    store.bootstrap()?;
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.raw_connection().execute_batch(
        "
        ALTER TABLE rows RENAME TO rows_old;
        CREATE TABLE rows (
          dataset TEXT NOT NULL,
          split TEXT NOT NULL,
          original_index INTEGER NOT NULL,
          prompt_name TEXT NOT NULL,
          input TEXT NOT NULL,
          output TEXT NOT NULL,
          PRIMARY KEY (dataset, split, original_index)
        );
        DROP TABLE rows_old;
        ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `rows` is missing required columns"));
    assert!(message.contains("manually_reviewed"));
    Ok(())
}

#[test]
fn replace_and_load_preserve_original_order() -> Result<()> {
    let mut store = Store::open_memory()?;
    store.bootstrap()?;

    let rows = RowFaker::new(1).rows(40);
    store.replace_rows("intent", "train", &rows)?;

    let loaded = store.load_rows("intent", "train")?;
    assert_eq!(loaded, rows);

    let snapshot = store
        .snapshot("intent", "train")?
        .expect("snapshot recorded");
    assert_eq!(snapshot.row_count, 40);
    assert_eq!(snapshot.fingerprint, fingerprint_rows(&rows));
    Ok(())
}

#[test]
fn replace_swaps_the_whole_row_set() -> Result<()> {
    let mut store = Store::open_memory()?;
    store.bootstrap()?;

    let mut faker = RowFaker::new(2);
    store.replace_rows("intent", "train", &faker.rows(30))?;

    let replacement = faker.rows(5);
    store.replace_rows("intent", "train", &replacement)?;

    assert_eq!(store.load_rows("intent", "train")?, replacement);
    Ok(())
}

#[test]
fn splits_are_isolated() -> Result<()> {
    let mut store = Store::open_memory()?;
    store.bootstrap()?;

    let mut faker = RowFaker::new(3);
    let train = faker.rows(10);
    let test = faker.rows(4);
    store.replace_rows("intent", "train", &train)?;
    store.replace_rows("intent", "test", &test)?;

    assert_eq!(store.load_rows("intent", "train")?, train);
    assert_eq!(store.load_rows("intent", "test")?, test);
    Ok(())
}

#[test]
fn fingerprint_is_content_sensitive() {
    let mut faker = RowFaker::new(4);
    let rows = faker.rows(10);

    assert_eq!(fingerprint_rows(&rows), fingerprint_rows(&rows.clone()));

    let mut edited = rows.clone();
    edited[3].output.push('!');
    assert_ne!(fingerprint_rows(&rows), fingerprint_rows(&edited));

    // Same count with a review flag flipped must still differ.
    let mut reviewed = rows.clone();
    reviewed[0].manually_reviewed = Some(true);
    assert_ne!(fingerprint_rows(&rows), fingerprint_rows(&reviewed));
}

#[test]
fn save_row_updates_and_journals() -> Result<()> {
    let mut store = Store::open_memory()?;
    store.bootstrap()?;

    let rows = RowFaker::new(5).rows(8);
    store.replace_rows("intent", "train", &rows)?;

    let mut edited = rows[2].clone();
    edited.output = r#"{"action":"ban_user"}"#.to_owned();
    edited.manually_reviewed = Some(true);
    edited.manually_reviewed_ts = Some(1_760_000_000);
    let journal_id = store.save_row("intent", "train", 2, &edited)?;

    let loaded = store.load_rows("intent", "train")?;
    assert_eq!(loaded[2], edited);

    let pending = store.pending_journal()?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, journal_id);
    assert_eq!(pending[0].original_index, 2);
    assert_eq!(pending[0].row, edited);
    assert!(pending[0].pushed_at.is_none());

    store.mark_pushed(journal_id)?;
    assert!(store.pending_journal()?.is_empty());
    assert!(store.mark_pushed(journal_id).is_err());
    Ok(())
}

#[test]
fn save_row_rejects_unknown_index() -> Result<()> {
    let mut store = Store::open_memory()?;
    store.bootstrap()?;
    store.replace_rows("intent", "train", &RowFaker::new(6).rows(3))?;

    let row = RowFaker::new(7).row();
    let err = store
        .save_row("intent", "train", 99, &row)
        .expect_err("index out of range");
    assert!(err.to_string().contains("does not exist"));
    Ok(())
}

#[test]
fn settings_round_trip() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    assert_eq!(store.get_setting(SettingKey::LastLink)?, None);
    store.set_setting(SettingKey::LastLink, "row=7&prompts=a")?;
    store.set_setting(SettingKey::LastLink, "row=3")?;
    assert_eq!(
        store.get_setting(SettingKey::LastLink)?.as_deref(),
        Some("row=3")
    );

    for key in SettingKey::ALL {
        assert_eq!(SettingKey::parse(key.as_str()), Some(key));
    }
    Ok(())
}

#[test]
fn open_persists_to_disk() -> Result<()> {
    let (_dir, db_path) = temp_db_path()?;
    let rows = RowFaker::new(8).rows(6);

    {
        let mut store = Store::open(&db_path)?;
        store.bootstrap()?;
        store.replace_rows("intent", "train", &rows)?;
    }

    let store = Store::open(&db_path)?;
    store.bootstrap()?;
    assert_eq!(store.load_rows("intent", "train")?, rows);
    Ok(())
}

#[test]
fn seed_demo_data_installs_a_browsable_snapshot() -> Result<()> {
    let mut store = Store::open_memory()?;
    store.bootstrap()?;
    store.seed_demo_data()?;

    let rows = store.load_rows(relabel_db::DEMO_DATASET, relabel_db::DEMO_SPLIT)?;
    assert!(!rows.is_empty());
    assert!(rows.iter().any(AnnotationRow::is_reviewed));
    assert!(rows.iter().any(|row| !row.is_reviewed()));
    // One row carries a deliberately truncated output.
    assert!(
        rows.iter()
            .any(|row| serde_json::from_str::<serde_json::Value>(&row.output).is_err())
    );

    let snapshot = store
        .snapshot(relabel_db::DEMO_DATASET, relabel_db::DEMO_SPLIT)?
        .expect("demo snapshot recorded");
    assert_eq!(snapshot.row_count, rows.len());
    Ok(())
}
