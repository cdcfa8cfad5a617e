// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use relabel_app::AnnotationRow;
use relabel_db::{SettingKey, Store, fingerprint_rows};
use relabel_hub::Client;
use relabel_tui::{AppRuntime, RefreshOutcome};

/// Runtime backed by the local store, with an optional hub client. Saves
/// always land in the store first; pushes to the hub are journaled and
/// retried, so a dead hub never loses an annotation.
pub struct DbRuntime {
    store: Store,
    client: Option<Client>,
    dataset: String,
    split: String,
    resume_last_view: bool,
    link_override: Option<String>,
}

impl DbRuntime {
    pub fn new(
        store: Store,
        client: Option<Client>,
        dataset: &str,
        split: &str,
        resume_last_view: bool,
        link_override: Option<String>,
    ) -> Self {
        Self {
            store,
            client,
            dataset: dataset.to_owned(),
            split: split.to_owned(),
            resume_last_view,
            link_override,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Push every unacknowledged journal entry for this dataset/split, oldest
    /// first, stopping at the first failure. Returns the number pushed.
    pub fn flush_pending(&mut self) -> Result<usize> {
        let Some(client) = &self.client else {
            return Ok(0);
        };

        let mut pushed = 0;
        for entry in self.store.pending_journal()? {
            if entry.dataset != self.dataset || entry.split != self.split {
                continue;
            }
            client
                .push_annotation(entry.original_index, &entry.row)
                .with_context(|| format!("push journal entry {}", entry.id))?;
            self.store.mark_pushed(entry.id)?;
            pushed += 1;
        }
        Ok(pushed)
    }
}

impl AppRuntime for DbRuntime {
    fn initial_rows(&mut self) -> Result<Vec<AnnotationRow>> {
        let stored = self.store.load_rows(&self.dataset, &self.split)?;
        if !stored.is_empty() {
            return Ok(stored);
        }

        let Some(client) = &self.client else {
            bail!(
                "no stored rows for {}/{} and the hub is unavailable; enable [hub] in the config or run with --demo",
                self.dataset,
                self.split
            );
        };

        let fetched = client.fetch_rows()?;
        self.store.replace_rows(&self.dataset, &self.split, &fetched)?;
        Ok(fetched)
    }

    fn refresh_rows(&mut self) -> Result<RefreshOutcome> {
        let Some(client) = &self.client else {
            bail!("hub is unavailable in this session; restart without --offline to refresh");
        };

        let fetched = client.fetch_rows()?;
        let stored = self.store.stored_fingerprint(&self.dataset, &self.split)?;
        if stored.as_deref() == Some(fingerprint_rows(&fetched).as_str()) {
            return Ok(RefreshOutcome::Unchanged);
        }

        self.store.replace_rows(&self.dataset, &self.split, &fetched)?;
        Ok(RefreshOutcome::Replaced(fetched))
    }

    fn persist_row(&mut self, original_index: usize, row: &AnnotationRow) -> Result<()> {
        self.store
            .save_row(&self.dataset, &self.split, original_index, row)?;
        // The journal keeps anything the hub did not acknowledge.
        let _ = self.flush_pending();
        Ok(())
    }

    fn load_link(&mut self) -> Result<Option<String>> {
        if let Some(link) = self.link_override.take() {
            return Ok(Some(link));
        }
        if !self.resume_last_view {
            return Ok(None);
        }
        self.store.get_setting(SettingKey::LastLink)
    }

    fn store_link(&mut self, link: &str) -> Result<()> {
        self.store.set_setting(SettingKey::LastLink, link)
    }

    fn dataset_label(&self) -> String {
        if self.client.is_some() {
            format!("{}/{}", self.dataset, self.split)
        } else {
            format!("{}/{} [offline]", self.dataset, self.split)
        }
    }
}
