// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use relabel_app::AnnotationRow;
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Blocking client for the annotation hub, the service that owns the dataset
/// row sets. One client is pinned to a single dataset/split pair.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    dataset: String,
    split: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, dataset: &str, split: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("hub.base_url must not be empty");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("hub.base_url {trimmed:?} is not a valid URL"))?;
        if dataset.trim().is_empty() {
            bail!("hub.dataset must not be empty");
        }
        if split.trim().is_empty() {
            bail!("hub.split must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            dataset: dataset.to_owned(),
            split: split.to_owned(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn split(&self) -> &str {
        &self.split
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn health(&self) -> Result<()> {
        let url = self.endpoint(&["health"], false)?;
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(self.base_url.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    /// The full row set for this client's dataset/split, in original order.
    pub fn fetch_rows(&self) -> Result<Vec<AnnotationRow>> {
        let url = self.endpoint(&["rows"], true)?;
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(self.base_url.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: RowsResponse = response.json().context("decode row set")?;
        Ok(parsed.rows)
    }

    /// Upload one saved annotation. The hub addresses rows positionally, so
    /// the original index is part of the path.
    pub fn push_annotation(&self, original_index: usize, row: &AnnotationRow) -> Result<()> {
        let url = self.endpoint(&["rows", &original_index.to_string()], true)?;
        let response = self
            .http
            .post(url)
            .json(row)
            .send()
            .map_err(|error| connection_error(self.base_url.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str], scoped: bool) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("hub.base_url cannot carry path segments"))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        if scoped {
            url.query_pairs_mut()
                .append_pair("dataset", &self.dataset)
                .append_pair("split", &self.split);
        }
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<AnnotationRow>,
}

#[derive(Debug, Deserialize)]
struct DetailErrorEnvelope {
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlainErrorEnvelope {
    error: Option<String>,
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check hub.base_url and that the annotation hub is running ({} )",
        base_url.trim_end_matches('/'),
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<DetailErrorEnvelope>(body)
        && let Some(detail) = parsed.detail
        && !detail.is_empty()
    {
        return anyhow!("hub error ({}): {}", status.as_u16(), detail);
    }

    if let Ok(parsed) = serde_json::from_str::<PlainErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        return anyhow!("hub error ({}): {}", status.as_u16(), error);
    }

    if body.len() < 100 && !body.contains('{') {
        return anyhow!("hub error ({}): {}", status.as_u16(), body);
    }

    anyhow!("hub returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::Client;
    use std::time::Duration;

    #[test]
    fn new_rejects_bad_configuration() {
        assert!(Client::new("", "intent", "train", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", "intent", "train", Duration::from_secs(1)).is_err());
        assert!(Client::new("http://localhost:8800", "", "train", Duration::from_secs(1)).is_err());
        assert!(Client::new("http://localhost:8800", "intent", " ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let client = Client::new(
            "http://localhost:8800/",
            "intent",
            "train",
            Duration::from_secs(1),
        )
        .expect("client should initialize");
        assert_eq!(client.base_url(), "http://localhost:8800");
        assert_eq!(client.dataset(), "intent");
        assert_eq!(client.split(), "train");
    }
}
