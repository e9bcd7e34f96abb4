//! Async SERP search collaborator: trigger a collection job, then poll its
//! snapshot until results arrive or the deadline fires
//!
//! The service processes searches asynchronously: the trigger call returns a
//! snapshot id and the snapshot endpoint answers 202 until the result set is
//! ready. The result payload nests organic results under different shapes
//! across dataset versions, so parsing is structural rather than fixed-path.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::model::SearchPollConfig;

const ENV_API_KEY: &str = "BRIGHTDATA_API_KEY";
const ENV_DATASET_ID: &str = "BRIGHTDATA_DATASET_ID";
const ENV_BASE_URL: &str = "BRIGHTDATA_BASE_URL";

const DEFAULT_DATASET_ID: &str = "gd_mfz5x93lmsjjjylob";
const DEFAULT_BASE_URL: &str = "https://api.brightdata.com";

/// Only the first page of results is requested
const MAX_RESULTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Search trigger returned no snapshot id")]
    NoSnapshotId,

    #[error("Search results not ready after {attempts} attempts (~{elapsed_secs}s)")]
    Timeout { attempts: u32, elapsed_secs: u64 },

    #[error("Unrecognized result payload shape: {0}")]
    UnrecognizedShape(String),

    #[error("Search API key not configured (set {ENV_API_KEY})")]
    MissingApiKey,
}

/// One organic search result, prior to relevance scoring
#[derive(Debug, Clone, PartialEq)]
pub struct SerpResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Search-engine rank, 1 = top result
    pub rank: u32,
}

/// Collaborator seam for the external search service
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SerpResult>, SearchError>;
}

/// BrightData SERP dataset client
pub struct BrightDataSearch {
    client: Client,
    api_key: String,
    dataset_id: String,
    base_url: String,
    poll: SearchPollConfig,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: Option<String>,
}

impl BrightDataSearch {
    /// Build the search client from the environment. Missing credentials
    /// surface at startup.
    pub fn from_env(poll: SearchPollConfig) -> Result<Self, SearchError> {
        let api_key = std::env::var(ENV_API_KEY).map_err(|_| SearchError::MissingApiKey)?;
        let dataset_id =
            std::env::var(ENV_DATASET_ID).unwrap_or_else(|_| DEFAULT_DATASET_ID.to_string());
        let base_url =
            std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        tracing::info!(dataset_id = %dataset_id, "Search client initialized");

        Ok(Self {
            client: Client::builder()
                .user_agent("civicsight-agent/1.0")
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            dataset_id,
            base_url,
            poll,
        })
    }

    async fn trigger(&self, query: &str) -> Result<String, SearchError> {
        let endpoint = format!(
            "{}/datasets/v3/trigger?dataset_id={}",
            self.base_url, self.dataset_id
        );

        let payload = serde_json::json!([{
            "url": "https://www.google.com/",
            "keyword": query,
            "language": "en",
            "country": "US",
            "start_page": 1,
            "end_page": 1,
        }]);

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let trigger: TriggerResponse = response.json().await?;
        trigger.snapshot_id.ok_or(SearchError::NoSnapshotId)
    }

    /// Poll the snapshot endpoint until the result set is ready. Suspends
    /// cooperatively between attempts; the overall deadline is enforced by
    /// the caller's `tokio::time::timeout` wrapper in `search`.
    async fn poll_snapshot(&self, snapshot_id: &str) -> Result<Value, SearchError> {
        let results_url = format!(
            "{}/datasets/v3/snapshot/{}?format=json",
            self.base_url, snapshot_id
        );

        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval()).await;

            let response = self
                .client
                .get(&results_url)
                .bearer_auth(&self.api_key)
                .send()
                .await?;

            match response.status().as_u16() {
                200 => {
                    let data: Value = response.json().await?;
                    if payload_has_data(&data) {
                        tracing::debug!(attempt, snapshot_id, "Snapshot results retrieved");
                        return Ok(data);
                    }
                    tracing::debug!(attempt, snapshot_id, "Snapshot empty, continuing to poll");
                }
                202 => {
                    tracing::debug!(attempt, snapshot_id, "Snapshot still processing");
                }
                status => {
                    tracing::warn!(attempt, snapshot_id, status, "Unexpected snapshot status");
                }
            }
        }

        Err(SearchError::Timeout {
            attempts: self.poll.max_attempts,
            elapsed_secs: self.poll.max_attempts as u64 * self.poll.interval_secs,
        })
    }
}

/// True when the snapshot payload carries any data at all
fn payload_has_data(data: &Value) -> bool {
    match data {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

/// Locate the organic result list inside a structurally variable payload.
///
/// Known shapes, tried in order:
/// - `[{ "organic": [...] , ... }]` (current SERP dataset)
/// - `{ "organic_results": [...] }` (legacy)
/// - `{ "results": [...] }` (legacy)
pub fn parse_organic_results(data: &Value) -> Result<Vec<SerpResult>, SearchError> {
    let entries: &Vec<Value> = if let Some(items) = data.as_array() {
        items
            .first()
            .and_then(|first| first.get("organic"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SearchError::UnrecognizedShape("array payload without 'organic' list".to_string())
            })?
    } else if let Some(list) = data.get("organic_results").and_then(Value::as_array) {
        list
    } else if let Some(list) = data.get("results").and_then(Value::as_array) {
        list
    } else {
        return Err(SearchError::UnrecognizedShape(format!(
            "no organic result list found (top-level keys: {:?})",
            data.as_object()
                .map(|m| m.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        )));
    };

    let results = entries
        .iter()
        .take(MAX_RESULTS)
        .enumerate()
        .filter_map(|(i, entry)| {
            // Field names differ between shapes as well
            let url = entry
                .get("link")
                .or_else(|| entry.get("url"))
                .and_then(Value::as_str)?
                .to_string();
            let title = entry.get("title").and_then(Value::as_str)?.to_string();
            let snippet = entry
                .get("description")
                .or_else(|| entry.get("snippet"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let rank = entry
                .get("rank")
                .and_then(Value::as_u64)
                .map(|r| r as u32)
                .unwrap_or(i as u32 + 1);

            Some(SerpResult {
                title,
                url,
                snippet,
                rank,
            })
        })
        .collect();

    Ok(results)
}

#[async_trait]
impl SearchProvider for BrightDataSearch {
    async fn search(&self, query: &str) -> Result<Vec<SerpResult>, SearchError> {
        tracing::info!(query, "Triggering search job");

        let snapshot_id = self.trigger(query).await?;
        tracing::debug!(snapshot_id = %snapshot_id, "Search job accepted");

        // The overall cap bounds the whole polling loop regardless of
        // individual attempt outcomes; cancellation tears down any in-flight
        // request with it.
        let data = tokio::time::timeout(self.poll.overall_cap(), self.poll_snapshot(&snapshot_id))
            .await
            .map_err(|_| SearchError::Timeout {
                attempts: self.poll.max_attempts,
                elapsed_secs: self.poll.overall_cap_secs,
            })??;

        parse_organic_results(&data)
    }
}
