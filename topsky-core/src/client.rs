// topsky-core/src/client.rs
//! HTTP client for the Newsky airline API.
//!
//! Both endpoints take a JSON body over `POST` and answer `{ "results": [...] }`. When a
//! deployment rejects the `POST` with 404 or 405 the same parameters are sent once more
//! as a `GET` query string. Nothing is retried beyond that.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use crate::config::NewskyConfig;
use crate::errors::{SyncError, SyncResult};
use crate::record::FlightRecord;

const RECENT_ENDPOINT: &str = "flights/recent";
const BY_DATE_ENDPOINT: &str = "flights/bydate";
const MAX_ERROR_BODY_CHARS: usize = 512;
const USER_AGENT: &str = concat!("topsky/", env!("CARGO_PKG_VERSION"));

/// Which HTTP method produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchPath {
    Post,
    GetFallback,
}

impl fmt::Display for FetchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPath::Post => f.write_str("POST"),
            FetchPath::GetFallback => f.write_str("GET fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub records: Vec<FlightRecord>,
    pub via: FetchPath,
}

impl FetchedPage {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Anything that can hand out pages of flight records.
#[async_trait]
pub trait FlightSource: Send + Sync {
    /// Recent flights created at or after `since`.
    async fn fetch_recent_flights(
        &self,
        count: u32,
        skip: u32,
        since: DateTime<Utc>,
    ) -> SyncResult<FetchedPage>;

    /// Flights created inside the inclusive `[start, end]` range.
    async fn fetch_flights_by_date(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        skip: u32,
        count: u32,
    ) -> SyncResult<FetchedPage>;
}

pub struct NewskyClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for NewskyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewskyClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl NewskyClient {
    /// Fails with [`SyncError::MissingCredential`] when no usable API key is configured.
    pub fn new(config: &NewskyConfig) -> SyncResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(SyncError::MissingCredential)?
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(&self, endpoint: &str, body: Value) -> SyncResult<FetchedPage> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let response = self
            .http
            .request(Method::POST, &url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let (response, via) = match response.status() {
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
                warn!(
                    "POST {} answered {}, retrying as GET",
                    url,
                    response.status().as_u16()
                );
                let fallback = self
                    .http
                    .get(&url)
                    .bearer_auth(&self.api_key)
                    .query(&query_pairs(&body))
                    .send()
                    .await?;
                (fallback, FetchPath::GetFallback)
            }
            _ => (response, FetchPath::Post),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Upstream {
                status: status.as_u16(),
                body: truncate_chars(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SyncError::MalformedResponse(format!("response is not JSON: {e}")))?;
        let records = parse_results(payload)?;
        debug!("{} answered {} record(s) via {}", endpoint, records.len(), via);
        Ok(FetchedPage { records, via })
    }
}

#[async_trait]
impl FlightSource for NewskyClient {
    async fn fetch_recent_flights(
        &self,
        count: u32,
        skip: u32,
        since: DateTime<Utc>,
    ) -> SyncResult<FetchedPage> {
        let body = json!({
            "count": count,
            "skip": skip,
            "start": iso(since),
            "includeDeleted": false,
        });
        self.call(RECENT_ENDPOINT, body).await
    }

    async fn fetch_flights_by_date(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        skip: u32,
        count: u32,
    ) -> SyncResult<FetchedPage> {
        let body = json!({
            "start": iso(start),
            "end": iso(end),
            "skip": skip,
            "count": count,
            "includeDeleted": false,
        });
        self.call(BY_DATE_ENDPOINT, body).await
    }
}

/// `2024-03-01T00:00:00.000Z`, the format the API expects.
pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Extracts `results`. Non-object entries are dropped with a warning.
fn parse_results(payload: Value) -> SyncResult<Vec<FlightRecord>> {
    let Value::Object(mut map) = payload else {
        return Err(SyncError::MalformedResponse(
            "expected a JSON object with `results`".to_string(),
        ));
    };
    let results = match map.remove("results") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(SyncError::MalformedResponse(
                "`results` is not an array".to_string(),
            ))
        }
        None => {
            return Err(SyncError::MalformedResponse(
                "response has no `results` field".to_string(),
            ))
        }
    };

    let total = results.len();
    let records: Vec<FlightRecord> = results.into_iter().filter_map(FlightRecord::from_value).collect();
    if records.len() < total {
        warn!("Dropped {} non-object entries from results", total - records.len());
    }
    Ok(records)
}

fn query_pairs(body: &Value) -> Vec<(String, String)> {
    body.as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
