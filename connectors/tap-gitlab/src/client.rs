//! Paginated GitLab REST client with retry.

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Response, StatusCode, Url};
use serde_json::Value;
use streamtap_sdk::types::stream::Record;
use streamtap_sdk::types::TapError;

use crate::config::Config;

const PER_PAGE: u32 = 100;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_MAX_MS: u64 = 30_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GitlabClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GitlabClient {
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when `api_url` is not a base URL
    /// or the token or user agent is not a valid header value.
    pub fn new(config: &Config) -> Result<Self, TapError> {
        let base_url = config.base_url()?;

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&config.auth_token)
            .map_err(|_| TapError::config("auth_token is not a valid header value"))?;
        token.set_sensitive(true);
        headers.insert("Private-Token", token);

        let agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("tap-gitlab/{}", env!("CARGO_PKG_VERSION")));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&agent)
                .map_err(|_| TapError::config("user_agent is not a valid header value"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TapError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url })
    }

    /// API URL for `segments`, each percent-encoded as one path segment.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when the base URL cannot take
    /// path segments.
    pub fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url, TapError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TapError::config(format!("api_url '{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Every record behind `url`, following `X-Next-Page` until it is empty.
    pub fn paginate<'a>(
        &'a self,
        stream: &'a str,
        url: Url,
        query: Vec<(String, String)>,
    ) -> BoxStream<'a, Result<Record, TapError>> {
        stream::try_unfold(Some(1u32), move |page| {
            let url = url.clone();
            let query = query.clone();
            async move {
                let Some(page) = page else {
                    return Ok(None);
                };
                let (records, next) = self.fetch_page(stream, &url, &query, page).await?;
                let records = stream::iter(records.into_iter().map(Ok::<Record, TapError>));
                Ok::<_, TapError>(Some((records, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    async fn fetch_page(
        &self,
        stream: &str,
        url: &Url,
        query: &[(String, String)],
        page: u32,
    ) -> Result<(Vec<Record>, Option<u32>), TapError> {
        let response = self.send(stream, url, query, page).await?;
        let next = next_page(response.headers());
        let body: Value = response
            .json()
            .await
            .map_err(|e| TapError::fetch(stream, e))?;
        let records = records_from_body(stream, body)?;
        tracing::debug!(stream, %url, page, records = records.len(), ?next, "Fetched page");
        Ok((records, next))
    }

    async fn send(
        &self,
        stream: &str,
        url: &Url,
        query: &[(String, String)],
        page: u32,
    ) -> Result<Response, TapError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .http
                .get(url.clone())
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await;

            let delay = match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_retryable(response.status()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(stream, %url, status = %response.status(), attempt, "Retrying request");
                    compute_backoff(retry_after(response.headers()), attempt)
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(TapError::fetch(
                        stream,
                        format!("GET {url} returned {status}: {}", body.trim()),
                    ));
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(stream, %url, error = %e, attempt, "Retrying request");
                    compute_backoff(None, attempt)
                }
                Err(e) => return Err(TapError::fetch(stream, e)),
            };
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `Retry-After` in delta-seconds form.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

/// Compute retry delay from the server hint and attempt number.
fn compute_backoff(retry_after: Option<Duration>, attempt: u32) -> Duration {
    if let Some(delay) = retry_after {
        return delay.min(Duration::from_millis(BACKOFF_MAX_MS));
    }
    let delay_ms = BACKOFF_BASE_MS.saturating_mul(2u64.pow(attempt.saturating_sub(1)));
    Duration::from_millis(delay_ms.min(BACKOFF_MAX_MS))
}

/// Next page number. GitLab sends an empty header on the last page.
fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-next-page")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// List endpoints return arrays; single-object endpoints yield one record.
fn records_from_body(stream: &str, body: Value) -> Result<Vec<Record>, TapError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                other => Err(TapError::fetch(
                    stream,
                    format!("expected JSON object in response array, got {other}"),
                )),
            })
            .collect(),
        Value::Object(record) => Ok(vec![record]),
        other => Err(TapError::fetch(
            stream,
            format!("unexpected response body: {other}"),
        )),
    }
}
