use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    EnrichError, Result,
    cache::ResponseCache,
    config::ArchiveConfig,
    model::{ArchiveRequest, DailySeries, DailyVariable},
};

use super::ArchiveProvider;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Open-Meteo historical archive client.
///
/// Requests go through a retrying HTTP client and, when present, a
/// persistent response cache keyed by the full request URL.
#[derive(Debug, Clone)]
pub struct OpenMeteoArchive {
    base_url: Url,
    timezone: String,
    http: ClientWithMiddleware,
    cache: Option<ResponseCache>,
}

impl OpenMeteoArchive {
    pub fn new(config: &ArchiveConfig, cache: Option<ResponseCache>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            EnrichError::input(format!("invalid archive base URL '{}': {e}", config.base_url))
        })?;

        let initial_backoff = Duration::from_millis(config.initial_backoff_ms);
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(initial_backoff, MAX_BACKOFF.max(initial_backoff))
            .build_with_max_retries(config.max_retries);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EnrichError::Transport(e.into()))?;

        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            base_url,
            timezone: config.timezone.clone(),
            http,
            cache,
        })
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Full request URL. Also the cache key.
    pub fn request_url(&self, request: &ArchiveRequest) -> Result<Url> {
        let params = [
            ("latitude", request.latitude.to_string()),
            ("longitude", request.longitude.to_string()),
            ("start_date", request.range.start_date.to_string()),
            ("end_date", request.range.end_date.to_string()),
            ("daily", request.daily_param()),
            ("timezone", self.timezone.clone()),
        ];
        Url::parse_with_params(self.base_url.as_str(), &params)
            .map_err(|e| EnrichError::input(format!("cannot build archive URL: {e}")))
    }

    async fn fetch_body(&self, url: &Url) -> Result<Vec<u8>> {
        tracing::debug!(%url, "requesting archive");

        let res = self.http.get(url.clone()).send().await?;

        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|e| EnrichError::Transport(e.into()))?;

        if !status.is_success() {
            return Err(EnrichError::Api {
                status: status.as_u16(),
                reason: error_reason(&body),
            });
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl ArchiveProvider for OpenMeteoArchive {
    async fn daily_series(&self, request: &ArchiveRequest) -> Result<DailySeries> {
        let url = self.request_url(request)?;
        let key = url.as_str();

        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(key).await? {
                return parse_series(&body, request);
            }
        }

        let body = self.fetch_body(&url).await?;
        let series = parse_series(&body, request)?;

        if let Some(cache) = &self.cache {
            cache.put(key, body).await?;
        }

        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<DailyBlock>,
}

/// Daily block as sent: `time` plus one array per variable, keyed by name.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct DailyBlock(Map<String, Value>);

impl DailyBlock {
    fn time(&self) -> Result<Vec<String>> {
        let raw = self
            .0
            .get("time")
            .cloned()
            .ok_or_else(|| EnrichError::malformed("daily block has no time axis"))?;
        serde_json::from_value(raw)
            .map_err(|e| EnrichError::malformed(format!("bad daily time axis: {e}")))
    }

    fn column(&self, variable: DailyVariable) -> Result<Vec<Option<f64>>> {
        let name = variable.api_name();
        let values = self
            .0
            .get(name)
            .ok_or_else(|| EnrichError::malformed(format!("missing daily variable {name}")))?
            .as_array()
            .ok_or_else(|| EnrichError::malformed(format!("{name} is not an array")))?;

        values
            .iter()
            .map(|v| match v {
                Value::Null => Ok(None),
                Value::Number(n) => n
                    .as_f64()
                    .map(Some)
                    .ok_or_else(|| EnrichError::malformed(format!("bad value for {name}: {n}"))),
                other => Err(EnrichError::malformed(format!(
                    "bad value for {name}: {other}"
                ))),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    reason: String,
}

fn error_reason(body: &[u8]) -> String {
    match serde_json::from_slice::<ApiError>(body) {
        Ok(err) => err.reason,
        Err(_) => truncate_body(&String::from_utf8_lossy(body)),
    }
}

fn parse_series(body: &[u8], request: &ArchiveRequest) -> Result<DailySeries> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| EnrichError::malformed(format!("cannot parse archive JSON: {e}")))?;

    // The API answers with an array when several locations are requested.
    let first = match payload {
        Value::Array(responses) => responses
            .into_iter()
            .next()
            .ok_or_else(|| EnrichError::malformed("empty response list"))?,
        other => other,
    };
    let response: ArchiveResponse = serde_json::from_value(first)
        .map_err(|e| EnrichError::malformed(format!("unexpected archive response: {e}")))?;

    let daily = response
        .daily
        .ok_or_else(|| EnrichError::malformed("response has no daily block"))?;

    let dates = daily
        .time()?
        .iter()
        .map(|t| {
            NaiveDate::parse_from_str(t, "%Y-%m-%d")
                .map_err(|e| EnrichError::malformed(format!("bad daily time '{t}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let interval = chrono::Duration::days(1);
    for pair in dates.windows(2) {
        if pair[1] - pair[0] != interval {
            return Err(EnrichError::malformed(format!(
                "daily time is not contiguous between {} and {}",
                pair[0], pair[1]
            )));
        }
    }

    let start = dates.first().copied().unwrap_or_else(|| request.range.start());
    let end = start + interval * i32::try_from(dates.len()).unwrap_or(i32::MAX);

    let mut columns = HashMap::with_capacity(request.variables.len());
    for variable in &request.variables {
        let values = daily.column(*variable)?;
        columns.insert(*variable, values);
    }

    let series = DailySeries::new(start, end, interval, columns)?;
    let labels: Vec<&str> = request.variables.iter().map(DailyVariable::label).collect();
    tracing::debug!(days = series.len(), variables = ?labels, "parsed daily series");
    Ok(series)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
