use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ApiError;
use crate::types::{EffectiveSearchParameters, FacetValue, SearchEnvelope};

/// Minimum interval between upstream dispatches, shared across all
/// operations on one client instance.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

pub const CATEGORY_FACET: &str = "categoryName";
pub const LOCATION_FACET: &str = "placeName";
pub const TOPIC_FACET: &str = "topicName";

/// Delays a request until `min_interval` has passed since the previous one.
/// A leaky bucket of one: it never queues or prioritizes, it only spaces
/// dispatches out. The lock is held across the sleep so concurrent callers
/// are serialized while only the calling task parks.
pub(crate) struct RequestPacer {
    last: tokio::sync::Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last: tokio::sync::Mutex::new(None),
            min_interval,
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// HTTP client for the upstream activities search API. All operations go
/// through the single search endpoint; the API key rides along as a query
/// parameter on every request.
pub struct ActivityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    pacer: RequestPacer,
}

impl ActivityClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            pacer: RequestPacer::new(MIN_REQUEST_INTERVAL),
        }
    }

    pub async fn search(
        &self,
        params: &EffectiveSearchParameters,
    ) -> Result<SearchEnvelope, ApiError> {
        let value = self.get_json(&params.to_query_pairs(), false).await?;
        envelope_from(value, params.per_page, params.current_page)
    }

    /// Detail lookup by asset id. An empty upstream result set is a
    /// not-found, never an empty success.
    pub async fn details(&self, asset_id: &str) -> Result<serde_json::Value, ApiError> {
        let pairs = vec![("assetId".to_string(), asset_id.to_string())];
        let value = self.get_json(&pairs, true).await?;
        let results = match value {
            serde_json::Value::Array(items) => items,
            other => other
                .get("results")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
        };
        results
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("no activity found for asset id {asset_id}")))
    }

    pub async fn list_categories(&self) -> Result<Vec<FacetValue>, ApiError> {
        self.list_facet_values(CATEGORY_FACET).await
    }

    pub async fn list_locations(&self) -> Result<Vec<FacetValue>, ApiError> {
        self.list_facet_values(LOCATION_FACET).await
    }

    pub async fn list_topics(&self) -> Result<Vec<FacetValue>, ApiError> {
        self.list_facet_values(TOPIC_FACET).await
    }

    /// Facet-only query: `per_page=0` deliberately bypasses the normalizer's
    /// [1, 50] clamp, which applies to result pages only.
    pub async fn list_facet_values(&self, facet: &str) -> Result<Vec<FacetValue>, ApiError> {
        let pairs = vec![
            ("per_page".to_string(), "0".to_string()),
            ("facets".to_string(), facet.to_string()),
        ];
        let value = self.get_json(&pairs, false).await?;
        match value.pointer(&format!("/facets/{facet}/values")) {
            Some(values) => serde_json::from_value(values.clone()).map_err(|e| {
                ApiError::Internal(format!("malformed facet listing for {facet}: {e}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn get_json(
        &self,
        query: &[(String, String)],
        details_lookup: bool,
    ) -> Result<serde_json::Value, ApiError> {
        self.pacer.wait().await;

        let url = format!("{}/search", self.base_url);
        debug!(%url, "upstream request");
        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("api_key", self.api_key.as_str())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(
                status.as_u16(),
                body.trim(),
                details_lookup,
            ));
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| ApiError::Internal(format!("failed to parse upstream response: {e}")))
    }
}

/// Accepts either the standard envelope or a bare result list; a bare list
/// is wrapped with count and offset computed from the requested page.
fn envelope_from(
    value: serde_json::Value,
    per_page: u32,
    current_page: u32,
) -> Result<SearchEnvelope, ApiError> {
    match value {
        serde_json::Value::Array(results) => {
            let start_index = u64::from(current_page.saturating_sub(1)) * u64::from(per_page);
            Ok(SearchEnvelope {
                total_results: start_index + results.len() as u64,
                items_per_page: per_page,
                start_index,
                results,
                facets: serde_json::Map::new(),
                suggestions: Vec::new(),
            })
        }
        other => serde_json::from_value(other)
            .map_err(|e| ApiError::Internal(format!("unexpected upstream response shape: {e}"))),
    }
}
