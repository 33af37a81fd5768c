use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::error::ApiError;
use crate::normalize::normalize;
use crate::types::{AdvancedSearchParameters, FacetValue, SearchParameters};
use crate::AppState;

/// The search path: normalize against preferences, try the cache by the
/// effective-parameter key, otherwise hit upstream and record the result.
/// Responses are annotated with the effective parameters and a timestamp;
/// cache hits additionally carry `_cached: true`.
pub async fn run_search(
    state: &Arc<AppState>,
    caller: SearchParameters,
) -> Result<serde_json::Value, ApiError> {
    let prefs = state.preferences().get();
    let effective = normalize(&caller, &prefs);
    let key = ResultCache::cache_key(&effective);

    if let Some(mut payload) = state.cache().get(&key) {
        info!("serving search from cache");
        if let Some(map) = payload.as_object_mut() {
            map.insert("_cached".into(), json!(true));
        }
        return Ok(payload);
    }

    info!(query = ?effective.query, near = ?effective.near, "searching upstream");
    let envelope = state
        .client
        .search(&effective)
        .await
        .map_err(|e| e.with_context("search failed"))?;
    let result_count = envelope.results.len() as u64;
    debug!(result_count, total = envelope.total_results, "upstream returned");

    let mut payload =
        serde_json::to_value(&envelope).map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Some(map) = payload.as_object_mut() {
        map.insert(
            "search_parameters".into(),
            serde_json::to_value(&effective).map_err(|e| ApiError::Internal(e.to_string()))?,
        );
        map.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
    }

    // a failed upstream call never reaches this point, so neither the cache
    // nor the history can observe it
    state
        .cache()
        .put(key, payload.clone(), state.config.cache_ttl);
    state.history().record(effective, result_count);
    Ok(payload)
}

pub async fn run_advanced_search(
    state: &Arc<AppState>,
    params: AdvancedSearchParameters,
) -> Result<serde_json::Value, ApiError> {
    let base = apply_advanced_filters(&params)?;
    run_search(state, base).await
}

pub async fn run_details(
    state: &Arc<AppState>,
    asset_id: &str,
) -> Result<serde_json::Value, ApiError> {
    state
        .client
        .details(asset_id)
        .await
        .map_err(|e| e.with_context("details lookup failed"))
}

pub async fn run_list_categories(state: &Arc<AppState>) -> Result<Vec<FacetValue>, ApiError> {
    state
        .client
        .list_categories()
        .await
        .map_err(|e| e.with_context("category listing failed"))
}

pub async fn run_list_locations(state: &Arc<AppState>) -> Result<Vec<FacetValue>, ApiError> {
    state
        .client
        .list_locations()
        .await
        .map_err(|e| e.with_context("location listing failed"))
}

pub async fn run_list_topics(state: &Arc<AppState>) -> Result<Vec<FacetValue>, ApiError> {
    state
        .client
        .list_topics()
        .await
        .map_err(|e| e.with_context("topic listing failed"))
}

/// Translates the advanced-search derived filters into base parameters:
/// an age range becomes attribute filters, a registration-open flag becomes
/// the registerable-only flag plus an existence filter.
pub fn apply_advanced_filters(
    params: &AdvancedSearchParameters,
) -> Result<SearchParameters, ApiError> {
    let mut base = params.base.clone();
    if let Some(range) = &params.age_range {
        let (min, max) = parse_age_range(range)?;
        let attr = format!("minAge:{min},maxAge:{max}");
        base.attributes = Some(match base.attributes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing},{attr}"),
            _ => attr,
        });
    }
    if params.registration_open == Some(true) {
        base.registerable_only = Some(true);
        base.exists = Some(match base.exists.take() {
            Some(existing) if !existing.is_empty() => format!("{existing},registrationUrls"),
            _ => "registrationUrls".to_string(),
        });
    }
    Ok(base)
}

fn parse_age_range(range: &str) -> Result<(u32, u32), ApiError> {
    let invalid = || {
        ApiError::InvalidParameters(format!(
            "age_range must look like \"5-12\", got {range:?}"
        ))
    };
    let (min, max) = range.split_once('-').ok_or_else(invalid)?;
    let min: u32 = min.trim().parse().map_err(|_| invalid())?;
    let max: u32 = max.trim().parse().map_err(|_| invalid())?;
    if min > max {
        return Err(invalid());
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_upstream(
        hits: Arc<AtomicUsize>,
        status: StatusCode,
        body: serde_json::Value,
    ) -> String {
        let app = Router::new().route(
            "/search",
            get(move || {
                let hits = hits.clone();
                let body = body.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn two_result_envelope() -> serde_json::Value {
        json!({
            "total_results": 2,
            "items_per_page": 25,
            "start_index": 0,
            "results": [{"assetName": "A"}, {"assetName": "B"}],
            "facets": {},
            "suggestions": [],
        })
    }

    #[tokio::test]
    async fn search_caches_result_and_records_history() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(hits.clone(), StatusCode::OK, two_result_envelope()).await;
        let state = Arc::new(AppState::new(Config::for_tests(base)).unwrap());

        let caller = SearchParameters {
            query: Some("yoga".into()),
            ..Default::default()
        };
        let first = run_search(&state, caller.clone()).await.unwrap();
        assert!(first.get("_cached").is_none());
        assert_eq!(first["total_results"], json!(2));
        assert!(first.get("search_parameters").is_some());
        assert!(first.get("timestamp").is_some());
        assert_eq!(state.cache().len(), 1);
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history().recent(1)[0].result_count, 2);

        let second = run_search(&state, caller).await.unwrap();
        assert_eq!(second["_cached"], json!(true));
        assert_eq!(second["total_results"], json!(2));
        // served from cache: upstream was hit exactly once, history unchanged
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(state.history().len(), 1);
    }

    #[tokio::test]
    async fn equivalent_requests_share_a_cache_entry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(hits.clone(), StatusCode::OK, two_result_envelope()).await;
        let state = Arc::new(AppState::new(Config::for_tests(base)).unwrap());

        run_search(
            &state,
            SearchParameters {
                query: Some("yoga".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        // spells out the values normalization would have filled in anyway
        let spelled_out = run_search(
            &state,
            SearchParameters {
                query: Some("yoga".into()),
                near: Some(state.config.default_location.clone()),
                radius: Some(state.config.default_radius),
                exclude_children: Some(false),
                per_page: Some(25),
                current_page: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(spelled_out["_cached"], json!(true));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_search_leaves_no_cache_or_history() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(
            hits.clone(),
            StatusCode::FORBIDDEN,
            json!("Over Rate Limit"),
        )
        .await;
        let state = Arc::new(AppState::new(Config::for_tests(base)).unwrap());

        let err = run_search(&state, SearchParameters::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rate_limited");
        assert!(err.to_string().contains("search failed"));
        assert!(state.cache().is_empty());
        assert!(state.history().is_empty());
    }

    #[tokio::test]
    async fn details_of_unknown_asset_is_not_found() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(hits.clone(), StatusCode::OK, json!({"results": []})).await;
        let state = Arc::new(AppState::new(Config::for_tests(base)).unwrap());

        let err = run_details(&state, "abc-123").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn listing_parses_facet_values() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(
            hits.clone(),
            StatusCode::OK,
            json!({
                "facets": {
                    "categoryName": {
                        "values": [
                            {"value": "fitness", "count": 120},
                            {"value": "cycling", "count": 40},
                        ]
                    }
                }
            }),
        )
        .await;
        let state = Arc::new(AppState::new(Config::for_tests(base)).unwrap());

        let categories = run_list_categories(&state).await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].value, "fitness");
        assert_eq!(categories[0].count, 120);
    }

    #[test]
    fn advanced_filters_derive_attributes_and_exists() {
        let derived = apply_advanced_filters(&AdvancedSearchParameters {
            base: SearchParameters {
                query: Some("swim".into()),
                ..Default::default()
            },
            age_range: Some("5-12".into()),
            registration_open: Some(true),
        })
        .unwrap();
        assert_eq!(derived.attributes.as_deref(), Some("minAge:5,maxAge:12"));
        assert_eq!(derived.registerable_only, Some(true));
        assert_eq!(derived.exists.as_deref(), Some("registrationUrls"));
    }

    #[test]
    fn advanced_filters_append_to_existing_attributes() {
        let derived = apply_advanced_filters(&AdvancedSearchParameters {
            base: SearchParameters {
                attributes: Some("difficulty:beginner".into()),
                ..Default::default()
            },
            age_range: Some("18-65".into()),
            registration_open: None,
        })
        .unwrap();
        assert_eq!(
            derived.attributes.as_deref(),
            Some("difficulty:beginner,minAge:18,maxAge:65")
        );
    }

    #[test]
    fn malformed_age_range_is_invalid_parameters() {
        for range in ["kids", "12-5", "-", "a-b"] {
            let err = apply_advanced_filters(&AdvancedSearchParameters {
                base: SearchParameters::default(),
                age_range: Some(range.into()),
                registration_open: None,
            })
            .unwrap_err();
            assert!(matches!(err, ApiError::InvalidParameters(_)), "{range}");
        }
    }
}
