use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::info;

use crate::error::ApiError;
use crate::search;
use crate::types::{AdvancedSearchParameters, PreferencesUpdate, SearchParameters};
use crate::AppState;

/// Failures the protocol layers translate into their own error shapes.
/// `Api` carries the upstream taxonomy through unchanged.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Static description of one exposed tool.
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Single dispatch point for every tool, shared by the stdio and HTTP
/// protocol surfaces. Responses are pretty-printed JSON text.
pub async fn dispatch(
    state: &Arc<AppState>,
    name: &str,
    args: Option<&Map<String, Value>>,
) -> Result<String, ToolError> {
    info!(tool = name, "tool call");
    match name {
        "search_activities" => {
            let params: SearchParameters = parse_args(args)?;
            to_pretty(&search::run_search(state, params).await?)
        }
        "advanced_search" => {
            let params: AdvancedSearchParameters = parse_args(args)?;
            to_pretty(&search::run_advanced_search(state, params).await?)
        }
        "get_activity_details" => {
            let asset_id = required_str(args, "asset_id")?;
            to_pretty(&search::run_details(state, &asset_id).await?)
        }
        "list_categories" => to_pretty(&search::run_list_categories(state).await?),
        "list_locations" => to_pretty(&search::run_list_locations(state).await?),
        "list_topics" => to_pretty(&search::run_list_topics(state).await?),
        "get_preferences" => to_pretty(&state.preferences().get()),
        "set_preferences" => {
            let update: PreferencesUpdate = parse_args(args)?;
            to_pretty(&state.preferences().set(update))
        }
        "reset_preferences" => to_pretty(&state.preferences().reset()),
        "get_search_history" => {
            let limit = match args.and_then(|m| m.get("limit")) {
                Some(v) => v.as_u64().ok_or_else(|| {
                    ToolError::InvalidArguments("limit must be a non-negative integer".into())
                })? as usize,
                None => DEFAULT_HISTORY_LIMIT,
            };
            let default_location = state.preferences().get().default_location;
            let history = state.history();
            to_pretty(&json!({
                "recent": history.recent(limit),
                "analytics": history.analytics(&default_location),
            }))
        }
        "clear_cache" => match args.and_then(|m| m.get("key")).and_then(|v| v.as_str()) {
            Some(key) => {
                let removed = state.cache().remove(key);
                to_pretty(&json!({"removed": removed, "key": key}))
            }
            None => {
                let cleared = state.cache().clear();
                to_pretty(&json!({"cleared_entries": cleared}))
            }
        },
        "get_cache_stats" => to_pretty(&state.cache().stats()),
        "list_background_tasks" => to_pretty(&state.tasks().list()),
        "get_background_task" => {
            let task_id = required_str(args, "task_id")?;
            let task = state
                .tasks()
                .get(&task_id)
                .ok_or_else(|| ApiError::NotFound(format!("no task with id {task_id}")))?;
            to_pretty(&task)
        }
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

fn parse_args<T: DeserializeOwned>(args: Option<&Map<String, Value>>) -> Result<T, ToolError> {
    let value = match args {
        Some(map) => Value::Object(map.clone()),
        None => Value::Object(Map::new()),
    };
    serde_json::from_value(value)
        .map_err(|e| ToolError::InvalidArguments(format!("invalid arguments: {e}")))
}

fn required_str(args: Option<&Map<String, Value>>, key: &str) -> Result<String, ToolError> {
    args.and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required parameter: {key}")))
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ToolError::Api(ApiError::Internal(e.to_string())))
}

pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    let search_properties = json!({
        "query": {"type": "string", "description": "Free-text search terms"},
        "near": {"type": "string", "description": "Place name, e.g. \"Austin,TX,US\""},
        "lat_lon": {"type": "string", "description": "\"lat;lon\" point to search around"},
        "bbox": {"type": "string", "description": "\"lat1;lon1,lat2;lon2\" bounding box"},
        "geo_points": {"type": "string", "description": "Semicolon-delimited polygon vertices"},
        "radius": {"type": "integer", "description": "Search radius in miles"},
        "category": {"type": "string", "description": "Activity category filter"},
        "topic": {"type": "string", "description": "Topic filter"},
        "start_date": {"type": "string", "description": "Earliest activity date, YYYY-MM-DD"},
        "end_date": {"type": "string", "description": "Latest activity date, YYYY-MM-DD"},
        "exclude_children": {"type": "boolean", "description": "Hide component activities of multi-part events"},
        "kids": {"type": "boolean", "description": "Only activities for kids"},
        "registerable_only": {"type": "boolean", "description": "Only activities open for registration"},
        "current_page": {"type": "integer", "minimum": 1},
        "per_page": {"type": "integer", "minimum": 1, "maximum": 50},
        "sort": {"type": "string", "description": "Sort order, e.g. \"date_asc\""},
        "attributes": {"type": "string", "description": "Comma-separated attribute filters"},
        "tags": {"type": "string", "description": "Comma-separated tag filters"},
        "exists": {"type": "string", "description": "Comma-separated fields that must be present"},
        "facets": {"type": "string", "description": "Comma-separated facet names to aggregate"},
    });
    let mut advanced_properties = search_properties.clone();
    if let Some(map) = advanced_properties.as_object_mut() {
        map.insert(
            "age_range".into(),
            json!({"type": "string", "description": "\"MIN-MAX\" participant age range, e.g. \"5-12\""}),
        );
        map.insert(
            "registration_open".into(),
            json!({"type": "boolean", "description": "Only activities whose registration is open"}),
        );
    }

    vec![
        ToolDescriptor {
            name: "search_activities",
            description: "Search recreational activities and events. Unset fields fall back to the stored preferences (default location, radius, child exclusion). Results within the last 5 minutes are served from cache and marked _cached.",
            input_schema: json!({"type": "object", "properties": search_properties}),
        },
        ToolDescriptor {
            name: "advanced_search",
            description: "Activity search with derived filters: an age_range string and a registration_open flag on top of the regular search parameters.",
            input_schema: json!({"type": "object", "properties": advanced_properties}),
        },
        ToolDescriptor {
            name: "get_activity_details",
            description: "Fetch full details of one activity by its asset id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "asset_id": {"type": "string", "description": "Upstream asset id of the activity"}
                },
                "required": ["asset_id"]
            }),
        },
        ToolDescriptor {
            name: "list_categories",
            description: "List available activity categories with activity counts.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: "list_locations",
            description: "List locations that currently have activities, with counts.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: "list_topics",
            description: "List activity topics with activity counts.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: "get_preferences",
            description: "Show the current search preferences.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: "set_preferences",
            description: "Update search preferences. Only supplied fields change; the favorite category list is replaced wholesale.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "default_location": {"type": "string"},
                    "default_radius": {"type": "integer"},
                    "favorite_categories": {"type": "array", "items": {"type": "string"}},
                    "exclude_children": {"type": "boolean"},
                }
            }),
        },
        ToolDescriptor {
            name: "reset_preferences",
            description: "Restore the startup default preferences.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: "get_search_history",
            description: "Recent searches plus analytics: totals, trailing 24h/7d counts, average result count, top categories and locations.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "How many recent records to return (default 10)"}
                }
            }),
        },
        ToolDescriptor {
            name: "clear_cache",
            description: "Clear the result cache, either entirely or one entry by its key.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string", "description": "Cache key to remove; omit to clear everything"}
                }
            }),
        },
        ToolDescriptor {
            name: "get_cache_stats",
            description: "Result cache statistics: total/valid/expired entries and approximate payload bytes.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: "list_background_tasks",
            description: "List stored background task records.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: "get_background_task",
            description: "Inspect one background task record by id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "task_id": {"type": "string"}
                },
                "required": ["task_id"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state() -> Arc<AppState> {
        // no upstream call is made by the tools exercised here
        Arc::new(AppState::new(Config::for_tests("http://127.0.0.1:1")).unwrap())
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = dispatch(&state(), "explode", None).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn preferences_roundtrip_through_dispatch() {
        let state = state();
        let mut args = Map::new();
        args.insert("default_radius".into(), json!(5));
        let updated = dispatch(&state, "set_preferences", Some(&args))
            .await
            .unwrap();
        let updated: Value = serde_json::from_str(&updated).unwrap();
        assert_eq!(updated["default_radius"], json!(5));

        let reset = dispatch(&state, "reset_preferences", None).await.unwrap();
        let reset: Value = serde_json::from_str(&reset).unwrap();
        assert_eq!(reset["default_radius"], json!(25));
    }

    #[tokio::test]
    async fn details_requires_asset_id() {
        let err = dispatch(&state(), "get_activity_details", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let mut args = Map::new();
        args.insert("task_id".into(), json!("nope"));
        let err = dispatch(&state(), "get_background_task", Some(&args))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Api(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn task_records_are_listed() {
        let state = state();
        let created = state.tasks().create("export", "export search history");
        let listed = dispatch(&state, "list_background_tasks", None)
            .await
            .unwrap();
        let listed: Value = serde_json::from_str(&listed).unwrap();
        assert_eq!(listed[0]["id"], json!(created.id));
        assert_eq!(listed[0]["status"], json!("pending"));
    }

    #[tokio::test]
    async fn history_tool_reports_analytics() {
        let state = state();
        let empty = dispatch(&state, "get_search_history", None).await.unwrap();
        let empty: Value = serde_json::from_str(&empty).unwrap();
        assert_eq!(empty["analytics"]["total_searches"], json!(0));
        assert_eq!(empty["recent"], json!([]));
    }

    #[tokio::test]
    async fn clear_cache_reports_removed_entries() {
        let state = state();
        state
            .cache()
            .put("k".into(), json!({"x": 1}), crate::cache::DEFAULT_TTL);
        let cleared = dispatch(&state, "clear_cache", None).await.unwrap();
        let cleared: Value = serde_json::from_str(&cleared).unwrap();
        assert_eq!(cleared["cleared_entries"], json!(1));
    }

    #[test]
    fn every_descriptor_has_an_object_schema() {
        for tool in tool_descriptors() {
            assert_eq!(tool.input_schema["type"], json!("object"), "{}", tool.name);
        }
    }
}
