use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied search parameters, all optional. Exactly one of the four
/// location modes (`near`, `lat_lon`, `bbox`, `geo_points`) is meaningful at
/// a time; the normalizer fills `near` from preferences only when the caller
/// supplied none of them.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SearchParameters {
    pub query: Option<String>,
    pub near: Option<String>,
    /// "lat;lon" pair.
    pub lat_lon: Option<String>,
    /// "lat1;lon1,lat2;lon2" bounding box.
    pub bbox: Option<String>,
    /// Semicolon-delimited polygon vertices.
    pub geo_points: Option<String>,
    /// Search radius in miles.
    pub radius: Option<u32>,
    pub category: Option<String>,
    pub topic: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub exclude_children: Option<bool>,
    pub kids: Option<bool>,
    pub registerable_only: Option<bool>,
    pub current_page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub attributes: Option<String>,
    pub tags: Option<String>,
    /// Comma-separated existence filters, e.g. "registrationUrls".
    pub exists: Option<String>,
    /// Comma-separated facet names to aggregate on.
    pub facets: Option<String>,
}

/// `SearchParameters` after the preference merge. This record, not the raw
/// caller input, is what gets cached, logged and serialized upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSearchParameters {
    pub query: Option<String>,
    pub near: Option<String>,
    pub lat_lon: Option<String>,
    pub bbox: Option<String>,
    pub geo_points: Option<String>,
    pub radius: Option<u32>,
    pub category: Option<String>,
    pub topic: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub exclude_children: Option<bool>,
    pub kids: Option<bool>,
    pub registerable_only: Option<bool>,
    pub current_page: u32,
    pub per_page: u32,
    pub sort: Option<String>,
    pub attributes: Option<String>,
    pub tags: Option<String>,
    pub exists: Option<String>,
    pub facets: Option<String>,
}

impl EffectiveSearchParameters {
    /// Upstream query pairs. Unset fields are omitted entirely, never sent
    /// as empty values.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        {
            let mut push_str = |name: &str, value: &Option<String>| {
                if let Some(v) = value {
                    if !v.is_empty() {
                        pairs.push((name.to_string(), v.clone()));
                    }
                }
            };
            push_str("query", &self.query);
            push_str("near", &self.near);
            push_str("lat_lon", &self.lat_lon);
            push_str("bbox", &self.bbox);
            push_str("geo_points", &self.geo_points);
            push_str("category", &self.category);
            push_str("topic", &self.topic);
            push_str("start_date", &self.start_date);
            push_str("end_date", &self.end_date);
            push_str("sort", &self.sort);
            push_str("attributes", &self.attributes);
            push_str("tags", &self.tags);
            push_str("exists", &self.exists);
            push_str("facets", &self.facets);
        }
        if let Some(r) = self.radius {
            pairs.push(("radius".into(), r.to_string()));
        }
        if let Some(b) = self.exclude_children {
            pairs.push(("exclude_children".into(), b.to_string()));
        }
        if let Some(b) = self.kids {
            pairs.push(("kids".into(), b.to_string()));
        }
        if let Some(b) = self.registerable_only {
            pairs.push(("registerable_only".into(), b.to_string()));
        }
        pairs.push(("current_page".into(), self.current_page.to_string()));
        pairs.push(("per_page".into(), self.per_page.to_string()));
        pairs
    }
}

/// Standard wrapper shape around upstream search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEnvelope {
    pub total_results: u64,
    pub items_per_page: u32,
    pub start_index: u64,
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub facets: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub suggestions: Vec<serde_json::Value>,
}

/// One bucket of an upstream facet aggregation, e.g. a category with its
/// activity count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: String,
    #[serde(default)]
    pub count: u64,
}

/// Session-scoped personalization applied by the normalizer on every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub default_location: String,
    pub default_radius: u32,
    pub favorite_categories: Vec<String>,
    pub exclude_children: bool,
}

/// Partial update for `Preferences`: only set fields are merged, lists are
/// replaced wholesale.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    pub default_location: Option<String>,
    pub default_radius: Option<u32>,
    pub favorite_categories: Option<Vec<String>>,
    pub exclude_children: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHistoryRecord {
    pub query: EffectiveSearchParameters,
    pub timestamp: DateTime<Utc>,
    pub result_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryAnalytics {
    pub total_searches: u64,
    pub searches_last_24h: u64,
    pub searches_last_7d: u64,
    pub average_result_count: f64,
    pub top_categories: Vec<FrequencyEntry>,
    pub top_locations: Vec<FrequencyEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub approximate_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Record of a background task. Nothing in this server drives status
/// transitions; records are stored and reported only.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub kind: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

/// Advanced-search input: base parameters plus derived filters.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AdvancedSearchParameters {
    #[serde(flatten)]
    pub base: SearchParameters,
    /// "MIN-MAX" age range, translated into attribute filters.
    pub age_range: Option<String>,
    /// When true, restricts to activities with open registration.
    pub registration_open: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
