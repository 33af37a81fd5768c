use crate::types::{EffectiveSearchParameters, Preferences, SearchParameters};

pub const MIN_PER_PAGE: u32 = 1;
pub const MAX_PER_PAGE: u32 = 50;
pub const DEFAULT_PER_PAGE: u32 = 25;

/// Merges caller parameters with preference defaults into the effective
/// record. Pure function: neither input is mutated.
///
/// Rules:
/// - `near` is filled from `prefs.default_location` only when the caller
///   supplied none of the four location modes.
/// - `radius` falls back to `prefs.default_radius`.
/// - `exclude_children` falls back to `prefs.exclude_children` only when
///   absent; an explicit `false` from the caller is preserved.
/// - `per_page` is clamped into [1, 50] and defaults to 25. Facet-only
///   listings that need `per_page=0` bypass this function and build their
///   query in the client directly.
/// - `current_page` defaults to 1 and is never below 1.
pub fn normalize(caller: &SearchParameters, prefs: &Preferences) -> EffectiveSearchParameters {
    let has_location = caller.near.is_some()
        || caller.lat_lon.is_some()
        || caller.bbox.is_some()
        || caller.geo_points.is_some();
    let near = if has_location {
        caller.near.clone()
    } else {
        Some(prefs.default_location.clone())
    };

    let per_page = caller
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(MIN_PER_PAGE, MAX_PER_PAGE);
    let current_page = caller.current_page.unwrap_or(1).max(1);

    EffectiveSearchParameters {
        query: caller.query.clone(),
        near,
        lat_lon: caller.lat_lon.clone(),
        bbox: caller.bbox.clone(),
        geo_points: caller.geo_points.clone(),
        radius: caller.radius.or(Some(prefs.default_radius)),
        category: caller.category.clone(),
        topic: caller.topic.clone(),
        start_date: caller.start_date.clone(),
        end_date: caller.end_date.clone(),
        exclude_children: caller.exclude_children.or(Some(prefs.exclude_children)),
        kids: caller.kids,
        registerable_only: caller.registerable_only,
        current_page,
        per_page,
        sort: caller.sort.clone(),
        attributes: caller.attributes.clone(),
        tags: caller.tags.clone(),
        exists: caller.exists.clone(),
        facets: caller.facets.clone(),
    }
}
