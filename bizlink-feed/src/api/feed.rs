//! Feed endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::json;

use super::{ApiError, Viewer};
use crate::cache::{cache_key, ttl_for, Resource};
use crate::feed::{FeedQuery, FeedResponse};
use crate::params::QueryParams;
use crate::AppState;

const FEED_FAILED: &str = "Failed to get feed";

/// GET /api/feed
///
/// Ranked, diversified and decorated page of content across all kinds, or
/// one kind when `tab` names it. Any failure is reported as a generic 500;
/// a partial feed is never served.
pub async fn get_feed(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<FeedResponse>, ApiError> {
    let params = QueryParams::from_pairs(pairs);
    let query = FeedQuery::from_params(&params, &state.config.feed);

    let profile = match viewer.id() {
        Some(id) => state
            .users
            .find_profile(id)
            .await
            .map_err(|e| ApiError::internal(FEED_FAILED, e))?,
        None => None,
    };
    let settings = profile.as_ref().map(|p| p.settings.clone()).unwrap_or_default();

    let mut key_params =
        serde_json::to_value(&query).map_err(|e| ApiError::internal(FEED_FAILED, e))?;
    key_params["currentUserId"] = json!(viewer.cache_identity());
    key_params["contentTypes"] = json!(settings.content_types);
    key_params["connectionsOnly"] = json!(settings.connections_only);
    let key = cache_key("feed", &key_params);

    let resource = if query.user_id.is_some() {
        Resource::UserItems
    } else {
        Resource::Feed
    };
    let ttl = ttl_for(resource, &state.config.cache_ttl);
    let catalog = state.catalog.snapshot().await;

    let response = state
        .cache
        .with_cache(&key, ttl, || {
            state
                .assembler
                .assemble(&query, viewer.id(), profile.as_ref(), catalog)
        })
        .await
        .map_err(|e| ApiError::internal(FEED_FAILED, e))?;

    Ok(Json(response))
}
