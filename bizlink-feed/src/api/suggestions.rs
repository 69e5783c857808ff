//! People suggestions endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::json;

use super::{ApiError, Viewer};
use crate::cache::{cache_key, ttl_for, Resource};
use crate::params::QueryParams;
use crate::suggestions::{SuggestionsQuery, SuggestionsResponse};
use crate::AppState;

const SUGGESTIONS_FAILED: &str = "Failed to get suggestions";

/// GET /api/suggestions
pub async fn get_suggestions(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let params = QueryParams::from_pairs(pairs);
    let query = SuggestionsQuery::from_params(&params, &state.config.matching);

    let profile = match viewer.id() {
        Some(id) => state
            .users
            .find_profile(id)
            .await
            .map_err(|e| ApiError::internal(SUGGESTIONS_FAILED, e))?,
        None => None,
    };

    let mut key_params =
        serde_json::to_value(&query).map_err(|e| ApiError::internal(SUGGESTIONS_FAILED, e))?;
    key_params["currentUserId"] = json!(viewer.cache_identity());
    let key = cache_key("suggestions", &key_params);
    let ttl = ttl_for(Resource::Suggestions, &state.config.cache_ttl);
    let catalog = state.catalog.snapshot().await;

    let response = state
        .cache
        .with_cache(&key, ttl, || {
            state.suggestions.suggest(&query, profile.as_ref(), catalog)
        })
        .await
        .map_err(|e| ApiError::internal(SUGGESTIONS_FAILED, e))?;

    Ok(Json(response))
}
