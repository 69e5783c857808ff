//! Taxonomy metadata endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::ApiError;
use crate::cache::{cache_key, ttl_for, Resource};
use crate::taxonomy::TaxonomyTree;
use crate::AppState;

/// GET /api/taxonomy
///
/// Identities with their categories, and the category tree. Served from the
/// in-memory catalog snapshot and cached under `meta:`.
pub async fn get_taxonomy(State(state): State<AppState>) -> Result<Json<TaxonomyTree>, ApiError> {
    let key = cache_key("meta", &json!({ "resource": "taxonomy" }));
    let ttl = ttl_for(Resource::Meta, &state.config.cache_ttl);

    let tree = state
        .cache
        .with_cache(&key, ttl, || async {
            Ok(state.catalog.snapshot().await.tree())
        })
        .await?;

    Ok(Json(tree))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub identities: usize,
    pub invalidated: usize,
}

/// POST /api/taxonomy/reload
///
/// Swap in a fresh catalog snapshot and drop every cached result that was
/// computed against the old one.
pub async fn reload_taxonomy(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let catalog = state.catalog.reload(state.taxonomy.as_ref()).await?;

    let invalidated = state
        .cache
        .delete_keys(&[vec!["meta:"], vec!["feed:"], vec!["suggestions:"]])
        .await;
    info!(invalidated, "Caches cleared after taxonomy reload");

    Ok(Json(ReloadResponse {
        identities: catalog.identity_count(),
        invalidated,
    }))
}
