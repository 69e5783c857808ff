//! Audience replacement endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use bizlink_common::ids::parse_id_list;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::info;

use super::{ApiError, Viewer};
use crate::model::{ContentKind, TaxonomyLevel, TaxonomySet};
use crate::AppState;

/// Requested audience; each list may be a JSON array or a comma-separated string
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudienceRequest {
    pub identity_ids: Option<Value>,
    pub category_ids: Option<Value>,
    pub subcategory_ids: Option<Value>,
    pub subsub_category_ids: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceResponse {
    pub item_id: String,
    pub audience: TaxonomySet,
}

fn ids_from_json(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::Array(items)) => parse_id_list(items.iter().filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })),
        Some(Value::String(s)) => parse_id_list([s.as_str()]),
        Some(Value::Number(n)) => parse_id_list([n.to_string()]),
        _ => BTreeSet::new(),
    }
}

/// PUT /api/items/:kind/:id/audience
///
/// Replace an item's audience tag-sets. Only the item owner may do this.
/// Taxonomy ids are validated strictly: nonexistent ids are rejected with
/// 400 instead of being dropped.
pub async fn replace_audience(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((kind, item_id)): Path<(String, String)>,
    Json(request): Json<AudienceRequest>,
) -> Result<Json<AudienceResponse>, ApiError> {
    let kind: ContentKind = kind.parse()?;
    let Some(viewer_id) = viewer.id() else {
        return Err(ApiError::Unauthorized("Authentication required".to_string()));
    };

    let owner = state
        .content
        .item_owner(kind, &item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", kind, item_id)))?;
    if owner != viewer_id {
        return Err(ApiError::Forbidden(
            "Only the owner can change an item's audience".to_string(),
        ));
    }

    let identity_ids = ids_from_json(request.identity_ids.as_ref());
    let catalog = state.catalog.snapshot().await;
    if identity_ids
        .iter()
        .any(|id| catalog.node_name(TaxonomyLevel::Identity, id).is_none())
    {
        return Err(ApiError::BadRequest("Some identities do not exist".to_string()));
    }

    let validated = state
        .validator
        .validate(
            &ids_from_json(request.category_ids.as_ref()),
            &ids_from_json(request.subcategory_ids.as_ref()),
            &ids_from_json(request.subsub_category_ids.as_ref()),
        )
        .await?;

    let audience = TaxonomySet {
        identity_ids,
        category_ids: validated.category_ids,
        subcategory_ids: validated.subcategory_ids,
        subsub_ids: validated.subsub_ids,
    };
    state.content.replace_audience(&item_id, &audience).await?;

    let invalidated = state.cache.delete_keys(&[vec!["feed:"]]).await;
    info!(
        kind = %kind,
        item_id = %item_id,
        invalidated,
        "Audience replaced"
    );

    Ok(Json(AudienceResponse { item_id, audience }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_accept_arrays_and_csv() {
        let array = json!([5, "6", null]);
        assert_eq!(ids_from_json(Some(&array)).len(), 2);

        let csv = json!("7, 8");
        assert!(ids_from_json(Some(&csv)).contains("8"));

        assert!(ids_from_json(None).is_empty());
    }
}
