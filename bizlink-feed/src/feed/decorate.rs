//! Viewer-relative decorations for the final page
//!
//! Every lookup is one batched call keyed by owner id or item id, issued
//! once per page regardless of its size.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::FeedItem;
use crate::model::{ConnectionStatus, ContentKind};
use crate::repo::SocialRepository;
use bizlink_common::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoration {
    /// Viewer's relationship to the item owner
    pub connection_status: Option<ConnectionStatus>,
    pub likes: u64,
    pub comments: u64,
    pub liked: bool,
    /// Jobs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_status: Option<String>,
    /// Events only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_status: Option<String>,
}

fn ids_of_kind(items: &[FeedItem], kind: ContentKind) -> Vec<String> {
    items
        .iter()
        .filter(|entry| entry.item.kind == kind)
        .map(|entry| entry.item.id.clone())
        .collect()
}

pub async fn decorate(
    social: &dyn SocialRepository,
    viewer_id: Option<&str>,
    items: &mut [FeedItem],
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let item_ids: Vec<String> = items.iter().map(|entry| entry.item.id.clone()).collect();
    let owner_ids: Vec<String> = items
        .iter()
        .map(|entry| entry.item.owner_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let counts = social.engagement_counts(&item_ids).await?;

    let Some(viewer_id) = viewer_id else {
        for entry in items.iter_mut() {
            let c = counts.get(&entry.item.id).copied().unwrap_or_default();
            entry.decoration = Decoration {
                connection_status: Some(ConnectionStatus::Unauthenticated),
                likes: c.likes,
                comments: c.comments,
                ..Default::default()
            };
        }
        return Ok(());
    };

    let job_ids = ids_of_kind(items, ContentKind::Job);
    let event_ids = ids_of_kind(items, ContentKind::Event);

    let (statuses, liked, applications, registrations) = tokio::try_join!(
        social.connection_status_map(viewer_id, &owner_ids),
        social.liked_item_ids(viewer_id, &item_ids),
        social.application_statuses(viewer_id, &job_ids),
        social.registration_statuses(viewer_id, &event_ids),
    )?;

    for entry in items.iter_mut() {
        let id = &entry.item.id;
        let c = counts.get(id).copied().unwrap_or_default();
        entry.decoration = Decoration {
            connection_status: Some(
                statuses
                    .get(&entry.item.owner_id)
                    .copied()
                    .unwrap_or(ConnectionStatus::None),
            ),
            likes: c.likes,
            comments: c.comments,
            liked: liked.contains(id),
            application_status: applications.get(id).cloned(),
            registration_status: registrations.get(id).cloned(),
        };
    }

    Ok(())
}
