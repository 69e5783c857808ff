//! Fan-out, rank and page the feed for one request

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error};

use super::decorate::{decorate, Decoration};
use super::query::{FeedQuery, FeedTab};
use super::{diversify, rank_order, FeedItem, FeedResponse};
use crate::audience;
use crate::model::{AudienceCriteria, ContentItem, ContentKind, UserProfile};
use crate::pagination::{buffer_limit, page};
use crate::repo::{ContentFilter, ContentRepository, SocialRepository};
use crate::scoring::{heuristic, HeuristicQuery, MatchScorer};
use crate::taxonomy::{IdentityCatalog, TaxonomyValidator};
use bizlink_common::config::FeedTuning;
use bizlink_common::{Error, Result};

pub struct FeedAssembler {
    content: Arc<dyn ContentRepository>,
    social: Arc<dyn SocialRepository>,
    validator: Arc<TaxonomyValidator>,
    tuning: FeedTuning,
}

impl FeedAssembler {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        social: Arc<dyn SocialRepository>,
        validator: Arc<TaxonomyValidator>,
        tuning: FeedTuning,
    ) -> Self {
        Self {
            content,
            social,
            validator,
            tuning,
        }
    }

    /// Build one page of the feed
    ///
    /// `viewer_id` drives decoration. `viewer` is that viewer's profile when
    /// one exists; it selects personalized scoring and carries the feed settings.
    pub async fn assemble(
        &self,
        query: &FeedQuery,
        viewer_id: Option<&str>,
        viewer: Option<&UserProfile>,
        catalog: Arc<IdentityCatalog>,
    ) -> Result<FeedResponse> {
        let criteria = self.validated_criteria(&query.audience).await;

        let owner_ids = match viewer {
            Some(profile) if profile.settings.connections_only => {
                Some(self.social.connected_user_ids(&profile.id).await?)
            }
            _ => None,
        };
        let filter = query.content_filter(owner_ids);

        let preferred = viewer
            .map(|profile| profile.settings.content_types.clone())
            .unwrap_or_default();
        let kinds = query.kinds(&preferred);
        let per_kind = buffer_limit(query.offset, query.limit, self.tuning.buffer_factor);

        let fetched = self.fan_out(&kinds, &filter, &criteria, per_kind).await?;

        let heuristic_query = HeuristicQuery {
            audience: criteria,
            ..query.heuristic()
        };
        let scorer = match viewer {
            Some(profile) => MatchScorer::Personalized {
                viewer: profile.clone(),
                catalog,
            },
            None => MatchScorer::Anonymous(heuristic_query.clone()),
        };
        let mut ranked = normalize(fetched, &scorer, &heuristic_query);
        ranked.sort_by(rank_order);

        let ordered = if query.tab == FeedTab::All {
            diversify(ranked, self.tuning.max_seq, |entry: &FeedItem| entry.item.kind)
        } else {
            ranked
        };

        let mut items = page(ordered, query.offset, query.limit);
        decorate(self.social.as_ref(), viewer_id, &mut items).await?;

        debug!(
            tab = query.tab.as_str(),
            kinds = kinds.len(),
            returned = items.len(),
            personalized = scorer.is_personalized(),
            "Feed assembled"
        );
        Ok(FeedResponse { items })
    }

    /// Read-path validation of taxonomy criteria; identity ids pass through
    async fn validated_criteria(&self, requested: &AudienceCriteria) -> AudienceCriteria {
        if requested.category_ids.is_empty()
            && requested.subcategory_ids.is_empty()
            && requested.subsub_ids.is_empty()
        {
            return requested.clone();
        }
        let validated = self
            .validator
            .validate_or_empty(
                &requested.category_ids,
                &requested.subcategory_ids,
                &requested.subsub_ids,
            )
            .await;
        AudienceCriteria {
            identity_ids: requested.identity_ids.clone(),
            category_ids: validated.category_ids,
            subcategory_ids: validated.subcategory_ids,
            subsub_ids: validated.subsub_ids,
        }
    }

    /// Fetch every kind concurrently; all branches finish before any error is reported
    async fn fan_out(
        &self,
        kinds: &[ContentKind],
        filter: &ContentFilter,
        criteria: &AudienceCriteria,
        per_kind: usize,
    ) -> Result<Vec<ContentItem>> {
        let branches = kinds
            .iter()
            .map(|kind| self.fetch_kind(*kind, filter, criteria, per_kind));
        let results = join_all(branches).await;

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        for (kind, result) in kinds.iter().zip(results) {
            match result {
                Ok(items) => merged.extend(items),
                Err(e) => {
                    error!(kind = %kind, error = %e, "Feed fetch failed");
                    failures.push(format!("{}: {}", kind, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::Internal(format!(
                "Feed fan-out failed for {}",
                failures.join("; ")
            )));
        }
        Ok(merged)
    }

    async fn fetch_kind(
        &self,
        kind: ContentKind,
        filter: &ContentFilter,
        criteria: &AudienceCriteria,
        per_kind: usize,
    ) -> Result<Vec<ContentItem>> {
        let mut items = self
            .content
            .find_by_audience_and_filters(kind, filter, per_kind, 0)
            .await?;
        if items.is_empty() {
            return Ok(items);
        }

        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let audiences = self.content.load_audience(&ids).await?;
        audience::hydrate(&mut items, audiences);

        let fetched = items.len();
        audience::retain_matching(&mut items, criteria);
        debug!(kind = %kind, fetched, kept = items.len(), "Kind fetched and filtered");
        Ok(items)
    }
}

/// Score every item and flag text matches
fn normalize(
    items: Vec<ContentItem>,
    scorer: &MatchScorer,
    heuristic_query: &HeuristicQuery,
) -> Vec<FeedItem> {
    let now = Utc::now();
    let q = heuristic_query.q.as_deref();

    items
        .into_iter()
        .map(|item| {
            let match_percentage = scorer.score(&item, now);
            let score = heuristic::score(&item, heuristic_query, now);
            let text_match = q.map(|q| heuristic::text_matches(&item, q));
            FeedItem {
                item,
                match_percentage,
                score,
                text_match,
                decoration: Decoration::default(),
            }
        })
        .collect()
}
