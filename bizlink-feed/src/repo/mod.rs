//! Storage contracts consumed by the engine
//!
//! The feed engine never builds queries itself. It talks to these traits,
//! which a storage backend implements with the filter semantics documented
//! on each type. [`sqlite::SqliteStore`] is the production backend;
//! [`memory::MemoryStore`] keeps everything in process for tests and demos.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::{AudienceTags, ConnectionStatus, ContentItem, ContentKind, TaxonomySet, UserProfile};
use crate::taxonomy::{CategoryNode, IdentityCatalog, SubcategoryNode, SubsubNode};
use bizlink_common::Result;

pub mod memory;
pub mod sqlite;

/// Requested general classification ids (matched against the item's own fields)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralTaxonomy {
    pub category_ids: BTreeSet<String>,
    pub subcategory_ids: BTreeSet<String>,
    pub subsub_ids: BTreeSet<String>,
}

/// Kind-specific narrowing; each field only applies to the kinds that carry it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindFilters {
    /// Jobs
    pub experience_level: Option<String>,
    /// Jobs
    pub job_type: Option<String>,
    /// Events
    pub event_type: Option<String>,
    /// Services
    pub service_type: Option<String>,
    /// Tourism
    pub post_type: Option<String>,
    /// Products, services, events
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

/// Pre-filter pushed down to the content store
///
/// Semantics every backend must honor:
/// - `q`: at least one whitespace-separated term occurs in title or description
/// - `country`: case-insensitive equality; `city`: case-insensitive substring
/// - `owner_id`: exact author; `owner_ids`: author within the set (empty set
///   matches nothing)
/// - `general` / `industry_ids`: the item's own classification field is one of
///   the requested ids, per non-empty dimension
/// - `kind_filters`: see [`KindFilters`]
///
/// Audience criteria are NOT pushed down; they are applied in memory after
/// tag hydration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFilter {
    pub q: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub owner_id: Option<String>,
    pub owner_ids: Option<BTreeSet<String>>,
    pub general: GeneralTaxonomy,
    pub industry_ids: BTreeSet<String>,
    pub kind_filters: KindFilters,
}

impl ContentFilter {
    /// Search terms of two or more characters
    pub fn terms(&self) -> Vec<String> {
        self.q
            .as_deref()
            .map(search_terms)
            .unwrap_or_default()
    }
}

/// Lower-cased whitespace tokens with at least two characters
pub fn search_terms(q: &str) -> Vec<String> {
    q.split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= 2)
        .collect()
}

/// Candidate narrowing for people suggestions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    /// Usually the viewer
    pub exclude_user_id: Option<String>,
    /// Substring of name or headline
    pub q: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    /// Candidate offers at least one of these categories
    pub category_ids: BTreeSet<String>,
    /// Candidate offers at least one of these subcategories
    pub subcategory_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub comments: u64,
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Newest-first page of one kind matching `filter`
    async fn find_by_audience_and_filters(
        &self,
        kind: ContentKind,
        filter: &ContentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContentItem>>;

    /// Audience tag-sets for many items in one pass
    async fn load_audience(&self, item_ids: &[String]) -> Result<HashMap<String, AudienceTags>>;

    /// Owner of an item of the given kind, if it exists
    async fn item_owner(&self, kind: ContentKind, item_id: &str) -> Result<Option<String>>;

    /// Clear then insert the item's audience associations as one unit
    async fn replace_audience(&self, item_id: &str, audience: &TaxonomySet) -> Result<()>;
}

#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    async fn find_categories(&self, ids: &[String]) -> Result<Vec<CategoryNode>>;
    async fn find_subcategories(&self, ids: &[String]) -> Result<Vec<SubcategoryNode>>;
    async fn find_subsubcategories(&self, ids: &[String]) -> Result<Vec<SubsubNode>>;
    async fn load_catalog(&self) -> Result<IdentityCatalog>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn find_candidates(&self, filter: &CandidateFilter, limit: usize) -> Result<Vec<UserProfile>>;
}

#[async_trait]
pub trait SocialRepository: Send + Sync {
    /// Status of every target relative to the viewer; missing targets are `None`
    async fn connection_status_map(
        &self,
        viewer_id: &str,
        target_ids: &[String],
    ) -> Result<HashMap<String, ConnectionStatus>>;

    async fn connected_user_ids(&self, viewer_id: &str) -> Result<BTreeSet<String>>;

    async fn engagement_counts(&self, item_ids: &[String]) -> Result<HashMap<String, EngagementCounts>>;

    async fn liked_item_ids(&self, viewer_id: &str, item_ids: &[String]) -> Result<HashSet<String>>;

    async fn application_statuses(
        &self,
        viewer_id: &str,
        job_ids: &[String],
    ) -> Result<HashMap<String, String>>;

    async fn registration_statuses(
        &self,
        viewer_id: &str,
        event_ids: &[String],
    ) -> Result<HashMap<String, String>>;
}
