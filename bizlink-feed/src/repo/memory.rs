//! In-process storage backend
//!
//! Implements every repository contract over plain collections, with the same
//! filter semantics as the SQLite backend. Also exposes call counters and
//! fault injection so tests can observe batching and failure handling.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use super::{
    CandidateFilter, ContentFilter, ContentRepository, EngagementCounts, SocialRepository,
    TaxonomyRepository, UserRepository,
};
use crate::model::{
    AudienceTags, ConnectionStatus, ContentItem, ContentKind, KindDetails, TagRef, TaxonomyLevel,
    TaxonomySet, UserProfile,
};
use crate::taxonomy::{
    CategoryNode, IdentityCatalog, IdentityNode, Membership, SubcategoryNode, SubsubNode,
};
use bizlink_common::{Error, Result};

#[derive(Default)]
struct State {
    items: Vec<ContentItem>,
    audiences: HashMap<String, TaxonomySet>,
    identities: Vec<IdentityNode>,
    categories: Vec<CategoryNode>,
    subcategories: Vec<SubcategoryNode>,
    subsubs: Vec<SubsubNode>,
    memberships: Vec<Membership>,
    users: Vec<UserProfile>,
    connections: HashSet<(String, String)>,
    requests: HashSet<(String, String)>,
    likes: HashSet<(String, String)>,
    comments: HashMap<String, u64>,
    applications: HashMap<(String, String), String>,
    registrations: HashMap<(String, String), String>,
}

/// Call counters for batching assertions
#[derive(Debug, Default)]
pub struct CallCounts {
    pub fetches: AtomicUsize,
    pub completed_fetches: AtomicUsize,
    pub audience_loads: AtomicUsize,
    pub status_lookups: AtomicUsize,
    pub engagement_lookups: AtomicUsize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    failing_kind: RwLock<Option<ContentKind>>,
    slow_kind: RwLock<Option<(ContentKind, Duration)>>,
    pub calls: CallCounts,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two identities over a small tech/agriculture tree
    ///
    /// - identity `I1` owns category `5` (and therefore `50`, `51`, `500`)
    /// - identity `I2` owns subcategory `51` only
    /// - category `42` exists with no identity
    pub fn with_sample_taxonomy() -> Self {
        let store = Self::new();
        store.add_identity("I1", "Founders");
        store.add_identity("I2", "Freelancers");
        store.add_category("5", "Technology");
        store.add_category("6", "Agriculture");
        store.add_category("42", "Design");
        store.add_subcategory("50", "Software", "5");
        store.add_subcategory("51", "Hardware", "5");
        store.add_subcategory("60", "Farming", "6");
        store.add_subsubcategory("500", "Rust", "50");
        store.add_membership("I1", TaxonomyLevel::Category, "5");
        store.add_membership("I2", TaxonomyLevel::Subcategory, "51");
        store
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_identity(&self, id: &str, name: &str) {
        self.write().identities.push(IdentityNode { id: id.into(), name: name.into() });
    }

    pub fn add_category(&self, id: &str, name: &str) {
        self.write().categories.push(CategoryNode { id: id.into(), name: name.into() });
    }

    pub fn add_subcategory(&self, id: &str, name: &str, category_id: &str) {
        self.write().subcategories.push(SubcategoryNode {
            id: id.into(),
            name: name.into(),
            category_id: category_id.into(),
        });
    }

    pub fn add_subsubcategory(&self, id: &str, name: &str, subcategory_id: &str) {
        self.write().subsubs.push(SubsubNode {
            id: id.into(),
            name: name.into(),
            subcategory_id: subcategory_id.into(),
        });
    }

    pub fn add_membership(&self, identity_id: &str, level: TaxonomyLevel, node_id: &str) {
        self.write().memberships.push(Membership {
            identity_id: identity_id.into(),
            level,
            node_id: node_id.into(),
        });
    }

    /// Insert an item; its `audience` field seeds the stored associations
    pub fn add_item(&self, item: ContentItem) {
        let mut state = self.write();
        state.audiences.insert(item.id.clone(), item.audience.to_set());
        let mut stored = item;
        stored.audience = AudienceTags::default();
        state.items.push(stored);
    }

    pub fn add_user(&self, profile: UserProfile) {
        self.write().users.push(profile);
    }

    pub fn connect(&self, a: &str, b: &str) {
        let mut state = self.write();
        state.connections.insert((a.into(), b.into()));
        state.connections.insert((b.into(), a.into()));
    }

    pub fn request_connection(&self, from: &str, to: &str) {
        self.write().requests.insert((from.into(), to.into()));
    }

    pub fn like(&self, item_id: &str, user_id: &str) {
        self.write().likes.insert((item_id.into(), user_id.into()));
    }

    pub fn comment(&self, item_id: &str) {
        *self.write().comments.entry(item_id.into()).or_default() += 1;
    }

    pub fn apply(&self, job_id: &str, user_id: &str, status: &str) {
        self.write()
            .applications
            .insert((job_id.into(), user_id.into()), status.into());
    }

    pub fn register(&self, event_id: &str, user_id: &str, status: &str) {
        self.write()
            .registrations
            .insert((event_id.into(), user_id.into()), status.into());
    }

    /// Make every fetch of `kind` fail
    pub fn fail_kind(&self, kind: ContentKind) {
        *self.failing_kind.write().unwrap_or_else(|p| p.into_inner()) = Some(kind);
    }

    /// Delay every fetch of `kind`
    pub fn slow_kind(&self, kind: ContentKind, delay: Duration) {
        *self.slow_kind.write().unwrap_or_else(|p| p.into_inner()) = Some((kind, delay));
    }

    fn audience_tags(&self, state: &State, set: &TaxonomySet) -> AudienceTags {
        let mut tags = AudienceTags::default();
        for level in TaxonomyLevel::ALL {
            for id in set.ids(level) {
                let name = match level {
                    TaxonomyLevel::Identity => state.identities.iter().find(|n| &n.id == id).map(|n| n.name.clone()),
                    TaxonomyLevel::Category => state.categories.iter().find(|n| &n.id == id).map(|n| n.name.clone()),
                    TaxonomyLevel::Subcategory => state.subcategories.iter().find(|n| &n.id == id).map(|n| n.name.clone()),
                    TaxonomyLevel::Subsubcategory => state.subsubs.iter().find(|n| &n.id == id).map(|n| n.name.clone()),
                };
                tags.tags_mut(level).push(TagRef::new(id.clone(), name.unwrap_or_default()));
            }
        }
        tags
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches_classification(value: &Option<String>, requested: &BTreeSet<String>) -> bool {
    requested.is_empty() || value.as_ref().is_some_and(|v| requested.contains(v))
}

fn price_of(details: &KindDetails) -> Option<f64> {
    match details {
        KindDetails::Product(p) => p.price,
        KindDetails::Service(s) => s.price,
        KindDetails::Event(e) => e.price,
        _ => None,
    }
}

fn matches_filter(item: &ContentItem, filter: &ContentFilter) -> bool {
    let terms = filter.terms();
    if !terms.is_empty() {
        let text = format!("{} {}", item.title, item.description).to_lowercase();
        if !terms.iter().any(|t| text.contains(t)) {
            return false;
        }
    }
    if let Some(country) = &filter.country {
        if !item.country.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(country)) {
            return false;
        }
    }
    if let Some(city) = &filter.city {
        if !item.city.as_deref().is_some_and(|c| contains_ci(c, city)) {
            return false;
        }
    }
    if let Some(owner) = &filter.owner_id {
        if &item.owner_id != owner {
            return false;
        }
    }
    if let Some(owners) = &filter.owner_ids {
        if !owners.contains(&item.owner_id) {
            return false;
        }
    }

    let c = &item.classification;
    if !matches_classification(&c.category_id, &filter.general.category_ids)
        || !matches_classification(&c.subcategory_id, &filter.general.subcategory_ids)
        || !matches_classification(&c.subsubcategory_id, &filter.general.subsub_ids)
        || !matches_classification(&c.industry_category_id, &filter.industry_ids)
    {
        return false;
    }

    let k = &filter.kind_filters;
    let eq = |wanted: &Option<String>, actual: Option<&String>| {
        wanted
            .as_ref()
            .map_or(true, |w| actual.is_some_and(|a| a.eq_ignore_ascii_case(w)))
    };
    let kind_ok = match &item.details {
        KindDetails::Job(job) => {
            eq(&k.experience_level, job.experience_level.as_ref()) && eq(&k.job_type, job.job_type.as_ref())
        }
        KindDetails::Event(event) => eq(&k.event_type, event.event_type.as_ref()),
        KindDetails::Service(service) => eq(&k.service_type, service.service_type.as_ref()),
        KindDetails::Tourism(tourism) => eq(&k.post_type, tourism.post_type.as_ref()),
        _ => true,
    };
    if !kind_ok {
        return false;
    }

    if let Some(price) = price_of(&item.details) {
        if k.price_min.is_some_and(|min| price < min) || k.price_max.is_some_and(|max| price > max) {
            return false;
        }
    }

    true
}

#[async_trait]
impl ContentRepository for MemoryStore {
    async fn find_by_audience_and_filters(
        &self,
        kind: ContentKind,
        filter: &ContentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContentItem>> {
        self.calls.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.slow_kind.read().unwrap_or_else(|p| p.into_inner());
        if let Some((slow, duration)) = delay {
            if slow == kind {
                tokio::time::sleep(duration).await;
            }
        }

        let failing = *self.failing_kind.read().unwrap_or_else(|p| p.into_inner());
        if failing == Some(kind) {
            self.calls.completed_fetches.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Internal(format!("{} store unavailable", kind)));
        }

        let mut found: Vec<ContentItem> = self
            .read()
            .items
            .iter()
            .filter(|item| item.kind == kind && matches_filter(item, filter))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.calls.completed_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn load_audience(&self, item_ids: &[String]) -> Result<HashMap<String, AudienceTags>> {
        self.calls.audience_loads.fetch_add(1, Ordering::SeqCst);
        let state = self.read();
        Ok(item_ids
            .iter()
            .filter_map(|id| {
                state
                    .audiences
                    .get(id)
                    .map(|set| (id.clone(), self.audience_tags(&state, set)))
            })
            .collect())
    }

    async fn item_owner(&self, kind: ContentKind, item_id: &str) -> Result<Option<String>> {
        Ok(self
            .read()
            .items
            .iter()
            .find(|item| item.kind == kind && item.id == item_id)
            .map(|item| item.owner_id.clone()))
    }

    async fn replace_audience(&self, item_id: &str, audience: &TaxonomySet) -> Result<()> {
        // single lock scope: clear and insert are observed together
        let mut state = self.write();
        state.audiences.remove(item_id);
        state.audiences.insert(item_id.to_string(), audience.clone());
        Ok(())
    }
}

#[async_trait]
impl TaxonomyRepository for MemoryStore {
    async fn find_categories(&self, ids: &[String]) -> Result<Vec<CategoryNode>> {
        Ok(self
            .read()
            .categories
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn find_subcategories(&self, ids: &[String]) -> Result<Vec<SubcategoryNode>> {
        Ok(self
            .read()
            .subcategories
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn find_subsubcategories(&self, ids: &[String]) -> Result<Vec<SubsubNode>> {
        Ok(self
            .read()
            .subsubs
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn load_catalog(&self) -> Result<IdentityCatalog> {
        let state = self.read();
        Ok(IdentityCatalog::new(
            state.identities.clone(),
            state.categories.clone(),
            state.subcategories.clone(),
            state.subsubs.clone(),
            state.memberships.clone(),
        ))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.read().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_candidates(&self, filter: &CandidateFilter, limit: usize) -> Result<Vec<UserProfile>> {
        let state = self.read();
        let mut found: Vec<UserProfile> = state
            .users
            .iter()
            .filter(|u| filter.exclude_user_id.as_ref() != Some(&u.id))
            .filter(|u| {
                filter.q.as_deref().map_or(true, |q| {
                    contains_ci(&u.name, q) || u.headline.as_deref().is_some_and(|h| contains_ci(h, q))
                })
            })
            .filter(|u| {
                filter.country.as_deref().map_or(true, |c| {
                    u.country.as_deref().is_some_and(|uc| uc.eq_ignore_ascii_case(c))
                })
            })
            .filter(|u| {
                filter
                    .city
                    .as_deref()
                    .map_or(true, |c| u.city.as_deref().is_some_and(|uc| contains_ci(uc, c)))
            })
            .filter(|u| {
                filter.category_ids.is_empty()
                    || !u.offerings.category_ids.is_disjoint(&filter.category_ids)
            })
            .filter(|u| {
                filter.subcategory_ids.is_empty()
                    || !u.offerings.subcategory_ids.is_disjoint(&filter.subcategory_ids)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        found.truncate(limit);
        Ok(found)
    }
}

#[async_trait]
impl SocialRepository for MemoryStore {
    async fn connection_status_map(
        &self,
        viewer_id: &str,
        target_ids: &[String],
    ) -> Result<HashMap<String, ConnectionStatus>> {
        self.calls.status_lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.read();
        Ok(target_ids
            .iter()
            .map(|target| {
                let key = (viewer_id.to_string(), target.clone());
                let reverse = (target.clone(), viewer_id.to_string());
                let status = if state.connections.contains(&key) {
                    ConnectionStatus::Connected
                } else if state.requests.contains(&key) {
                    ConnectionStatus::PendingOutgoing
                } else if state.requests.contains(&reverse) {
                    ConnectionStatus::PendingIncoming
                } else {
                    ConnectionStatus::None
                };
                (target.clone(), status)
            })
            .collect())
    }

    async fn connected_user_ids(&self, viewer_id: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .read()
            .connections
            .iter()
            .filter(|(a, _)| a == viewer_id)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn engagement_counts(&self, item_ids: &[String]) -> Result<HashMap<String, EngagementCounts>> {
        self.calls.engagement_lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.read();
        Ok(item_ids
            .iter()
            .map(|id| {
                let likes = state.likes.iter().filter(|(item, _)| item == id).count() as u64;
                let comments = state.comments.get(id).copied().unwrap_or(0);
                (id.clone(), EngagementCounts { likes, comments })
            })
            .collect())
    }

    async fn liked_item_ids(&self, viewer_id: &str, item_ids: &[String]) -> Result<HashSet<String>> {
        let state = self.read();
        Ok(item_ids
            .iter()
            .filter(|id| state.likes.contains(&((*id).clone(), viewer_id.to_string())))
            .cloned()
            .collect())
    }

    async fn application_statuses(
        &self,
        viewer_id: &str,
        job_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        let state = self.read();
        Ok(job_ids
            .iter()
            .filter_map(|id| {
                state
                    .applications
                    .get(&(id.clone(), viewer_id.to_string()))
                    .map(|status| (id.clone(), status.clone()))
            })
            .collect())
    }

    async fn registration_statuses(
        &self,
        viewer_id: &str,
        event_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        let state = self.read();
        Ok(event_ids
            .iter()
            .filter_map(|id| {
                state
                    .registrations
                    .get(&(id.clone(), viewer_id.to_string()))
                    .map(|status| (id.clone(), status.clone()))
            })
            .collect())
    }
}
