//! Feed assembly over the in-process store
//!
//! Tests cover:
//! - Fan-out failure handling (every branch completes, no partial feed)
//! - Slow kinds still contribute
//! - Per-page batching of decoration lookups
//! - Kind diversification on the all tab
//! - Connections-only feeds
//! - Response caching through the HTTP layer

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

use bizlink_common::config::{FeedTuning, ServiceConfig};
use bizlink_feed::cache::memory::MemoryCache;
use bizlink_feed::feed::{FeedAssembler, FeedQuery, FeedTab};
use bizlink_feed::model::{
    AudienceTags, Classification, ContentItem, ContentKind, FeedSettings, KindDetails, TagRef,
    UserProfile,
};
use bizlink_feed::repo::memory::MemoryStore;
use bizlink_feed::repo::TaxonomyRepository;
use bizlink_feed::taxonomy::{IdentityCatalog, TaxonomyValidator};
use bizlink_feed::{build_router, AppState};

/// Test helper: item of `kind` owned by `owner`, `days_old` days old
fn item(kind: ContentKind, id: &str, owner: &str, days_old: i64) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        kind,
        title: format!("{} {}", kind, id),
        description: String::new(),
        created_at: Utc::now() - Duration::days(days_old),
        owner_id: owner.to_string(),
        city: None,
        country: None,
        audience: AudienceTags::default(),
        classification: Classification::default(),
        details: KindDetails::empty(kind),
    }
}

fn assembler(store: &Arc<MemoryStore>) -> FeedAssembler {
    FeedAssembler::new(
        store.clone(),
        store.clone(),
        Arc::new(TaxonomyValidator::new(store.clone())),
        FeedTuning::default(),
    )
}

fn all_tab(limit: usize) -> FeedQuery {
    FeedQuery {
        tab: FeedTab::All,
        limit,
        ..Default::default()
    }
}

fn ids(response: &bizlink_feed::feed::FeedResponse) -> Vec<String> {
    response.items.iter().map(|entry| entry.item.id.clone()).collect()
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn test_failing_kind_fails_whole_feed_after_all_branches_finish() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Job, "j1", "alice", 30));
    store.add_item(item(ContentKind::Event, "e1", "bob", 30));
    store.fail_kind(ContentKind::Event);
    store.slow_kind(ContentKind::Moment, std::time::Duration::from_millis(50));

    let result = assembler(&store)
        .assemble(&all_tab(10), None, None, Arc::new(IdentityCatalog::empty()))
        .await;

    assert!(result.is_err(), "A failed kind must not yield a partial feed");
    assert_eq!(store.calls.fetches.load(Ordering::SeqCst), ContentKind::ALL.len());
    assert_eq!(
        store.calls.completed_fetches.load(Ordering::SeqCst),
        ContentKind::ALL.len()
    );
    assert_eq!(store.calls.engagement_lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_slow_kind_still_contributes() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Job, "j1", "alice", 30));
    store.add_item(item(ContentKind::Event, "e1", "bob", 31));
    store.slow_kind(ContentKind::Job, std::time::Duration::from_millis(50));

    let response = assembler(&store)
        .assemble(&all_tab(10), None, None, Arc::new(IdentityCatalog::empty()))
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["j1", "e1"]);
}

// =============================================================================
// Decoration batching
// =============================================================================

#[tokio::test]
async fn test_decoration_is_one_lookup_per_page() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    for n in 0..6 {
        store.add_item(item(ContentKind::Job, &format!("j{}", n), &format!("owner{}", n), 30 + n));
    }
    store.connect("viewer", "owner0");
    store.request_connection("viewer", "owner1");
    store.request_connection("owner2", "viewer");
    store.like("j0", "viewer");
    store.comment("j0");
    store.apply("j3", "viewer", "submitted");

    let query = FeedQuery {
        tab: FeedTab::Kind(ContentKind::Job),
        limit: 10,
        ..Default::default()
    };
    let response = assembler(&store)
        .assemble(&query, Some("viewer"), None, Arc::new(IdentityCatalog::empty()))
        .await
        .unwrap();

    assert_eq!(response.items.len(), 6);
    assert_eq!(store.calls.status_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(store.calls.engagement_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(store.calls.audience_loads.load(Ordering::SeqCst), 1);

    let json = serde_json::to_value(&response).unwrap();
    let by_id = |id: &str| {
        json["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["id"] == id)
            .cloned()
            .unwrap()
    };
    assert_eq!(by_id("j0")["connectionStatus"], "connected");
    assert_eq!(by_id("j0")["liked"], true);
    assert_eq!(by_id("j0")["likes"], 1);
    assert_eq!(by_id("j0")["comments"], 1);
    assert_eq!(by_id("j1")["connectionStatus"], "pending_outgoing");
    assert_eq!(by_id("j2")["connectionStatus"], "pending_incoming");
    assert_eq!(by_id("j3")["applicationStatus"], "submitted");
    assert_eq!(by_id("j4")["connectionStatus"], "none");
}

#[tokio::test]
async fn test_anonymous_viewer_is_unauthenticated() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Need, "n1", "alice", 30));

    let response = assembler(&store)
        .assemble(&all_tab(10), None, None, Arc::new(IdentityCatalog::empty()))
        .await
        .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["items"][0]["connectionStatus"], "unauthenticated");
    assert_eq!(json["items"][0]["liked"], false);
    assert_eq!(store.calls.status_lookups.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_all_tab_is_diversified() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Job, "j1", "alice", 30));
    store.add_item(item(ContentKind::Job, "j2", "alice", 31));
    store.add_item(item(ContentKind::Job, "j3", "alice", 32));
    store.add_item(item(ContentKind::Event, "e1", "bob", 40));

    let response = assembler(&store)
        .assemble(&all_tab(10), None, None, Arc::new(IdentityCatalog::empty()))
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["j1", "e1", "j2", "j3"]);
}

#[tokio::test]
async fn test_offset_pages_the_merged_list() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    for n in 0..5 {
        store.add_item(item(ContentKind::Job, &format!("j{}", n), "alice", 30 + n));
    }

    let query = FeedQuery {
        tab: FeedTab::Kind(ContentKind::Job),
        limit: 2,
        offset: 2,
        ..Default::default()
    };
    let response = assembler(&store)
        .assemble(&query, None, None, Arc::new(IdentityCatalog::empty()))
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["j2", "j3"]);
}

#[tokio::test]
async fn test_personalized_viewer_ranks_matching_audience_first() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    let mut tagged = item(ContentKind::Job, "tagged", "alice", 40);
    tagged.audience.audience_identities = vec![TagRef::new("I1", "Founders")];
    tagged.audience.audience_categories = vec![TagRef::new("5", "Technology")];
    store.add_item(tagged);
    store.add_item(item(ContentKind::Job, "plain", "alice", 30));

    let mut viewer = UserProfile {
        id: "viewer".to_string(),
        name: "Viewer".to_string(),
        ..Default::default()
    };
    viewer.interests.category_ids.insert("5".to_string());
    store.add_user(viewer.clone());
    let catalog = Arc::new(store.load_catalog().await.unwrap());

    let query = FeedQuery {
        tab: FeedTab::Kind(ContentKind::Job),
        limit: 10,
        ..Default::default()
    };
    let response = assembler(&store)
        .assemble(&query, Some("viewer"), Some(&viewer), catalog)
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["tagged", "plain"]);
    assert_eq!(response.items[0].match_percentage, 100.0);
    assert_eq!(response.items[1].match_percentage, 0.0);
}

// =============================================================================
// Viewer settings
// =============================================================================

#[tokio::test]
async fn test_connections_only_restricts_owners() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Job, "from-alice", "alice", 30));
    store.add_item(item(ContentKind::Job, "from-bob", "bob", 30));
    store.connect("viewer", "alice");

    let viewer = UserProfile {
        id: "viewer".to_string(),
        name: "Viewer".to_string(),
        settings: FeedSettings {
            connections_only: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let response = assembler(&store)
        .assemble(&all_tab(10), Some("viewer"), Some(&viewer), Arc::new(IdentityCatalog::empty()))
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["from-alice"]);
}

#[tokio::test]
async fn test_content_type_preference_limits_kinds() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Job, "j1", "alice", 30));
    store.add_item(item(ContentKind::Product, "p1", "alice", 30));

    let mut viewer = UserProfile {
        id: "viewer".to_string(),
        name: "Viewer".to_string(),
        ..Default::default()
    };
    viewer.settings.content_types.insert(ContentKind::Product);

    let response = assembler(&store)
        .assemble(&all_tab(10), Some("viewer"), Some(&viewer), Arc::new(IdentityCatalog::empty()))
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["p1"]);
    assert_eq!(store.calls.fetches.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Caching through the router
// =============================================================================

#[tokio::test]
async fn test_repeated_request_is_served_from_cache() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Job, "j1", "alice", 30));
    let catalog = store.load_catalog().await.unwrap();

    let state = AppState::new(
        store.clone(),
        Arc::new(MemoryCache::new()),
        catalog,
        ServiceConfig::default(),
    );
    let app = build_router(state);

    let request = || {
        Request::builder()
            .uri("/api/feed?tab=jobs")
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let fetches_after_first = store.calls.fetches.load(Ordering::SeqCst);
    assert_eq!(fetches_after_first, 1);

    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(store.calls.fetches.load(Ordering::SeqCst), fetches_after_first);

    let bytes = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["items"][0]["id"], "j1");
}

#[tokio::test]
async fn test_unavailable_cache_still_serves_feed() {
    let store = Arc::new(MemoryStore::with_sample_taxonomy());
    store.add_item(item(ContentKind::Job, "j1", "alice", 30));
    let cache = Arc::new(MemoryCache::new());
    cache.set_unavailable(true);

    let state = AppState::new(store.clone(), cache, IdentityCatalog::empty(), ServiceConfig::default());
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/api/feed").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
