//! bizlink-feed library - feed ranking and matching service
//!
//! Aggregates eight content kinds into one ranked, audience-filtered and
//! diversified feed, and suggests people to connect with. Storage sits
//! behind the traits in [`repo`]; results are cached through [`cache`].

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod audience;
pub mod cache;
pub mod feed;
pub mod matcher;
pub mod model;
pub mod pagination;
pub mod params;
pub mod repo;
pub mod scoring;
pub mod suggestions;
pub mod taxonomy;

use bizlink_common::config::ServiceConfig;
use cache::{Cache, CacheStore};
use feed::FeedAssembler;
use repo::{ContentRepository, SocialRepository, TaxonomyRepository, UserRepository};
use suggestions::SuggestionEngine;
use taxonomy::{CatalogHandle, IdentityCatalog, TaxonomyValidator};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<dyn ContentRepository>,
    pub taxonomy: Arc<dyn TaxonomyRepository>,
    pub users: Arc<dyn UserRepository>,
    pub catalog: Arc<CatalogHandle>,
    pub validator: Arc<TaxonomyValidator>,
    pub assembler: Arc<FeedAssembler>,
    pub suggestions: Arc<SuggestionEngine>,
    pub cache: Cache,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Wire every component to one storage backend
    pub fn new<S>(
        store: Arc<S>,
        cache_store: Arc<dyn CacheStore>,
        catalog: IdentityCatalog,
        config: ServiceConfig,
    ) -> Self
    where
        S: ContentRepository + TaxonomyRepository + UserRepository + SocialRepository + 'static,
    {
        let content: Arc<dyn ContentRepository> = store.clone();
        let taxonomy: Arc<dyn TaxonomyRepository> = store.clone();
        let users: Arc<dyn UserRepository> = store.clone();
        let social: Arc<dyn SocialRepository> = store;

        let validator = Arc::new(TaxonomyValidator::new(taxonomy.clone()));
        let assembler = Arc::new(FeedAssembler::new(
            content.clone(),
            social.clone(),
            validator.clone(),
            config.feed.clone(),
        ));
        let suggestions = Arc::new(SuggestionEngine::new(users.clone(), social));

        Self {
            content,
            taxonomy,
            users,
            catalog: Arc::new(CatalogHandle::new(catalog)),
            validator,
            assembler,
            suggestions,
            cache: Cache::new(cache_store),
            config: Arc::new(config),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let api = Router::new()
        .route("/api/feed", get(api::get_feed))
        .route("/api/suggestions", get(api::get_suggestions))
        .route("/api/taxonomy", get(api::get_taxonomy))
        .route("/api/taxonomy/reload", post(api::reload_taxonomy))
        .route("/api/items/:kind/:id/audience", put(api::replace_audience));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
