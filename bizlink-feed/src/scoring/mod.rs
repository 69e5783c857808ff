//! Match scoring
//!
//! Two modes, picked by whether the viewer is known:
//! - [`heuristic`]: additive relevance against request filters (anonymous)
//! - [`personalized`]: ratio of possible score against the viewer's interests

pub mod heuristic;
pub mod personalized;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::model::{ContentItem, UserProfile};
use crate::taxonomy::IdentityCatalog;
pub use heuristic::HeuristicQuery;
pub use personalized::{directional_score, Locale};

/// Per-request scorer
pub enum MatchScorer {
    Anonymous(HeuristicQuery),
    Personalized {
        viewer: UserProfile,
        catalog: Arc<IdentityCatalog>,
    },
}

impl MatchScorer {
    pub fn score(&self, item: &ContentItem, now: DateTime<Utc>) -> f64 {
        match self {
            MatchScorer::Anonymous(query) => heuristic::score(item, query, now),
            MatchScorer::Personalized { viewer, catalog } => directional_score(
                &viewer.interests,
                &item.audience.to_set(),
                Locale::new(viewer.city.as_deref(), viewer.country.as_deref()),
                Locale::new(item.city.as_deref(), item.country.as_deref()),
                catalog,
            ),
        }
    }

    pub fn is_personalized(&self) -> bool {
        matches!(self, MatchScorer::Personalized { .. })
    }
}
