//! People suggestions
//!
//! Known viewers are matched against candidates with [`ConnectionMatcher`];
//! anonymous requests rank candidates by how many of the requested
//! categories they offer. `nearby` lists candidates in the same place who did
//! not already make it into `matches`.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::matcher::{ConnectionMatcher, MatchFormula};
use crate::model::{ConnectionStatus, UserProfile};
use crate::params::QueryParams;
use crate::repo::{CandidateFilter, SocialRepository, UserRepository};
use crate::taxonomy::IdentityCatalog;
use bizlink_common::config::MatchingDefaults;
use bizlink_common::Result;

/// Candidates considered per requested suggestion
const CANDIDATE_POOL_FACTOR: usize = 5;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsQuery {
    pub q: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub category_ids: BTreeSet<String>,
    pub subcategory_ids: BTreeSet<String>,
    pub bidirectional_match: bool,
    pub bidirectional_match_formula: MatchFormula,
    pub limit: usize,
}

impl SuggestionsQuery {
    pub fn from_params(params: &QueryParams, defaults: &MatchingDefaults) -> Self {
        let default_formula = defaults.formula.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Configured match formula invalid, using reciprocal");
            MatchFormula::default()
        });
        let formula = match params.text("bidirectionalMatchFormula") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(formula = %raw, "Unknown match formula requested");
                default_formula
            }),
            None => default_formula,
        };

        Self {
            q: params.text("q"),
            country: params.text("country"),
            city: params.text("city"),
            category_ids: params.ids(&["categoryId", "cats"]),
            subcategory_ids: params.ids(&["subcategoryId"]),
            bidirectional_match: params
                .flag("bidirectionalMatch")
                .unwrap_or(defaults.bidirectional),
            bidirectional_match_formula: formula,
            limit: params
                .number::<usize>("limit")
                .unwrap_or(defaults.suggestions_limit)
                .clamp(1, MAX_LIMIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    pub id: String,
    pub name: String,
    pub headline: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub match_percentage: u8,
    pub connection_status: ConnectionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingConfig {
    pub bidirectional_match: bool,
    pub bidirectional_match_formula: MatchFormula,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsResponse {
    pub matches_count: usize,
    pub nearby_count: usize,
    pub matches: Vec<UserCard>,
    pub nearby: Vec<UserCard>,
    pub matching_config: MatchingConfig,
}

pub struct SuggestionEngine {
    users: Arc<dyn UserRepository>,
    social: Arc<dyn SocialRepository>,
}

fn same_place(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) => !a.is_empty() && a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Share of requested categories/subcategories the candidate offers
fn requested_overlap(query: &SuggestionsQuery, candidate: &UserProfile) -> u8 {
    let requested = query.category_ids.len() + query.subcategory_ids.len();
    if requested == 0 {
        return 0;
    }
    let matched = query
        .category_ids
        .iter()
        .filter(|id| candidate.offerings.category_ids.contains(*id))
        .count()
        + query
            .subcategory_ids
            .iter()
            .filter(|id| candidate.offerings.subcategory_ids.contains(*id))
            .count();
    (100.0 * matched as f64 / requested as f64).round() as u8
}

impl SuggestionEngine {
    pub fn new(users: Arc<dyn UserRepository>, social: Arc<dyn SocialRepository>) -> Self {
        Self { users, social }
    }

    pub async fn suggest(
        &self,
        query: &SuggestionsQuery,
        viewer: Option<&UserProfile>,
        catalog: Arc<IdentityCatalog>,
    ) -> Result<SuggestionsResponse> {
        let filter = CandidateFilter {
            exclude_user_id: viewer.map(|v| v.id.clone()),
            q: query.q.clone(),
            country: query.country.clone(),
            city: query.city.clone(),
            category_ids: query.category_ids.clone(),
            subcategory_ids: query.subcategory_ids.clone(),
        };
        let pool = query.limit.saturating_mul(CANDIDATE_POOL_FACTOR);
        let candidates = self.users.find_candidates(&filter, pool).await?;

        let scored: Vec<(u8, &UserProfile)> = match viewer {
            Some(viewer) => {
                let matcher = ConnectionMatcher::new(catalog);
                candidates
                    .iter()
                    .map(|c| {
                        let score = matcher.score(
                            viewer,
                            c,
                            query.bidirectional_match,
                            query.bidirectional_match_formula,
                        );
                        (score, c)
                    })
                    .collect()
            }
            None => candidates
                .iter()
                .map(|c| (requested_overlap(query, c), c))
                .collect(),
        };

        let mut matches: Vec<(u8, &UserProfile)> =
            scored.iter().copied().filter(|(score, _)| *score > 0).collect();
        matches.sort_by_key(|(score, c)| (Reverse(*score), c.name.to_lowercase(), c.id.clone()));
        matches.truncate(query.limit);

        let matched_ids: HashSet<&str> = matches.iter().map(|(_, c)| c.id.as_str()).collect();
        let (here_city, here_country) = match viewer {
            Some(v) => (v.city.as_deref(), v.country.as_deref()),
            None => (query.city.as_deref(), query.country.as_deref()),
        };
        let mut nearby: Vec<(u8, &UserProfile)> = scored
            .iter()
            .copied()
            .filter(|(_, c)| !matched_ids.contains(c.id.as_str()))
            .filter(|(_, c)| {
                same_place(here_city, c.city.as_deref())
                    || (here_city.is_none() && same_place(here_country, c.country.as_deref()))
            })
            .collect();
        nearby.sort_by_key(|(score, c)| (Reverse(*score), c.name.to_lowercase(), c.id.clone()));
        nearby.truncate(query.limit);

        let statuses = match viewer {
            Some(viewer) => {
                let ids: Vec<String> = matches
                    .iter()
                    .chain(nearby.iter())
                    .map(|(_, c)| c.id.clone())
                    .collect();
                Some(self.social.connection_status_map(&viewer.id, &ids).await?)
            }
            None => None,
        };
        let card = |(score, c): &(u8, &UserProfile)| UserCard {
            id: c.id.clone(),
            name: c.name.clone(),
            headline: c.headline.clone(),
            city: c.city.clone(),
            country: c.country.clone(),
            match_percentage: *score,
            connection_status: match &statuses {
                Some(map) => map.get(&c.id).copied().unwrap_or(ConnectionStatus::None),
                None => ConnectionStatus::Unauthenticated,
            },
        };

        let matches: Vec<UserCard> = matches.iter().map(card).collect();
        let nearby: Vec<UserCard> = nearby.iter().map(card).collect();

        debug!(
            candidates = candidates.len(),
            matches = matches.len(),
            nearby = nearby.len(),
            "Suggestions computed"
        );

        Ok(SuggestionsResponse {
            matches_count: matches.len(),
            nearby_count: nearby.len(),
            matches,
            nearby,
            matching_config: MatchingConfig {
                bidirectional_match: query.bidirectional_match,
                bidirectional_match_formula: query.bidirectional_match_formula,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaxonomySet;
    use crate::repo::memory::MemoryStore;
    use crate::taxonomy::catalog::tests::sample_catalog;

    fn user(id: &str, name: &str, city: &str, offers: &[&str], wants: &[&str]) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            name: name.to_string(),
            city: Some(city.to_string()),
            offerings: TaxonomySet {
                identity_ids: ["I1".to_string()].into(),
                category_ids: offers.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            interests: TaxonomySet {
                category_ids: wants.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn query(limit: usize) -> SuggestionsQuery {
        SuggestionsQuery::from_params(
            &QueryParams::from_pairs(vec![("limit".into(), limit.to_string())]),
            &MatchingDefaults::default(),
        )
    }

    fn engine(store: Arc<MemoryStore>) -> SuggestionEngine {
        SuggestionEngine::new(store.clone(), store)
    }

    #[tokio::test]
    async fn test_authenticated_matches_ranked() {
        let store = Arc::new(MemoryStore::new());
        let viewer = user("v", "Viewer", "Nairobi", &[], &["5"]);
        store.add_user(viewer.clone());
        store.add_user(user("a", "Amina", "Mombasa", &["5"], &[]));
        store.add_user(user("b", "Brian", "Nairobi", &["6"], &[]));
        store.connect("v", "a");

        let response = engine(store)
            .suggest(&query(10), Some(&viewer), Arc::new(sample_catalog()))
            .await
            .unwrap();

        let scores: Vec<(&str, u8)> = response
            .matches
            .iter()
            .map(|c| (c.id.as_str(), c.match_percentage))
            .collect();
        // a: forward 100, reverse 0. b: forward 6/31, reverse city-only 100
        assert_eq!(scores, vec![("a", 70), ("b", 43)]);
        assert_eq!(response.matches[0].connection_status, ConnectionStatus::Connected);
        assert_eq!(response.matches[1].connection_status, ConnectionStatus::None);
        // co-located b is already a match
        assert_eq!(response.nearby_count, 0);
        assert_eq!(
            response.matching_config.bidirectional_match_formula,
            MatchFormula::Reciprocal
        );
    }

    #[tokio::test]
    async fn test_anonymous_nearby_by_requested_city() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(user("a", "Amina", "Mombasa", &["5"], &[]));
        store.add_user(user("b", "Brian", "Nairobi", &["6"], &[]));

        let params = QueryParams::from_pairs(vec![("city".into(), "nairobi".into())]);
        let query = SuggestionsQuery::from_params(&params, &MatchingDefaults::default());
        let response = engine(store)
            .suggest(&query, None, Arc::new(sample_catalog()))
            .await
            .unwrap();

        assert_eq!(response.matches_count, 0);
        assert_eq!(response.nearby_count, 1);
        assert_eq!(response.nearby[0].id, "b");
    }

    #[tokio::test]
    async fn test_anonymous_scores_requested_categories() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(user("a", "Amina", "Mombasa", &["5", "6"], &[]));
        store.add_user(user("b", "Brian", "Nairobi", &["5"], &[]));

        let params = QueryParams::from_pairs(vec![("cats".into(), "5,6".into())]);
        let query = SuggestionsQuery::from_params(&params, &MatchingDefaults::default());
        let response = engine(store)
            .suggest(&query, None, Arc::new(sample_catalog()))
            .await
            .unwrap();

        let scores: Vec<(String, u8)> = response
            .matches
            .iter()
            .map(|c| (c.id.clone(), c.match_percentage))
            .collect();
        assert_eq!(scores, vec![("a".to_string(), 100), ("b".to_string(), 50)]);
        assert!(response
            .matches
            .iter()
            .all(|c| c.connection_status == ConnectionStatus::Unauthenticated));
    }

    #[test]
    fn test_query_defaults_and_overrides() {
        let q = query(500);
        assert_eq!(q.limit, 100);
        assert!(q.bidirectional_match);

        let params = QueryParams::from_pairs(vec![
            ("bidirectionalMatch".into(), "false".into()),
            ("bidirectionalMatchFormula".into(), "simple".into()),
        ]);
        let q = SuggestionsQuery::from_params(&params, &MatchingDefaults::default());
        assert!(!q.bidirectional_match);
        assert_eq!(q.bidirectional_match_formula, MatchFormula::Simple);
        assert_eq!(q.limit, 20);
    }
}
