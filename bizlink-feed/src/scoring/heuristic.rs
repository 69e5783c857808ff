//! Anonymous relevance scoring
//!
//! Additive: every factor is computed independently, summed, then clamped to
//! `[0, 100]` and rounded. There is no normalization denominator, so the
//! result is not on the same scale as [`super::personalized`].

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

use crate::model::{AudienceCriteria, ContentItem, TaxonomyLevel};
use crate::repo::{search_terms, GeneralTaxonomy};

const CATEGORY_WEIGHT: f64 = 25.0;
const SUBCATEGORY_WEIGHT: f64 = 25.0;
const SUBSUB_WEIGHT: f64 = 20.0;

const TITLE_PHRASE: f64 = 60.0;
const DESCRIPTION_PHRASE: f64 = 50.0;
const TERM_IN_TITLE: f64 = 8.0;
const TERM_IN_DESCRIPTION: f64 = 5.0;
const TERM_IN_COMPANY: f64 = 6.0;
const TEXT_CAP: f64 = 80.0;

const LOCATION_BUDGET: f64 = 20.0;
const CITY_SHARE: f64 = 0.4;
const COUNTRY_SHARE: f64 = 0.6;

const EXPERIENCE_MATCH: f64 = 10.0;

const GENERAL_CATEGORY: f64 = 25.0;
const GENERAL_SUBCATEGORY: f64 = 30.0;
const GENERAL_SUBSUB: f64 = 20.0;
const INDUSTRY: f64 = 35.0;

/// Request signals used to rank items for an anonymous viewer
#[derive(Debug, Clone, Default)]
pub struct HeuristicQuery {
    pub audience: AudienceCriteria,
    pub q: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub experience_level: Option<String>,
    pub general: GeneralTaxonomy,
    pub industry_ids: BTreeSet<String>,
}

/// Final heuristic score in `[0, 100]`
pub fn score(item: &ContentItem, query: &HeuristicQuery, now: DateTime<Utc>) -> f64 {
    let sum = audience_overlap(item, query)
        + text_relevance(item, query.q.as_deref())
        + recency(item.created_at, now)
        + location(item, query)
        + experience(item, query)
        + direct_classification(item, query);
    sum.clamp(0.0, 100.0).round()
}

/// Requested audience categories/subcategories/subsubcategories found on the item
pub fn audience_overlap(item: &ContentItem, query: &HeuristicQuery) -> f64 {
    [
        (TaxonomyLevel::Category, CATEGORY_WEIGHT),
        (TaxonomyLevel::Subcategory, SUBCATEGORY_WEIGHT),
        (TaxonomyLevel::Subsubcategory, SUBSUB_WEIGHT),
    ]
    .into_iter()
    .map(|(level, weight)| {
        let requested = query.audience.ids(level);
        if requested.is_empty() {
            return 0.0;
        }
        let matched = item
            .audience
            .tags(level)
            .iter()
            .filter(|tag| requested.contains(&tag.id))
            .count();
        weight * (matched as f64 / requested.len() as f64).min(1.0)
    })
    .sum()
}

/// Phrase, coverage and per-term boosts, capped
pub fn text_relevance(item: &ContentItem, q: Option<&str>) -> f64 {
    let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) else {
        return 0.0;
    };
    let phrase = q.to_lowercase();
    let title = item.title.to_lowercase();
    let description = item.description.to_lowercase();
    let company = item.details.company_name().map(str::to_lowercase);

    let mut total = if title.contains(&phrase) {
        TITLE_PHRASE
    } else if description.contains(&phrase) {
        DESCRIPTION_PHRASE
    } else {
        0.0
    };

    let terms = search_terms(q);
    if !terms.is_empty() {
        let matched = terms
            .iter()
            .filter(|term| title.contains(term.as_str()) || description.contains(term.as_str()))
            .count();
        if matched > 0 {
            total += coverage_band(matched as f64 / terms.len() as f64);
        }

        for term in &terms {
            if title.contains(term.as_str()) {
                total += TERM_IN_TITLE;
            }
            if description.contains(term.as_str()) {
                total += TERM_IN_DESCRIPTION;
            }
            if company.as_deref().is_some_and(|c| c.contains(term.as_str())) {
                total += TERM_IN_COMPANY;
            }
        }
    }

    total.min(TEXT_CAP)
}

fn coverage_band(coverage: f64) -> f64 {
    if coverage >= 0.8 {
        45.0
    } else if coverage >= 0.6 {
        35.0
    } else if coverage >= 0.4 {
        25.0
    } else {
        15.0
    }
}

/// Whether any query term (or the whole phrase) occurs in title or description
pub fn text_matches(item: &ContentItem, q: &str) -> bool {
    let title = item.title.to_lowercase();
    let description = item.description.to_lowercase();
    let phrase = q.trim().to_lowercase();
    if !phrase.is_empty() && (title.contains(&phrase) || description.contains(&phrase)) {
        return true;
    }
    search_terms(q)
        .iter()
        .any(|term| title.contains(term.as_str()) || description.contains(term.as_str()))
}

fn recency(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now - created_at;
    if age <= Duration::days(1) {
        8.0
    } else if age <= Duration::days(7) {
        4.0
    } else {
        0.0
    }
}

fn location(item: &ContentItem, query: &HeuristicQuery) -> f64 {
    let mut total = 0.0;

    if let (Some(wanted), Some(actual)) = (query.city.as_deref(), item.city.as_deref()) {
        let wanted = wanted.trim().to_lowercase();
        let actual = actual.trim().to_lowercase();
        if !wanted.is_empty() && !actual.is_empty() && (actual.contains(&wanted) || wanted.contains(&actual)) {
            total += LOCATION_BUDGET * CITY_SHARE;
        }
    }

    if let (Some(wanted), Some(actual)) = (query.country.as_deref(), item.country.as_deref()) {
        if wanted.trim().eq_ignore_ascii_case(actual.trim()) {
            total += LOCATION_BUDGET * COUNTRY_SHARE;
        }
    }

    total
}

fn experience(item: &ContentItem, query: &HeuristicQuery) -> f64 {
    match (query.experience_level.as_deref(), item.details.experience_level()) {
        (Some(wanted), Some(actual)) if wanted.eq_ignore_ascii_case(actual) => EXPERIENCE_MATCH,
        _ => 0.0,
    }
}

fn direct_classification(item: &ContentItem, query: &HeuristicQuery) -> f64 {
    let hit = |field: &Option<String>, ids: &BTreeSet<String>, points: f64| match field {
        Some(id) if ids.contains(id) => points,
        _ => 0.0,
    };
    let c = &item.classification;
    hit(&c.category_id, &query.general.category_ids, GENERAL_CATEGORY)
        + hit(&c.subcategory_id, &query.general.subcategory_ids, GENERAL_SUBCATEGORY)
        + hit(&c.subsubcategory_id, &query.general.subsub_ids, GENERAL_SUBSUB)
        + hit(&c.industry_category_id, &query.industry_ids, INDUSTRY)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{
        AudienceTags, Classification, ContentKind, JobDetails, KindDetails, TagRef,
    };

    pub(crate) fn item(kind: ContentKind, id: &str, title: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            description: String::new(),
            created_at: Utc::now() - Duration::days(30),
            owner_id: "owner".to_string(),
            city: None,
            country: None,
            audience: AudienceTags::default(),
            classification: Classification::default(),
            details: KindDetails::empty(kind),
        }
    }

    #[test]
    fn test_category_overlap_contributes_full_weight() {
        let mut job = item(ContentKind::Job, "j1", "Backend engineer");
        job.audience.tags_mut(TaxonomyLevel::Category).push(TagRef::new("42", "Design"));
        let mut query = HeuristicQuery::default();
        query.audience.category_ids.insert("42".to_string());

        assert_eq!(audience_overlap(&job, &query), 25.0);
        assert_eq!(score(&job, &query, Utc::now()), 25.0);
    }

    #[test]
    fn test_partial_overlap_scales() {
        let mut job = item(ContentKind::Job, "j1", "x");
        job.audience.tags_mut(TaxonomyLevel::Subsubcategory).push(TagRef::new("1", ""));
        let mut query = HeuristicQuery::default();
        query.audience.subsub_ids = ["1".to_string(), "2".to_string()].into();
        assert_eq!(audience_overlap(&job, &query), 10.0);
    }

    #[test]
    fn test_title_phrase_beats_description() {
        // single-character query: phrase tiers only, no term tokens
        let a = item(ContentKind::Service, "a", "X-ray imaging");
        let mut b = item(ContentKind::Service, "b", "Imaging");
        b.description = "Portable x-ray units".to_string();

        assert_eq!(text_relevance(&a, Some("x")), 60.0);
        assert_eq!(text_relevance(&b, Some("x")), 50.0);
    }

    #[test]
    fn test_text_contribution_capped() {
        let mut job = item(ContentKind::Job, "j", "senior rust backend engineer");
        job.description = "senior rust backend engineer wanted".to_string();
        job.details = KindDetails::Job(JobDetails {
            company_name: Some("Rust Backend Ltd".to_string()),
            ..Default::default()
        });
        assert_eq!(text_relevance(&job, Some("senior rust backend engineer")), 80.0);
    }

    #[test]
    fn test_no_term_hits_gives_no_coverage_band() {
        let job = item(ContentKind::Job, "j", "Accountant");
        assert_eq!(text_relevance(&job, Some("plumber welder")), 0.0);
    }

    #[test]
    fn test_recency_bands() {
        let now = Utc::now();
        assert_eq!(recency(now - Duration::hours(3), now), 8.0);
        assert_eq!(recency(now - Duration::days(3), now), 4.0);
        assert_eq!(recency(now - Duration::days(30), now), 0.0);
    }

    #[test]
    fn test_location_city_substring_and_country() {
        let mut event = item(ContentKind::Event, "e", "Meetup");
        event.city = Some("Greater Lagos".to_string());
        event.country = Some("Nigeria".to_string());
        let query = HeuristicQuery {
            city: Some("lagos".to_string()),
            country: Some("NIGERIA".to_string()),
            ..Default::default()
        };
        assert_eq!(location(&event, &query), 20.0);
    }

    #[test]
    fn test_direct_classification_and_experience() {
        let mut job = item(ContentKind::Job, "j", "x");
        job.classification.industry_category_id = Some("ind".to_string());
        job.classification.subcategory_id = Some("50".to_string());
        job.details = KindDetails::Job(JobDetails {
            experience_level: Some("Senior".to_string()),
            ..Default::default()
        });
        let mut query = HeuristicQuery {
            experience_level: Some("senior".to_string()),
            ..Default::default()
        };
        query.industry_ids.insert("ind".to_string());
        query.general.subcategory_ids.insert("50".to_string());

        assert_eq!(score(&job, &query, Utc::now()), 75.0);
    }

    #[test]
    fn test_sum_clamped_to_hundred() {
        let mut job = item(ContentKind::Job, "j", "rust");
        job.created_at = Utc::now();
        job.classification.industry_category_id = Some("ind".to_string());
        job.classification.category_id = Some("5".to_string());
        let mut query = HeuristicQuery {
            q: Some("rust".to_string()),
            ..Default::default()
        };
        query.industry_ids.insert("ind".to_string());
        query.general.category_ids.insert("5".to_string());

        assert_eq!(score(&job, &query, Utc::now()), 100.0);
    }
}
