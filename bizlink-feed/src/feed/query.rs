//! Feed request parameters

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use tracing::warn;

use crate::model::{AudienceCriteria, ContentKind};
use crate::params::QueryParams;
use crate::repo::{ContentFilter, GeneralTaxonomy, KindFilters};
use crate::scoring::HeuristicQuery;
use bizlink_common::config::FeedTuning;

/// Which kinds a request covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedTab {
    #[default]
    All,
    Kind(ContentKind),
}

impl FeedTab {
    /// Unknown tab names fall back to the all-kinds tab
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => FeedTab::All,
            Some(tab) if tab.eq_ignore_ascii_case("all") => FeedTab::All,
            Some(tab) => match tab.parse::<ContentKind>() {
                Ok(kind) => FeedTab::Kind(kind),
                Err(_) => {
                    warn!(tab = %tab, "Unknown feed tab, showing all kinds");
                    FeedTab::All
                }
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedTab::All => "all",
            FeedTab::Kind(kind) => kind.as_str(),
        }
    }
}

impl Serialize for FeedTab {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Normalized feed request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub tab: FeedTab,
    pub q: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    /// Restrict to one author
    pub user_id: Option<String>,
    pub audience: AudienceCriteria,
    pub general: GeneralTaxonomy,
    pub industry_ids: BTreeSet<String>,
    pub kind_filters: KindFilters,
    pub limit: usize,
    pub offset: usize,
}

impl FeedQuery {
    pub fn from_params(params: &QueryParams, tuning: &FeedTuning) -> Self {
        let limit = params
            .number::<usize>("limit")
            .unwrap_or(tuning.default_limit)
            .clamp(1, tuning.max_limit.max(1));

        Self {
            tab: FeedTab::parse(params.text("tab").as_deref()),
            q: params.text("q"),
            country: params.text("country"),
            city: params.text("city"),
            user_id: params.text("userId"),
            audience: AudienceCriteria {
                identity_ids: params.ids(&["audienceIdentityIds", "identityId"]),
                category_ids: params.ids(&["audienceCategoryIds", "categoryId"]),
                subcategory_ids: params.ids(&["audienceSubcategoryIds", "subcategoryId"]),
                subsub_ids: params.ids(&["audienceSubsubCategoryIds", "subsubCategoryId"]),
            },
            general: GeneralTaxonomy {
                category_ids: params.ids(&["generalCategoryIds"]),
                subcategory_ids: params.ids(&["generalSubcategoryIds"]),
                subsub_ids: params.ids(&["generalSubsubCategoryIds"]),
            },
            industry_ids: params.ids(&["industryIds"]),
            kind_filters: KindFilters {
                experience_level: params.text("experienceLevel"),
                job_type: params.text("jobType"),
                event_type: params.text("eventType"),
                service_type: params.text("serviceType"),
                post_type: params.text("postType"),
                price_min: params.number("priceMin"),
                price_max: params.number("priceMax"),
            },
            limit,
            offset: params
                .number::<usize>("offset")
                .unwrap_or(0)
                .min(tuning.max_offset),
        }
    }

    /// Kinds to fetch; on the all tab the viewer's content-type preference narrows it
    pub fn kinds(&self, preferred: &BTreeSet<ContentKind>) -> Vec<ContentKind> {
        match self.tab {
            FeedTab::Kind(kind) => vec![kind],
            FeedTab::All if preferred.is_empty() => ContentKind::ALL.to_vec(),
            FeedTab::All => ContentKind::ALL
                .into_iter()
                .filter(|kind| preferred.contains(kind))
                .collect(),
        }
    }

    /// Store-side filter; audience criteria stay in memory
    pub fn content_filter(&self, owner_ids: Option<BTreeSet<String>>) -> ContentFilter {
        ContentFilter {
            q: self.q.clone(),
            country: self.country.clone(),
            city: self.city.clone(),
            owner_id: self.user_id.clone(),
            owner_ids,
            general: self.general.clone(),
            industry_ids: self.industry_ids.clone(),
            kind_filters: self.kind_filters.clone(),
        }
    }

    pub fn heuristic(&self) -> HeuristicQuery {
        HeuristicQuery {
            audience: self.audience.clone(),
            q: self.q.clone(),
            country: self.country.clone(),
            city: self.city.clone(),
            experience_level: self.kind_filters.experience_level.clone(),
            general: self.general.clone(),
            industry_ids: self.industry_ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> FeedQuery {
        let params = QueryParams::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        FeedQuery::from_params(&params, &FeedTuning::default())
    }

    #[test]
    fn test_defaults() {
        let query = parse(&[]);
        assert_eq!(query.tab, FeedTab::All);
        assert_eq!(query.limit, 40);
        assert_eq!(query.offset, 0);
        assert!(query.audience.is_empty());
    }

    #[test]
    fn test_limit_clamped() {
        assert_eq!(parse(&[("limit", "5000")]).limit, 100);
        assert_eq!(parse(&[("limit", "0")]).limit, 1);
    }

    #[test]
    fn test_offset_clamped_bounds_overfetch() {
        let tuning = FeedTuning::default();
        let query = parse(&[("offset", "500000000"), ("limit", "100")]);
        assert_eq!(query.offset, tuning.max_offset);

        let per_kind =
            crate::pagination::buffer_limit(query.offset, query.limit, tuning.buffer_factor);
        assert_eq!(per_kind, 2200);

        assert_eq!(parse(&[("offset", "80")]).offset, 80);
    }

    #[test]
    fn test_tab_and_audience_aliases() {
        let query = parse(&[
            ("tab", "jobs"),
            ("audienceCategoryIds", "42"),
            ("categoryId", "7"),
            ("identityId", "I1"),
        ]);
        assert_eq!(query.tab, FeedTab::Kind(ContentKind::Job));
        assert_eq!(query.audience.category_ids.len(), 2);
        assert!(query.audience.identity_ids.contains("I1"));
    }

    #[test]
    fn test_unknown_tab_falls_back() {
        assert_eq!(parse(&[("tab", "podcasts")]).tab, FeedTab::All);
    }

    #[test]
    fn test_kinds_follow_viewer_preference() {
        let query = parse(&[]);
        let preferred: BTreeSet<ContentKind> = [ContentKind::Event, ContentKind::Job].into();
        assert_eq!(query.kinds(&preferred), vec![ContentKind::Job, ContentKind::Event]);
        assert_eq!(query.kinds(&BTreeSet::new()).len(), 8);

        let jobs = parse(&[("tab", "jobs")]);
        assert_eq!(jobs.kinds(&preferred), vec![ContentKind::Job]);
    }
}
