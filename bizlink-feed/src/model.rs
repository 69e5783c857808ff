//! Domain types shared by the feed and matching engine
//!
//! Content arrives as one of eight kinds. The fields every kind shares live on
//! [`ContentItem`]; kind-specific fields live in [`KindDetails`] and are passed
//! through untouched except for the few accessors the scorer needs.

use bizlink_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Content kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Job,
    Event,
    Service,
    Product,
    Tourism,
    Funding,
    Need,
    Moment,
}

impl ContentKind {
    /// All kinds in fan-out order
    pub const ALL: [ContentKind; 8] = [
        ContentKind::Job,
        ContentKind::Event,
        ContentKind::Service,
        ContentKind::Product,
        ContentKind::Tourism,
        ContentKind::Funding,
        ContentKind::Need,
        ContentKind::Moment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Job => "job",
            ContentKind::Event => "event",
            ContentKind::Service => "service",
            ContentKind::Product => "product",
            ContentKind::Tourism => "tourism",
            ContentKind::Funding => "funding",
            ContentKind::Need => "need",
            ContentKind::Moment => "moment",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    /// Accepts singular and plural forms (`job`, `jobs`), case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" | "jobs" => Ok(ContentKind::Job),
            "event" | "events" => Ok(ContentKind::Event),
            "service" | "services" => Ok(ContentKind::Service),
            "product" | "products" => Ok(ContentKind::Product),
            "tourism" | "tourisms" => Ok(ContentKind::Tourism),
            "funding" | "fundings" | "crowdfunding" => Ok(ContentKind::Funding),
            "need" | "needs" => Ok(ContentKind::Need),
            "moment" | "moments" => Ok(ContentKind::Moment),
            other => Err(Error::InvalidInput(format!("Unknown content kind: {}", other))),
        }
    }
}

/// Level of a node in the taxonomy hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyLevel {
    Identity,
    Category,
    Subcategory,
    Subsubcategory,
}

impl TaxonomyLevel {
    pub const ALL: [TaxonomyLevel; 4] = [
        TaxonomyLevel::Identity,
        TaxonomyLevel::Category,
        TaxonomyLevel::Subcategory,
        TaxonomyLevel::Subsubcategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyLevel::Identity => "identity",
            TaxonomyLevel::Category => "category",
            TaxonomyLevel::Subcategory => "subcategory",
            TaxonomyLevel::Subsubcategory => "subsubcategory",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identity" => Some(TaxonomyLevel::Identity),
            "category" => Some(TaxonomyLevel::Category),
            "subcategory" => Some(TaxonomyLevel::Subcategory),
            "subsubcategory" => Some(TaxonomyLevel::Subsubcategory),
            _ => None,
        }
    }
}

/// Taxonomy reference carried on an audience tag-set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: String,
    pub name: String,
}

impl TagRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The four audience tag-sets attached to a content item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceTags {
    pub audience_identities: Vec<TagRef>,
    pub audience_categories: Vec<TagRef>,
    pub audience_subcategories: Vec<TagRef>,
    pub audience_subsubs: Vec<TagRef>,
}

impl AudienceTags {
    pub fn tags(&self, level: TaxonomyLevel) -> &[TagRef] {
        match level {
            TaxonomyLevel::Identity => &self.audience_identities,
            TaxonomyLevel::Category => &self.audience_categories,
            TaxonomyLevel::Subcategory => &self.audience_subcategories,
            TaxonomyLevel::Subsubcategory => &self.audience_subsubs,
        }
    }

    pub fn tags_mut(&mut self, level: TaxonomyLevel) -> &mut Vec<TagRef> {
        match level {
            TaxonomyLevel::Identity => &mut self.audience_identities,
            TaxonomyLevel::Category => &mut self.audience_categories,
            TaxonomyLevel::Subcategory => &mut self.audience_subcategories,
            TaxonomyLevel::Subsubcategory => &mut self.audience_subsubs,
        }
    }

    /// Id-only view used for matching
    pub fn to_set(&self) -> TaxonomySet {
        let ids = |tags: &[TagRef]| tags.iter().map(|t| t.id.clone()).collect();
        TaxonomySet {
            identity_ids: ids(&self.audience_identities),
            category_ids: ids(&self.audience_categories),
            subcategory_ids: ids(&self.audience_subcategories),
            subsub_ids: ids(&self.audience_subsubs),
        }
    }
}

/// Ids across the four taxonomy dimensions
///
/// Used for a user's Offerings, a user's Interests, and request-scoped
/// audience criteria. An empty dimension means "nothing declared".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomySet {
    pub identity_ids: BTreeSet<String>,
    pub category_ids: BTreeSet<String>,
    pub subcategory_ids: BTreeSet<String>,
    pub subsub_ids: BTreeSet<String>,
}

impl TaxonomySet {
    pub fn ids(&self, level: TaxonomyLevel) -> &BTreeSet<String> {
        match level {
            TaxonomyLevel::Identity => &self.identity_ids,
            TaxonomyLevel::Category => &self.category_ids,
            TaxonomyLevel::Subcategory => &self.subcategory_ids,
            TaxonomyLevel::Subsubcategory => &self.subsub_ids,
        }
    }

    pub fn ids_mut(&mut self, level: TaxonomyLevel) -> &mut BTreeSet<String> {
        match level {
            TaxonomyLevel::Identity => &mut self.identity_ids,
            TaxonomyLevel::Category => &mut self.category_ids,
            TaxonomyLevel::Subcategory => &mut self.subcategory_ids,
            TaxonomyLevel::Subsubcategory => &mut self.subsub_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        TaxonomyLevel::ALL.iter().all(|level| self.ids(*level).is_empty())
    }
}

/// Request-scoped audience filter; empty dimensions impose no constraint
pub type AudienceCriteria = TaxonomySet;

/// Item's own general and industry classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub subsubcategory_id: Option<String>,
    pub industry_category_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDetails {
    pub company_name: Option<String>,
    pub experience_level: Option<String>,
    pub job_type: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDetails {
    pub event_type: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub registration_type: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDetails {
    pub service_type: Option<String>,
    pub price: Option<f64>,
    pub delivery_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductDetails {
    pub price: Option<f64>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TourismDetails {
    pub post_type: Option<String>,
    pub season: Option<String>,
    pub budget_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FundingDetails {
    pub goal: Option<f64>,
    pub raised: Option<f64>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NeedDetails {
    pub budget: Option<f64>,
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MomentDetails {
    pub moment_type: Option<String>,
}

/// Kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindDetails {
    Job(JobDetails),
    Event(EventDetails),
    Service(ServiceDetails),
    Product(ProductDetails),
    Tourism(TourismDetails),
    Funding(FundingDetails),
    Need(NeedDetails),
    Moment(MomentDetails),
}

impl KindDetails {
    /// Decode the stored JSON payload for a given kind
    pub fn from_json(kind: ContentKind, raw: &str) -> Result<Self> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        Ok(match kind {
            ContentKind::Job => KindDetails::Job(serde_json::from_str(raw)?),
            ContentKind::Event => KindDetails::Event(serde_json::from_str(raw)?),
            ContentKind::Service => KindDetails::Service(serde_json::from_str(raw)?),
            ContentKind::Product => KindDetails::Product(serde_json::from_str(raw)?),
            ContentKind::Tourism => KindDetails::Tourism(serde_json::from_str(raw)?),
            ContentKind::Funding => KindDetails::Funding(serde_json::from_str(raw)?),
            ContentKind::Need => KindDetails::Need(serde_json::from_str(raw)?),
            ContentKind::Moment => KindDetails::Moment(serde_json::from_str(raw)?),
        })
    }

    /// Empty payload for a kind
    pub fn empty(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Job => KindDetails::Job(JobDetails::default()),
            ContentKind::Event => KindDetails::Event(EventDetails::default()),
            ContentKind::Service => KindDetails::Service(ServiceDetails::default()),
            ContentKind::Product => KindDetails::Product(ProductDetails::default()),
            ContentKind::Tourism => KindDetails::Tourism(TourismDetails::default()),
            ContentKind::Funding => KindDetails::Funding(FundingDetails::default()),
            ContentKind::Need => KindDetails::Need(NeedDetails::default()),
            ContentKind::Moment => KindDetails::Moment(MomentDetails::default()),
        }
    }

    pub fn company_name(&self) -> Option<&str> {
        match self {
            KindDetails::Job(job) => job.company_name.as_deref(),
            _ => None,
        }
    }

    pub fn experience_level(&self) -> Option<&str> {
        match self {
            KindDetails::Job(job) => job.experience_level.as_deref(),
            _ => None,
        }
    }
}

/// A fetched content record in the unified shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(flatten)]
    pub audience: AudienceTags,
    #[serde(flatten)]
    pub classification: Classification,
    pub details: KindDetails,
}

/// Per-viewer feed preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSettings {
    pub connections_only: bool,
    /// Kinds shown on the all-kinds tab; empty means every kind
    pub content_types: BTreeSet<ContentKind>,
}

/// Viewer or candidate profile used for matching
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub headline: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// What the user is or does
    pub offerings: TaxonomySet,
    /// What the user is looking for
    pub interests: TaxonomySet,
    pub settings: FeedSettings,
}

/// Relationship between the viewer and another user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    PendingOutgoing,
    PendingIncoming,
    None,
    Unauthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_tab_names() {
        assert_eq!("jobs".parse::<ContentKind>().unwrap(), ContentKind::Job);
        assert_eq!("Events".parse::<ContentKind>().unwrap(), ContentKind::Event);
        assert_eq!("moment".parse::<ContentKind>().unwrap(), ContentKind::Moment);
        assert!("podcasts".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_details_decode_per_kind() {
        let details = KindDetails::from_json(
            ContentKind::Job,
            r#"{"companyName":"Acme","experienceLevel":"senior"}"#,
        )
        .unwrap();
        assert!(matches!(details, KindDetails::Job(_)));
        assert_eq!(details.company_name(), Some("Acme"));
        assert_eq!(details.experience_level(), Some("senior"));

        let details = KindDetails::from_json(ContentKind::Moment, "").unwrap();
        assert_eq!(details, KindDetails::empty(ContentKind::Moment));
        assert_eq!(details.company_name(), None);
    }

    #[test]
    fn test_audience_to_set() {
        let mut tags = AudienceTags::default();
        tags.tags_mut(TaxonomyLevel::Category).push(TagRef::new("42", "Design"));
        let set = tags.to_set();
        assert!(set.category_ids.contains("42"));
        assert!(set.identity_ids.is_empty());
        assert!(!set.is_empty());
    }
}
