//! Feed assembly
//!
//! One request runs: fan-out fetch per kind, audience hydration and
//! filtering, scoring, merge and sort, diversification (all-kinds tab only),
//! pagination, and decoration of the final page.

pub mod assembler;
pub mod decorate;
pub mod diversify;
pub mod query;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::ContentItem;
pub use assembler::FeedAssembler;
pub use decorate::Decoration;
pub use diversify::diversify;
pub use query::{FeedQuery, FeedTab};

/// Unified, scored and decorated feed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub match_percentage: f64,
    /// Heuristic relevance, used for ranking when `match_percentage` is not finite
    #[serde(skip)]
    pub score: f64,
    #[serde(rename = "_textMatch", default, skip_serializing_if = "Option::is_none")]
    pub text_match: Option<bool>,
    #[serde(flatten)]
    pub decoration: Decoration,
}

impl FeedItem {
    pub fn ranking_value(&self) -> f64 {
        if self.match_percentage.is_finite() {
            self.match_percentage
        } else {
            self.score
        }
    }
}

/// Descending rank, text matches first, newest first, then id
pub fn rank_order(a: &FeedItem, b: &FeedItem) -> Ordering {
    b.ranking_value()
        .total_cmp(&a.ranking_value())
        .then_with(|| b.text_match.unwrap_or(false).cmp(&a.text_match.unwrap_or(false)))
        .then_with(|| b.item.created_at.cmp(&a.item.created_at))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentKind;
    use crate::scoring::heuristic::tests::item;
    use chrono::Duration;

    fn entry(id: &str, mp: f64, text_match: Option<bool>, age_days: i64) -> FeedItem {
        let mut content = item(ContentKind::Job, id, id);
        content.created_at = chrono::Utc::now() - Duration::days(age_days);
        FeedItem {
            item: content,
            match_percentage: mp,
            score: 0.0,
            text_match,
            decoration: Decoration::default(),
        }
    }

    #[test]
    fn test_rank_order_keys() {
        let mut items = vec![
            entry("old", 50.0, None, 5),
            entry("new", 50.0, None, 1),
            entry("text", 50.0, Some(true), 9),
            entry("top", 90.0, Some(false), 30),
        ];
        items.sort_by(rank_order);
        let ids: Vec<&str> = items.iter().map(|e| e.item.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "text", "new", "old"]);
    }

    #[test]
    fn test_non_finite_match_falls_back_to_score() {
        let mut nan = entry("nan", f64::NAN, None, 1);
        nan.score = 70.0;
        let plain = entry("plain", 60.0, None, 1);
        let mut items = vec![plain, nan];
        items.sort_by(rank_order);
        assert_eq!(items[0].item.id, "nan");
    }

    #[test]
    fn test_serialized_shape() {
        let mut e = entry("j1", 25.0, Some(true), 1);
        e.decoration.likes = 3;
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["id"], "j1");
        assert_eq!(json["kind"], "job");
        assert_eq!(json["matchPercentage"], 25.0);
        assert_eq!(json["_textMatch"], true);
        assert_eq!(json["likes"], 3);
        assert!(json.get("audienceCategories").is_some());
        assert!(json.get("score").is_none());
    }
}
