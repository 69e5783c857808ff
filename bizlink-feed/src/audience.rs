//! Audience targeting filter
//!
//! Applied in memory to an already-fetched page, after tag hydration.

use std::collections::HashMap;

use crate::model::{AudienceCriteria, AudienceTags, ContentItem, TaxonomyLevel};

/// Whether an item's audience tag-sets satisfy the request criteria
///
/// Each non-empty criterion dimension must intersect the item's tags in that
/// dimension; empty dimensions impose no constraint.
pub fn matches(tags: &AudienceTags, criteria: &AudienceCriteria) -> bool {
    TaxonomyLevel::ALL.iter().all(|level| {
        let wanted = criteria.ids(*level);
        wanted.is_empty() || tags.tags(*level).iter().any(|tag| wanted.contains(&tag.id))
    })
}

/// Attach batch-loaded audience tags to their items
pub fn hydrate(items: &mut [ContentItem], mut audiences: HashMap<String, AudienceTags>) {
    for item in items.iter_mut() {
        if let Some(tags) = audiences.remove(&item.id) {
            item.audience = tags;
        }
    }
}

/// Keep only items matching the criteria
pub fn retain_matching(items: &mut Vec<ContentItem>, criteria: &AudienceCriteria) {
    if criteria.is_empty() {
        return;
    }
    items.retain(|item| matches(&item.audience, criteria));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TagRef;

    fn tags(categories: &[&str], identities: &[&str]) -> AudienceTags {
        let mut tags = AudienceTags::default();
        for id in categories {
            tags.tags_mut(TaxonomyLevel::Category).push(TagRef::new(*id, ""));
        }
        for id in identities {
            tags.tags_mut(TaxonomyLevel::Identity).push(TagRef::new(*id, ""));
        }
        tags
    }

    fn criteria(categories: &[&str], identities: &[&str]) -> AudienceCriteria {
        let mut criteria = AudienceCriteria::default();
        criteria.category_ids = categories.iter().map(|s| s.to_string()).collect();
        criteria.identity_ids = identities.iter().map(|s| s.to_string()).collect();
        criteria
    }

    #[test]
    fn test_empty_criteria_matches_everything() {
        assert!(matches(&AudienceTags::default(), &AudienceCriteria::default()));
        assert!(matches(&tags(&["1"], &["I1"]), &AudienceCriteria::default()));
    }

    #[test]
    fn test_or_within_dimension() {
        assert!(matches(&tags(&["42"], &[]), &criteria(&["7", "42"], &[])));
        assert!(!matches(&tags(&["7"], &[]), &criteria(&["42"], &[])));
    }

    #[test]
    fn test_and_across_dimensions() {
        let item = tags(&["42"], &["I1"]);
        assert!(matches(&item, &criteria(&["42"], &["I1"])));
        assert!(!matches(&item, &criteria(&["42"], &["I2"])));
    }

    #[test]
    fn test_untagged_item_fails_non_empty_dimension() {
        assert!(!matches(&AudienceTags::default(), &criteria(&["42"], &[])));
    }
}
