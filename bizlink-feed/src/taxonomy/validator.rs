//! Taxonomy hierarchy validation
//!
//! Drops subcategories whose parent category was not requested (and
//! subsubcategories whose parent subcategory did not survive), then checks the
//! survivors exist. Oversized inputs are truncated to fixed caps rather than
//! rejected, so callers must tolerate partial results.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::repo::TaxonomyRepository;
use bizlink_common::{Error, Result};

pub const MAX_CATEGORIES: usize = 100;
pub const MAX_SUBCATEGORIES: usize = 500;
pub const MAX_SUBSUBCATEGORIES: usize = 1000;

/// Validated, hierarchy-consistent id sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedTaxonomy {
    pub category_ids: BTreeSet<String>,
    pub subcategory_ids: BTreeSet<String>,
    pub subsub_ids: BTreeSet<String>,
}

pub struct TaxonomyValidator {
    repo: Arc<dyn TaxonomyRepository>,
}

/// Keep at most `cap` ids; reports whether anything was cut
fn truncate(ids: &BTreeSet<String>, cap: usize) -> (Vec<String>, bool) {
    let kept: Vec<String> = ids.iter().take(cap).cloned().collect();
    let truncated = ids.len() > cap;
    (kept, truncated)
}

impl TaxonomyValidator {
    pub fn new(repo: Arc<dyn TaxonomyRepository>) -> Self {
        Self { repo }
    }

    /// Strict validation for mutation paths; errors reach the caller
    pub async fn validate(
        &self,
        category_ids: &BTreeSet<String>,
        subcategory_ids: &BTreeSet<String>,
        subsub_ids: &BTreeSet<String>,
    ) -> Result<ValidatedTaxonomy> {
        let (categories, categories_truncated) = truncate(category_ids, MAX_CATEGORIES);
        let (subcategories, subs_truncated) = truncate(subcategory_ids, MAX_SUBCATEGORIES);
        let (subsubs, subsubs_truncated) = truncate(subsub_ids, MAX_SUBSUBCATEGORIES);

        if categories_truncated || subs_truncated || subsubs_truncated {
            debug!(
                categories = category_ids.len(),
                subcategories = subcategory_ids.len(),
                subsubcategories = subsub_ids.len(),
                "Taxonomy input truncated to caps"
            );
        }

        // Categories
        let mut valid_categories = BTreeSet::new();
        if !categories.is_empty() {
            let rows = self.repo.find_categories(&categories).await?;
            if rows.len() < categories.len() && !categories_truncated {
                return Err(Error::Validation("Some categories do not exist".to_string()));
            }
            valid_categories.extend(rows.into_iter().map(|row| row.id));
        }

        // Subcategories, filtered by requested parent categories
        let mut valid_subcategories = BTreeSet::new();
        if !subcategories.is_empty() {
            let rows = self.repo.find_subcategories(&subcategories).await?;
            if categories.is_empty() {
                if rows.len() < subcategories.len() && !subs_truncated {
                    return Err(Error::Validation(
                        "Some subcategories do not exist".to_string(),
                    ));
                }
                valid_subcategories.extend(rows.into_iter().map(|row| row.id));
            } else {
                valid_subcategories.extend(
                    rows.into_iter()
                        .filter(|row| valid_categories.contains(&row.category_id))
                        .map(|row| row.id),
                );
            }
        }

        // Subsubcategories, filtered by surviving subcategories
        let mut valid_subsubs = BTreeSet::new();
        if !subsubs.is_empty() {
            let rows = self.repo.find_subsubcategories(&subsubs).await?;
            if valid_subcategories.is_empty() {
                if rows.len() < subsubs.len() && !subsubs_truncated {
                    return Err(Error::Validation(
                        "Some subsubcategories do not exist".to_string(),
                    ));
                }
                valid_subsubs.extend(rows.into_iter().map(|row| row.id));
            } else {
                valid_subsubs.extend(
                    rows.into_iter()
                        .filter(|row| valid_subcategories.contains(&row.subcategory_id))
                        .map(|row| row.id),
                );
            }
        }

        Ok(ValidatedTaxonomy {
            category_ids: valid_categories,
            subcategory_ids: valid_subcategories,
            subsub_ids: valid_subsubs,
        })
    }

    /// Read-path validation: any failure yields empty sets
    pub async fn validate_or_empty(
        &self,
        category_ids: &BTreeSet<String>,
        subcategory_ids: &BTreeSet<String>,
        subsub_ids: &BTreeSet<String>,
    ) -> ValidatedTaxonomy {
        match self.validate(category_ids, subcategory_ids, subsub_ids).await {
            Ok(validated) => validated,
            Err(e) => {
                warn!(error = %e, "Taxonomy validation failed on read path, ignoring filters");
                ValidatedTaxonomy::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::MemoryStore;

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn validator() -> TaxonomyValidator {
        TaxonomyValidator::new(Arc::new(MemoryStore::with_sample_taxonomy()))
    }

    #[tokio::test]
    async fn test_subcategory_with_foreign_parent_dropped() {
        // "60" belongs to category "6", which was not requested
        let result = validator()
            .validate(&ids(&["5"]), &ids(&["50", "60"]), &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(result.category_ids, ids(&["5"]));
        assert_eq!(result.subcategory_ids, ids(&["50"]));
    }

    #[tokio::test]
    async fn test_subsub_filtered_by_surviving_subcategories() {
        let result = validator()
            .validate(&ids(&["5"]), &ids(&["51"]), &ids(&["500"]))
            .await
            .unwrap();
        assert_eq!(result.subcategory_ids, ids(&["51"]));
        assert!(result.subsub_ids.is_empty());
    }

    #[tokio::test]
    async fn test_missing_category_is_validation_error() {
        let err = validator()
            .validate(&ids(&["5", "999"]), &BTreeSet::new(), &BTreeSet::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Some categories do not exist");
    }

    #[tokio::test]
    async fn test_missing_subcategory_without_parents_is_error() {
        let err = validator()
            .validate(&BTreeSet::new(), &ids(&["nope"]), &BTreeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_read_path_degrades_to_empty() {
        let result = validator()
            .validate_or_empty(&ids(&["999"]), &ids(&["50"]), &BTreeSet::new())
            .await;
        assert_eq!(result, ValidatedTaxonomy::default());
    }

    #[tokio::test]
    async fn test_oversized_input_truncated_not_rejected() {
        // 150 ids, only "5" and "6" exist; existence is not enforced once truncated
        let mut many = ids(&["5", "6"]);
        for i in 0..150 {
            many.insert(format!("x{:03}", i));
        }
        let result = validator()
            .validate(&many, &BTreeSet::new(), &BTreeSet::new())
            .await
            .unwrap();
        assert!(result.category_ids.len() <= MAX_CATEGORIES);
        assert!(result.category_ids.contains("5"));
    }
}
