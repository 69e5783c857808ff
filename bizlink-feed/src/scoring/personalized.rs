//! Personalized match scoring
//!
//! Ratio of achieved to possible points. A dimension only enters the
//! denominator when the seeker declared interest in it, so undeclared
//! dimensions never penalize. Interest ids are identity-scoped first: an id
//! that does not descend from an identity the target exposes is discarded.

use crate::model::{TaxonomyLevel, TaxonomySet};
use crate::taxonomy::IdentityCatalog;

const DIMENSION_WEIGHT: f64 = 25.0;
const LOCATION_WEIGHT: f64 = 10.0;
const CITY_SHARE: f64 = 0.6;
const COUNTRY_SHARE: f64 = 0.4;

/// City and country of one side of a comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct Locale<'a> {
    pub city: Option<&'a str>,
    pub country: Option<&'a str>,
}

impl<'a> Locale<'a> {
    pub fn new(city: Option<&'a str>, country: Option<&'a str>) -> Self {
        Self { city, country }
    }
}

fn same_place(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) => !a.is_empty() && a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Score in `[0, 100]` of `target` against what `seeker` is interested in
///
/// `target` is whatever the other side exposes: an item's audience tag-sets,
/// or a user's offerings.
pub fn directional_score(
    interests: &TaxonomySet,
    target: &TaxonomySet,
    seeker_locale: Locale<'_>,
    target_locale: Locale<'_>,
    catalog: &IdentityCatalog,
) -> f64 {
    let mut total = 0.0;
    let mut possible = 0.0;

    if !interests.identity_ids.is_empty() {
        possible += DIMENSION_WEIGHT;
        if interests
            .identity_ids
            .iter()
            .any(|id| target.identity_ids.contains(id))
        {
            total += DIMENSION_WEIGHT;
        }
    }

    for level in [
        TaxonomyLevel::Category,
        TaxonomyLevel::Subcategory,
        TaxonomyLevel::Subsubcategory,
    ] {
        let declared = interests.ids(level);
        if declared.is_empty() {
            continue;
        }
        possible += DIMENSION_WEIGHT;

        let scoped: Vec<&String> = declared
            .iter()
            .filter(|id| catalog.belongs_to_any(level, id, &target.identity_ids))
            .collect();
        let offered = target.ids(level);
        let denominator = scoped.len().max(offered.len());
        if denominator == 0 {
            continue;
        }
        let matched = scoped.iter().filter(|id| offered.contains(id.as_str())).count();
        total += DIMENSION_WEIGHT * matched as f64 / denominator as f64;
    }

    if same_place(seeker_locale.city, target_locale.city) {
        total += LOCATION_WEIGHT * CITY_SHARE;
        possible += LOCATION_WEIGHT * CITY_SHARE;
    } else if same_place(seeker_locale.country, target_locale.country) {
        total += LOCATION_WEIGHT * COUNTRY_SHARE;
        possible += LOCATION_WEIGHT * COUNTRY_SHARE;
    }

    if possible == 0.0 {
        return 0.0;
    }
    (100.0 * total / possible).clamp(0.0, 100.0).round()
}
