//! Bidirectional connection matching between two users

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::model::UserProfile;
use crate::scoring::{directional_score, Locale};
use crate::taxonomy::IdentityCatalog;
use bizlink_common::{Error, Result};

/// How forward and reverse scores are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchFormula {
    /// Arithmetic mean
    Simple,
    /// `0.7 × forward + 0.3 × reverse`
    #[default]
    Reciprocal,
}

impl MatchFormula {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchFormula::Simple => "simple",
            MatchFormula::Reciprocal => "reciprocal",
        }
    }
}

impl fmt::Display for MatchFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchFormula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(MatchFormula::Simple),
            "reciprocal" => Ok(MatchFormula::Reciprocal),
            other => Err(Error::InvalidInput(format!("Unknown match formula: {}", other))),
        }
    }
}

/// Combine directional scores into one rounded, clamped value
pub fn combine(forward: f64, reverse: f64, formula: MatchFormula) -> u8 {
    let combined = match formula {
        MatchFormula::Simple => (forward + reverse) / 2.0,
        MatchFormula::Reciprocal => forward * 0.7 + reverse * 0.3,
    };
    combined.clamp(0.0, 100.0).round() as u8
}

/// Scores a candidate against the viewer, optionally in both directions
pub struct ConnectionMatcher {
    catalog: Arc<IdentityCatalog>,
}

impl ConnectionMatcher {
    pub fn new(catalog: Arc<IdentityCatalog>) -> Self {
        Self { catalog }
    }

    /// Viewer interests against candidate offerings, scoped to the
    /// candidate's offered identities; reverse swaps the roles.
    pub fn score(
        &self,
        viewer: &UserProfile,
        candidate: &UserProfile,
        bidirectional: bool,
        formula: MatchFormula,
    ) -> u8 {
        let viewer_locale = Locale::new(viewer.city.as_deref(), viewer.country.as_deref());
        let candidate_locale = Locale::new(candidate.city.as_deref(), candidate.country.as_deref());

        let forward = directional_score(
            &viewer.interests,
            &candidate.offerings,
            viewer_locale,
            candidate_locale,
            &self.catalog,
        );
        if !bidirectional {
            return forward.clamp(0.0, 100.0).round() as u8;
        }

        let reverse = directional_score(
            &candidate.interests,
            &viewer.offerings,
            candidate_locale,
            viewer_locale,
            &self.catalog,
        );
        combine(forward, reverse, formula)
    }
}
