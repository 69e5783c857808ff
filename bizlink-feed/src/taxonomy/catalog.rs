//! Identity catalog snapshot
//!
//! Immutable view of the whole taxonomy: nodes, parent links and identity
//! memberships. Scorers receive an `Arc<IdentityCatalog>`; the shared
//! [`CatalogHandle`] swaps in a fresh snapshot only on an explicit reload.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::model::TaxonomyLevel;
use crate::repo::TaxonomyRepository;
use bizlink_common::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryNode {
    pub id: String,
    pub name: String,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsubNode {
    pub id: String,
    pub name: String,
    pub subcategory_id: String,
}

/// Explicit identity membership row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub identity_id: String,
    pub level: TaxonomyLevel,
    pub node_id: String,
}

#[derive(Debug, Default)]
struct MemberSets {
    categories: HashSet<String>,
    subcategories: HashSet<String>,
    subsubs: HashSet<String>,
}

/// Read-only taxonomy snapshot with membership tests
#[derive(Debug, Default)]
pub struct IdentityCatalog {
    identities: BTreeMap<String, IdentityNode>,
    categories: BTreeMap<String, CategoryNode>,
    subcategories: BTreeMap<String, SubcategoryNode>,
    subsubs: BTreeMap<String, SubsubNode>,
    members: HashMap<String, MemberSets>,
}

impl IdentityCatalog {
    pub fn new(
        identities: Vec<IdentityNode>,
        categories: Vec<CategoryNode>,
        subcategories: Vec<SubcategoryNode>,
        subsubs: Vec<SubsubNode>,
        memberships: Vec<Membership>,
    ) -> Self {
        let mut members: HashMap<String, MemberSets> = HashMap::new();
        for m in memberships {
            let sets = members.entry(m.identity_id).or_default();
            match m.level {
                TaxonomyLevel::Category => {
                    sets.categories.insert(m.node_id);
                }
                TaxonomyLevel::Subcategory => {
                    sets.subcategories.insert(m.node_id);
                }
                TaxonomyLevel::Subsubcategory => {
                    sets.subsubs.insert(m.node_id);
                }
                // identities do not nest
                TaxonomyLevel::Identity => {}
            }
        }

        Self {
            identities: identities.into_iter().map(|n| (n.id.clone(), n)).collect(),
            categories: categories.into_iter().map(|n| (n.id.clone(), n)).collect(),
            subcategories: subcategories.into_iter().map(|n| (n.id.clone(), n)).collect(),
            subsubs: subsubs.into_iter().map(|n| (n.id.clone(), n)).collect(),
            members,
        }
    }

    /// Catalog with no nodes; every membership test fails
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn node_name(&self, level: TaxonomyLevel, id: &str) -> Option<&str> {
        match level {
            TaxonomyLevel::Identity => self.identities.get(id).map(|n| n.name.as_str()),
            TaxonomyLevel::Category => self.categories.get(id).map(|n| n.name.as_str()),
            TaxonomyLevel::Subcategory => self.subcategories.get(id).map(|n| n.name.as_str()),
            TaxonomyLevel::Subsubcategory => self.subsubs.get(id).map(|n| n.name.as_str()),
        }
    }

    /// Whether `node_id` at `level` descends from `identity_id`
    ///
    /// A node descends from an identity when it is an explicit member or
    /// when any of its ancestors is.
    pub fn belongs_to(&self, level: TaxonomyLevel, node_id: &str, identity_id: &str) -> bool {
        let sets = self.members.get(identity_id);

        match level {
            TaxonomyLevel::Identity => node_id == identity_id,
            TaxonomyLevel::Category => sets.is_some_and(|s| s.categories.contains(node_id)),
            TaxonomyLevel::Subcategory => sets.is_some_and(|s| {
                s.subcategories.contains(node_id)
                    || self
                        .subcategories
                        .get(node_id)
                        .is_some_and(|sub| s.categories.contains(&sub.category_id))
            }),
            TaxonomyLevel::Subsubcategory => {
                sets.is_some_and(|s| s.subsubs.contains(node_id))
                    || self.subsubs.get(node_id).is_some_and(|ss| {
                        self.belongs_to(TaxonomyLevel::Subcategory, &ss.subcategory_id, identity_id)
                    })
            }
        }
    }

    /// Whether `node_id` descends from at least one of `identity_ids`
    pub fn belongs_to_any(
        &self,
        level: TaxonomyLevel,
        node_id: &str,
        identity_ids: &BTreeSet<String>,
    ) -> bool {
        identity_ids
            .iter()
            .any(|identity_id| self.belongs_to(level, node_id, identity_id))
    }

    /// Nested tree for the taxonomy metadata endpoint
    pub fn tree(&self) -> TaxonomyTree {
        let mut subsubs_by_parent: BTreeMap<&str, Vec<&SubsubNode>> = BTreeMap::new();
        for ss in self.subsubs.values() {
            subsubs_by_parent.entry(ss.subcategory_id.as_str()).or_default().push(ss);
        }

        let mut subs_by_parent: BTreeMap<&str, Vec<TreeSubcategory>> = BTreeMap::new();
        for sub in self.subcategories.values() {
            let children = subsubs_by_parent
                .get(sub.id.as_str())
                .map(|list| list.iter().map(|ss| TreeLeaf::new(&ss.id, &ss.name)).collect())
                .unwrap_or_default();
            subs_by_parent
                .entry(sub.category_id.as_str())
                .or_default()
                .push(TreeSubcategory {
                    id: sub.id.clone(),
                    name: sub.name.clone(),
                    subsubcategories: children,
                });
        }

        let categories = self
            .categories
            .values()
            .map(|cat| TreeCategory {
                id: cat.id.clone(),
                name: cat.name.clone(),
                subcategories: subs_by_parent.remove(cat.id.as_str()).unwrap_or_default(),
            })
            .collect();

        let identities = self
            .identities
            .values()
            .map(|identity| {
                let mut category_ids: Vec<String> = self
                    .members
                    .get(&identity.id)
                    .map(|sets| sets.categories.iter().cloned().collect())
                    .unwrap_or_default();
                category_ids.sort();
                TreeIdentity {
                    id: identity.id.clone(),
                    name: identity.name.clone(),
                    category_ids,
                }
            })
            .collect();

        TaxonomyTree {
            identities,
            categories,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyTree {
    pub identities: Vec<TreeIdentity>,
    pub categories: Vec<TreeCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeIdentity {
    pub id: String,
    pub name: String,
    pub category_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeCategory {
    pub id: String,
    pub name: String,
    pub subcategories: Vec<TreeSubcategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSubcategory {
    pub id: String,
    pub name: String,
    pub subsubcategories: Vec<TreeLeaf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeLeaf {
    pub id: String,
    pub name: String,
}

impl TreeLeaf {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Shared, explicitly reloaded catalog snapshot
pub struct CatalogHandle {
    current: RwLock<Arc<IdentityCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: IdentityCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Current snapshot; cheap clone of an `Arc`
    pub async fn snapshot(&self) -> Arc<IdentityCatalog> {
        self.current.read().await.clone()
    }

    /// Replace the snapshot with a fresh load from the taxonomy store
    pub async fn reload(&self, repo: &dyn TaxonomyRepository) -> Result<Arc<IdentityCatalog>> {
        let fresh = Arc::new(repo.load_catalog().await?);
        info!(identities = fresh.identity_count(), "Identity catalog reloaded");
        *self.current.write().await = fresh.clone();
        Ok(fresh)
    }
}
