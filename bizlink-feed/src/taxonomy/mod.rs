//! Taxonomy catalog and hierarchy validation

pub mod catalog;
pub mod validator;

pub use catalog::{
    CatalogHandle, CategoryNode, IdentityCatalog, IdentityNode, Membership, SubcategoryNode,
    SubsubNode, TaxonomyTree,
};
pub use validator::{TaxonomyValidator, ValidatedTaxonomy};
