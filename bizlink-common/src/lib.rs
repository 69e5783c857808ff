//! # bizlink Common Library
//!
//! Shared code for bizlink services:
//! - Error types
//! - Configuration loading
//! - SQLite schema setup
//! - Request id-list normalization

pub mod config;
pub mod db;
pub mod error;
pub mod ids;

pub use error::{Error, Result};
