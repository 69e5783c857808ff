//! HTTP API handlers for bizlink-feed

pub mod audience;
pub mod error;
pub mod feed;
pub mod health;
pub mod suggestions;
pub mod taxonomy;
pub mod viewer;

pub use audience::replace_audience;
pub use error::ApiError;
pub use feed::get_feed;
pub use health::health_routes;
pub use suggestions::get_suggestions;
pub use taxonomy::{get_taxonomy, reload_taxonomy};
pub use viewer::{Viewer, VIEWER_HEADER};
