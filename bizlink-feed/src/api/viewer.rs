//! Viewer identity
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in the `x-viewer-id` header. A missing or blank header means the
//! request is anonymous.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

pub const VIEWER_HEADER: &str = "x-viewer-id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer(pub Option<String>);

impl Viewer {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Cache-key identity: the user id or `"anonymous"`
    pub fn cache_identity(&self) -> &str {
        self.id().unwrap_or("anonymous")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(VIEWER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Viewer(id))
    }
}
