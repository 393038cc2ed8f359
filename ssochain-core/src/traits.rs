//! Trait definitions for ssochain.
//!
//! These are the seams to collaborators outside the chain engine: the HTTP
//! transport and the URL matcher.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::{ChainRequest, ChainResponse};

/// Sends one request and yields one response.
///
/// Implementors are responsible for:
/// - Attaching cookies from the request's cookie store
/// - Following transport-level redirects and reporting the resolved URL
/// - Writing cookies set along the way back into the store
///
/// Failures are returned as-is; callers of a transport never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and waits for the response headers.
    async fn send(&self, request: ChainRequest) -> Result<ChainResponse, TransportError>;
}

/// Predicate over a URL string.
///
/// Implementations must match the entire string, not a substring.
pub trait UrlMatcher: Send + Sync {
    /// Returns true if `url` matches in full.
    fn matches(&self, url: &str) -> bool;
}
