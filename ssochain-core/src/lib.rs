// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # ssochain Core
//!
//! Core types and traits shared by the ssochain crates.
//!
//! This crate has no opinion on how requests are sent or how logins are
//! performed. It defines:
//!
//! - The request and response model
//! - The shared cookie store
//! - Error types
//! - The transport and URL-matcher seams
//!
//! ## Key Types
//!
//! ### Request / Response
//! - [`ChainRequest`] - One request, with a reference to the shared cookie store
//! - [`ChainResponse`] - One response, with its resolved (post-redirect) URL
//! - [`ResponseBody`] - Buffered or streaming response body
//!
//! ### Cookies
//! - [`Cookie`] - Snapshot of a stored cookie and its scope
//! - [`CookieStore`] - Internally synchronized RFC 6265 cookie jar
//!
//! ### Chain Control
//! - [`ContinuationDecision`] - Final / Continue / Cancel
//! - [`InteractionPattern`] - Anchored regex over resolved URLs
//! - [`Transport`] - Sends one request
//! - [`UrlMatcher`] - Full-match URL predicate

pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::{BoxError, CoreError, TransportError};

// Re-export all model types
pub use models::{
    // Request / Response
    ChainRequest,
    ChainResponse,
    Method,
    ReleaseHook,
    ResponseBody,
    // Cookies
    Cookie,
    CookieStore,
    // Chain control
    ContinuationDecision,
    DecisionKind,
    InteractionPattern,
};

// Re-export traits
pub use traits::{Transport, UrlMatcher};
