//! Domain models for ssochain.
//!
//! ## Submodules
//!
//! - [`cookie`] - Cookies and the shared cookie store
//! - [`request`] - Request descriptor (ChainRequest, Method)
//! - [`response`] - Response with resolved URL and owned body
//! - [`decision`] - Continuation decisions
//! - [`pattern`] - Anchored interaction patterns

mod cookie;
mod decision;
mod pattern;
mod request;
mod response;

pub use cookie::{Cookie, CookieStore};
pub use decision::{ContinuationDecision, DecisionKind};
pub use pattern::InteractionPattern;
pub use request::{ChainRequest, Method};
pub use response::{ChainResponse, ReleaseHook, ResponseBody};
