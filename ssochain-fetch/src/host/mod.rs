//! Host implementations for ssochain chains.
//!
//! This module provides the pieces that talk to the outside world:
//!
//! - [`http`] - reqwest transport with redirects, cookies and domain allowlist
//! - [`form`] - interaction handler that submits HTML login forms
//! - [`prompt`] - interaction handler that posts prompted credentials

pub mod form;
pub mod http;
pub mod prompt;

// Re-export key types
pub use form::{FormLoginHandler, LoginForm};
pub use http::{HttpTransport, TransportSettings};
pub use prompt::{CredentialPrompt, Credentials, PromptLoginHandler, StaticCredentials};
