// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # ssochain Fetch
//!
//! Request chain engine, interaction gate and host implementations.
//!
//! A chain sends a request and keeps replacing the response until a
//! continuation step declares one final. For web single sign-on the step is
//! an [`InteractionGate`]: responses whose resolved URL matches the login
//! pattern go to an [`InteractionHandler`], which logs in and answers with
//! the next response.
//!
//! ## Engine
//!
//! - [`chain::RequestChain`] - Iterative chain with async and blocking surfaces
//! - [`chain::InteractiveRequest`] - Chain gated by an interaction pattern
//! - [`gate::InteractionGate`] - Pattern-matching continuation step
//! - [`context::ChainContext`] - Shared transport and settings
//!
//! ## Host Implementations
//!
//! - [`host::http`] - reqwest transport with redirects and cookies
//! - [`host::form`] - Automated HTML form login
//! - [`host::prompt`] - Credential-prompt login
//!
//! ## Example
//!
//! ```ignore
//! use ssochain_fetch::{ChainContext, FormLoginHandler};
//!
//! let ctx = ChainContext::new()?;
//! let handler = Arc::new(
//!     FormLoginHandler::new(ctx.transport.clone())
//!         .with_value("userName", "test")
//!         .with_value("password", "secret"),
//! );
//! let request = ctx.interactive(
//!     ChainRequest::parse_get("https://app.example.com/resource", Arc::new(CookieStore::new()))?,
//!     r".*/providerOAuthLoginPage.*",
//!     handler,
//! )?;
//!
//! request.execute().await?;
//! let response = request.take_response();
//! ```

// Core modules
pub mod chain;
pub mod context;
pub mod error;
pub mod gate;
pub mod host;
pub mod interaction;
pub mod step;

// Re-export key types at crate root

// Errors
pub use error::{ChainError, InteractionError};

// Engine
pub use chain::{
    Chain, ChainCompletion, HopRecord, InteractiveRequest, InteractiveRequestBuilder, RequestChain,
    RequestChainBuilder, RequestFactory, TimeoutPolicy, Wait,
};
pub use context::{ChainContext, ChainContextBuilder, ChainSettings};
pub use gate::{InteractionGate, InteractionGateBuilder};
pub use interaction::{InteractionHandler, InteractionReply};
pub use step::{ContinuationStep, FinalStep};

// Host implementations
pub use host::{
    form::{FormLoginHandler, LoginForm},
    http::{HttpTransport, TransportSettings},
    prompt::{CredentialPrompt, Credentials, PromptLoginHandler, StaticCredentials},
};
