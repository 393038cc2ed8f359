//! Chain context shared by the chains of one application.
//!
//! The chain context bundles the transport, the runtime chains are spawned
//! on, and the settings every new chain starts with.

use std::sync::Arc;
use std::time::Duration;

use ssochain_core::{ChainRequest, Transport};
use tokio::runtime::Handle;

use crate::chain::{InteractiveRequest, InteractiveRequestBuilder, RequestChain, TimeoutPolicy, Wait};
use crate::error::ChainError;
use crate::host::http::{HttpTransport, TransportSettings};
use crate::interaction::InteractionHandler;

// ============================================================================
// Chain Settings
// ============================================================================

/// Settings for chains created from a [`ChainContext`].
#[derive(Debug, Clone, Default)]
pub struct ChainSettings {
    /// Default wait for blocking callers.
    pub wait: Wait,
    /// What happens to a chain when a blocking wait times out.
    pub timeout_policy: TimeoutPolicy,
    /// Settings for the default HTTP transport.
    pub transport: TransportSettings,
}

impl ChainSettings {
    /// Sets the default wait.
    pub fn with_wait(mut self, wait: impl Into<Wait>) -> Self {
        self.wait = wait.into();
        self
    }

    /// Sets the timeout policy.
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Sets the transport settings.
    pub fn with_transport(mut self, transport: TransportSettings) -> Self {
        self.transport = transport;
        self
    }
}

// ============================================================================
// Chain Context
// ============================================================================

/// Factory for chains sharing one transport and one set of settings.
pub struct ChainContext {
    /// Transport used by every chain and by the built-in handlers.
    pub transport: Arc<dyn Transport>,
    /// Chain settings.
    pub settings: ChainSettings,
    runtime: Option<Handle>,
}

impl ChainContext {
    /// Creates a context with an [`HttpTransport`] and default settings.
    pub fn new() -> Result<Self, ChainError> {
        Self::with_settings(ChainSettings::default())
    }

    /// Creates a context with an [`HttpTransport`] built from `settings`.
    pub fn with_settings(settings: ChainSettings) -> Result<Self, ChainError> {
        Self::builder().settings(settings).build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> ChainContextBuilder {
        ChainContextBuilder::new()
    }

    /// Default wait for blocking callers.
    pub fn wait(&self) -> Wait {
        self.settings.wait
    }

    /// Creates a plain chain for `request`.
    pub fn chain(&self, request: ChainRequest) -> Result<RequestChain, ChainError> {
        let mut builder = RequestChain::builder(Arc::clone(&self.transport))
            .request(request)
            .timeout_policy(self.settings.timeout_policy);
        if let Some(runtime) = &self.runtime {
            builder = builder.runtime(runtime.clone());
        }
        builder.build()
    }

    /// Starts an interactive request builder preconfigured with this context.
    pub fn interactive_builder(&self) -> InteractiveRequestBuilder {
        let mut builder = InteractiveRequest::builder(Arc::clone(&self.transport))
            .timeout_policy(self.settings.timeout_policy);
        if let Some(runtime) = &self.runtime {
            builder = builder.runtime(runtime.clone());
        }
        builder
    }

    /// Creates an interactive request for `request`.
    ///
    /// Responses whose resolved URL matches `pattern` in full are handed to
    /// `handler`.
    pub fn interactive(
        &self,
        request: ChainRequest,
        pattern: &str,
        handler: Arc<dyn InteractionHandler>,
    ) -> Result<InteractiveRequest, ChainError> {
        self.interactive_builder()
            .request(request)
            .pattern(pattern)
            .handler(handler)
            .build()
    }
}

impl std::fmt::Debug for ChainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Chain Context Builder
// ============================================================================

/// Builder for constructing a `ChainContext`.
#[derive(Default)]
pub struct ChainContextBuilder {
    transport: Option<Arc<dyn Transport>>,
    runtime: Option<Handle>,
    settings: ChainSettings,
}

impl ChainContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport. Defaults to an [`HttpTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the runtime chains are spawned on.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the chain settings.
    pub fn settings(mut self, settings: ChainSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the default wait.
    pub fn wait(mut self, wait: impl Into<Wait>) -> Self {
        self.settings.wait = wait.into();
        self
    }

    /// Sets the timeout policy.
    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.settings.timeout_policy = policy;
        self
    }

    /// Sets the per-request transport timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.transport.timeout = timeout;
        self
    }

    /// Builds the chain context.
    pub fn build(self) -> Result<ChainContext, ChainError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::with_settings(self.settings.transport.clone())?),
        };

        Ok(ChainContext {
            transport,
            settings: self.settings,
            runtime: self.runtime,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::form::FormLoginHandler;
    use ssochain_core::CookieStore;

    #[test]
    fn test_context_builder() {
        let ctx = ChainContext::builder()
            .wait(Duration::from_secs(5))
            .timeout_policy(TimeoutPolicy::Detach)
            .request_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(ctx.wait(), Wait::For(Duration::from_secs(5)));
        assert_eq!(ctx.settings.timeout_policy, TimeoutPolicy::Detach);
        assert_eq!(ctx.settings.transport.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_default_context() {
        let ctx = ChainContext::new().unwrap();
        assert_eq!(ctx.wait(), Wait::Infinite);
        assert_eq!(ctx.settings.timeout_policy, TimeoutPolicy::CancelChain);
    }

    #[test]
    fn test_chains_inherit_policy() {
        let ctx = ChainContext::builder()
            .timeout_policy(TimeoutPolicy::Detach)
            .build()
            .unwrap();
        let request = ChainRequest::parse_get("http://x/", Arc::new(CookieStore::new())).unwrap();
        let chain = ctx.chain(request).unwrap();
        assert_eq!(chain.timeout_policy(), TimeoutPolicy::Detach);
    }

    #[test]
    fn test_interactive_rejects_bad_pattern() {
        let ctx = ChainContext::new().unwrap();
        let request = ChainRequest::parse_get("http://x/", Arc::new(CookieStore::new())).unwrap();
        let handler = Arc::new(FormLoginHandler::new(Arc::clone(&ctx.transport)));
        assert!(ctx.interactive(request, "(", handler).is_err());
    }
}
