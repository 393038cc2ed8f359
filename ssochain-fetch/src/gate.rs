//! Interaction gate.
//!
//! The gate is the continuation step for web single sign-on: it matches the
//! resolved URL of each response against a pattern and hands matching
//! responses to an [`InteractionHandler`].

use async_trait::async_trait;
use ssochain_core::{ChainResponse, ContinuationDecision, InteractionPattern, UrlMatcher};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::ChainError;
use crate::interaction::{InteractionHandler, InteractionReply};
use crate::step::ContinuationStep;

// ============================================================================
// Interaction Gate
// ============================================================================

/// Continuation step that routes responses needing interaction to a handler.
///
/// - No pattern: every response is final.
/// - Resolved URL does not match in full: the response is final.
/// - Match: the handler decides through its reply.
pub struct InteractionGate {
    matcher: Option<Arc<dyn UrlMatcher>>,
    handler: Option<Arc<dyn InteractionHandler>>,
}

impl InteractionGate {
    /// Creates a gate that never asks for interaction.
    pub fn passthrough() -> Self {
        Self {
            matcher: None,
            handler: None,
        }
    }

    /// Creates a gate from a compiled pattern and a handler.
    pub fn new(pattern: InteractionPattern, handler: Arc<dyn InteractionHandler>) -> Self {
        Self {
            matcher: Some(Arc::new(pattern)),
            handler: Some(handler),
        }
    }

    /// Creates a builder.
    pub fn builder() -> InteractionGateBuilder {
        InteractionGateBuilder::new()
    }

    /// Returns true if a pattern is configured.
    pub fn has_pattern(&self) -> bool {
        self.matcher.is_some()
    }

    /// Returns true if `response` would be handed to the handler.
    pub fn requires_interaction(&self, response: &ChainResponse) -> bool {
        self.matcher
            .as_ref()
            .is_some_and(|m| m.matches(response.resolved_url().as_str()))
    }
}

impl fmt::Debug for InteractionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionGate")
            .field("has_pattern", &self.matcher.is_some())
            .field("handler", &self.handler.as_ref().map(|h| h.name().to_string()))
            .finish()
    }
}

#[async_trait]
impl ContinuationStep for InteractionGate {
    #[instrument(skip_all, fields(url = %response.resolved_url(), status = response.status()))]
    async fn decide(&self, response: &mut ChainResponse) -> Result<ContinuationDecision, ChainError> {
        if !self.requires_interaction(response) {
            debug!("No interaction required");
            return Ok(ContinuationDecision::Final);
        }

        // Checked by the builder; a gate built with `new` always has both.
        let Some(handler) = &self.handler else {
            return Err(ChainError::Configuration(
                "Interaction pattern matched but no handler is configured".to_string(),
            ));
        };

        info!(handler = %handler.name(), "Interaction required");

        let (reply, decision) = InteractionReply::channel();
        handler.interact(response, reply).await?;

        match decision.await {
            Ok(decision) => {
                debug!(handler = %handler.name(), decision = %decision.kind(), "Interaction resolved");
                Ok(decision)
            }
            Err(_) => {
                warn!(handler = %handler.name(), "Interaction reply dropped without an answer, canceling");
                Ok(ContinuationDecision::Cancel)
            }
        }
    }
}

// ============================================================================
// Interaction Gate Builder
// ============================================================================

/// Builder for an [`InteractionGate`].
#[derive(Default)]
pub struct InteractionGateBuilder {
    pattern: Option<String>,
    matcher: Option<Arc<dyn UrlMatcher>>,
    handler: Option<Arc<dyn InteractionHandler>>,
}

impl InteractionGateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interaction pattern, compiled on [`build`](Self::build).
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Sets an already constructed matcher. Overrides [`pattern`](Self::pattern).
    pub fn matcher(mut self, matcher: Arc<dyn UrlMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Sets the interaction handler.
    pub fn handler(mut self, handler: Arc<dyn InteractionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Builds the gate.
    ///
    /// Fails when the pattern does not compile or when a pattern is set
    /// without a handler.
    pub fn build(self) -> Result<InteractionGate, ChainError> {
        let matcher = match (self.matcher, self.pattern) {
            (Some(matcher), _) => Some(matcher),
            (None, Some(pattern)) => {
                Some(Arc::new(InteractionPattern::new(&pattern)?) as Arc<dyn UrlMatcher>)
            }
            (None, None) => None,
        };

        if matcher.is_some() && self.handler.is_none() {
            return Err(ChainError::Configuration(
                "An interaction pattern requires an interaction handler".to_string(),
            ));
        }
        if matcher.is_none() && self.handler.is_some() {
            debug!("Interaction handler configured without a pattern; it will never be used");
        }

        Ok(InteractionGate {
            matcher,
            handler: self.handler,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
