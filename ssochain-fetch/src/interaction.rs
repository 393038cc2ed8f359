//! Interaction handler contract.
//!
//! An interaction handler is called when a response needs something plain
//! HTTP cannot provide, typically a login. It receives the triggering
//! response and a single-use [`InteractionReply`]. Because the reply is
//! consumed when used, a handler can answer at most once; the gate treats a
//! reply that is dropped unanswered as a cancellation.

use async_trait::async_trait;
use ssochain_core::{ChainResponse, ContinuationDecision};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::InteractionError;

// ============================================================================
// Interaction Handler Trait
// ============================================================================

/// Performs the interactive step of a chain.
///
/// Implementors must:
/// - Not keep the triggering response; it is only borrowed for this call
/// - Resolve `reply` exactly once, now or later, from any thread
/// - Issue follow-up requests with the response's cookie store
///
/// Returning an error aborts the chain with that error.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "interaction"
    }

    /// Runs the interaction for `response`.
    async fn interact(
        &self,
        response: &mut ChainResponse,
        reply: InteractionReply,
    ) -> Result<(), InteractionError>;
}

// ============================================================================
// Interaction Reply
// ============================================================================

/// Single-use reply an interaction handler resolves.
#[derive(Debug)]
pub struct InteractionReply {
    tx: oneshot::Sender<ContinuationDecision>,
}

impl InteractionReply {
    /// Creates a reply and the receiver that observes it.
    ///
    /// The gate does this for every interaction; it is public so handlers can
    /// be driven directly.
    pub fn channel() -> (Self, oneshot::Receiver<ContinuationDecision>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Resolves the interaction from a `(next response, cancel)` pair.
    ///
    /// `cancel` wins over `next`. With neither, the triggering response
    /// becomes the final response.
    pub fn send(self, next: Option<ChainResponse>, cancel: bool) {
        self.resolve(ContinuationDecision::from_parts(next, cancel));
    }

    /// Continues the chain with `next`.
    pub fn continue_with(self, next: ChainResponse) {
        self.resolve(ContinuationDecision::Continue(next));
    }

    /// Cancels the chain.
    pub fn cancel(self) {
        self.resolve(ContinuationDecision::Cancel);
    }

    /// Accepts the triggering response as final.
    pub fn finish(self) {
        self.resolve(ContinuationDecision::Final);
    }

    /// Returns true if nobody is waiting for this reply any more.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn resolve(self, decision: ContinuationDecision) {
        if let Err(decision) = self.tx.send(decision) {
            debug!(decision = %decision.kind(), "Interaction resolved after chain stopped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
