//! Continuation step trait.
//!
//! A continuation step looks at the response of the current hop and decides
//! whether the chain is done, should continue with a replacement response, or
//! was canceled. The [`InteractionGate`](crate::gate::InteractionGate) is the
//! step used for web single sign-on.

use async_trait::async_trait;
use ssochain_core::{ChainResponse, ContinuationDecision};

use crate::error::ChainError;

// ============================================================================
// Continuation Step Trait
// ============================================================================

/// Decides what happens after each hop.
///
/// ## Implementing a Step
///
/// ```ignore
/// struct FollowMetaRefresh {
///     transport: Arc<dyn Transport>,
/// }
///
/// #[async_trait]
/// impl ContinuationStep for FollowMetaRefresh {
///     async fn decide(&self, response: &mut ChainResponse) -> Result<ContinuationDecision, ChainError> {
///         let Some(target) = meta_refresh_target(response).await? else {
///             return Ok(ContinuationDecision::Final);
///         };
///         let next = self.transport.send(ChainRequest::get(target, response.cookie_store().clone())).await?;
///         Ok(ContinuationDecision::Continue(next))
///     }
/// }
/// ```
///
/// The step borrows the response; the engine releases it afterwards unless
/// the decision is [`ContinuationDecision::Final`]. A step that never returns
/// `Final` or `Cancel` keeps the chain running forever.
#[async_trait]
pub trait ContinuationStep: Send + Sync {
    /// Inspects `response` and returns the decision for this hop.
    async fn decide(&self, response: &mut ChainResponse) -> Result<ContinuationDecision, ChainError>;
}

// ============================================================================
// Final Step
// ============================================================================

/// Step that accepts the first response as final.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalStep;

#[async_trait]
impl ContinuationStep for FinalStep {
    async fn decide(&self, _response: &mut ChainResponse) -> Result<ContinuationDecision, ChainError> {
        Ok(ContinuationDecision::Final)
    }
}

// ============================================================================
// Tests
// ============================================================================
