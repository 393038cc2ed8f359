//! Chain error types.

use std::time::Duration;
use thiserror::Error;

use ssochain_core::{CoreError, TransportError};

// ============================================================================
// Chain Error
// ============================================================================

/// Error type for chain operations.
///
/// One invocation of a chain ends in exactly one of: a final response,
/// [`ChainError::Timeout`], [`ChainError::Canceled`], or a propagated failure.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain was misconfigured; detected before anything is sent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Core error (invalid pattern, URL or request).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A hop failed in the transport. Never retried.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The caller's wait elapsed before the chain completed.
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// The interaction handler canceled the chain.
    #[error("Request handling canceled")]
    Canceled,

    /// The interaction handler failed.
    #[error("Interaction failed: {0}")]
    Interaction(#[from] InteractionError),

    /// The task running the chain ended without reporting.
    #[error("Chain task failed: {0}")]
    Runtime(String),
}

impl ChainError {
    /// Returns true for [`ChainError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns true for [`ChainError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

// ============================================================================
// Interaction Error
// ============================================================================

/// Error type for interaction handlers.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// A sub-request of the interaction failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The login page did not contain a form.
    #[error("No login form found at {0}")]
    FormNotFound(String),

    /// The form selector did not parse.
    #[error("Invalid form selector: {0}")]
    InvalidSelector(String),

    /// The form action could not be resolved to a URL.
    #[error("Invalid form action: {0}")]
    InvalidFormAction(String),

    /// Asking for credentials failed.
    #[error("Credential prompt failed: {0}")]
    Prompt(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_helpers() {
        assert!(ChainError::Timeout(Duration::ZERO).is_timeout());
        assert!(ChainError::Canceled.is_canceled());
        assert!(!ChainError::Configuration("x".into()).is_canceled());
    }

    #[test]
    fn test_messages() {
        assert_eq!(ChainError::Canceled.to_string(), "Request handling canceled");
        let err: ChainError = TransportError::DomainNotAllowed("evil.com".into()).into();
        assert_eq!(err.to_string(), "Transport error: Domain not allowed: evil.com");
    }
}
