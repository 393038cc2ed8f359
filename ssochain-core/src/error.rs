//! Core error types for ssochain.

use thiserror::Error;

/// Boxed error used as a transport failure source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for building requests and patterns.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Interaction pattern failed to compile.
    #[error("Invalid interaction pattern: {0}")]
    InvalidPattern(String),

    /// URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A `Set-Cookie` value was malformed or rejected for its origin.
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Error raised while sending a request or receiving its response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the response headers not received.
    #[error("Request to {url} failed: {source}")]
    Request {
        /// URL of the failed request.
        url: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// The request timed out at the transport level.
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Too many redirects were followed.
    #[error("Too many redirects (limit {limit}) starting at {url}")]
    TooManyRedirects {
        /// URL of the original request.
        url: String,
        /// Configured redirect limit.
        limit: usize,
    },

    /// A redirect response carried no usable `Location`.
    #[error("Invalid redirect from {from}: {reason}")]
    InvalidRedirect {
        /// URL that answered with the redirect.
        from: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Target host is not in the transport's allowlist.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Reading the response body failed.
    #[error("Body error: {0}")]
    Body(String),
}

impl TransportError {
    /// Wraps any error as a request failure for `url`.
    pub fn request(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Request {
            url: url.into(),
            source: source.into(),
        }
    }
}
