//! Response produced by one hop of a chain.
//!
//! A [`ChainResponse`] owns its body. Releasing a response means dropping it:
//! the body stream and the underlying connection go with it, and the release
//! hook (if any) runs exactly once.

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use url::Url;

use super::cookie::{Cookie, CookieStore};
use crate::error::TransportError;

/// Callback run when a response is released.
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

// ============================================================================
// Response Body
// ============================================================================

/// Body of a [`ChainResponse`].
#[derive(Default)]
pub enum ResponseBody {
    /// No body.
    #[default]
    Empty,
    /// Body held in memory.
    Buffered(Bytes),
    /// Body still being received.
    Streaming(BoxStream<'static, Result<Bytes, TransportError>>),
}

impl ResponseBody {
    /// Wraps a byte stream.
    pub fn from_stream(
        stream: impl futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    ) -> Self {
        Self::Streaming(stream.boxed())
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::Buffered(bytes)
    }
}

impl From<&'static str> for ResponseBody {
    fn from(s: &'static str) -> Self {
        Self::Buffered(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for ResponseBody {
    fn from(s: String) -> Self {
        Self::Buffered(Bytes::from(s))
    }
}

// ============================================================================
// Chain Response
// ============================================================================

/// One HTTP response in a chain.
pub struct ChainResponse {
    status: u16,
    resolved_url: Url,
    headers: Vec<(String, String)>,
    set_cookies: Vec<Cookie>,
    body: ResponseBody,
    cookie_store: Arc<CookieStore>,
    on_release: Option<ReleaseHook>,
}

impl ChainResponse {
    /// Creates a response with an empty body.
    ///
    /// `resolved_url` is the address the response was finally served from,
    /// after any transport-level redirects.
    pub fn new(status: u16, resolved_url: Url, cookie_store: Arc<CookieStore>) -> Self {
        Self {
            status,
            resolved_url,
            headers: Vec::new(),
            set_cookies: Vec::new(),
            body: ResponseBody::Empty,
            cookie_store,
            on_release: None,
        }
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the headers.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Records the cookies this response set.
    pub fn with_set_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.set_cookies = cookies;
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<ResponseBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Registers a hook that runs when the response is released.
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Address after following redirects.
    pub fn resolved_url(&self) -> &Url {
        &self.resolved_url
    }

    /// Response headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Cookies set while producing this response, across all redirects.
    pub fn set_cookies(&self) -> &[Cookie] {
        &self.set_cookies
    }

    /// Cookie store of the request that produced this response.
    pub fn cookie_store(&self) -> &Arc<CookieStore> {
        &self.cookie_store
    }

    /// Reads the whole body.
    ///
    /// A streaming body is buffered on first read, so later reads return the
    /// same bytes.
    pub async fn bytes(&mut self) -> Result<Bytes, TransportError> {
        match std::mem::take(&mut self.body) {
            ResponseBody::Empty => Ok(Bytes::new()),
            ResponseBody::Buffered(bytes) => {
                self.body = ResponseBody::Buffered(bytes.clone());
                Ok(bytes)
            }
            ResponseBody::Streaming(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                let bytes = buf.freeze();
                self.body = ResponseBody::Buffered(bytes.clone());
                Ok(bytes)
            }
        }
    }

    /// Reads the whole body as UTF-8 text.
    pub async fn text(&mut self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| TransportError::Body(e.to_string()))
    }

    /// Takes the body out of the response, leaving it empty.
    pub fn take_body(&mut self) -> ResponseBody {
        std::mem::take(&mut self.body)
    }

    /// Releases the response.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ChainResponse {
    fn drop(&mut self) {
        trace!(status = self.status, url = %self.resolved_url, "Response released");
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl fmt::Debug for ChainResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainResponse")
            .field("status", &self.status)
            .field("resolved_url", &self.resolved_url.as_str())
            .field("headers", &self.headers.len())
            .field("set_cookies", &self.set_cookies.len())
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response() -> ChainResponse {
        ChainResponse::new(
            200,
            Url::parse("http://x/home").unwrap(),
            Arc::new(CookieStore::new()),
        )
    }

    #[tokio::test]
    async fn test_streamed_body_is_buffered_once_read() {
        let chunks = vec![Ok(Bytes::from_static(b"Hel")), Ok(Bytes::from_static(b"lo"))];
        let mut resp = response().with_body(ResponseBody::from_stream(futures::stream::iter(chunks)));

        assert_eq!(resp.text().await.unwrap(), "Hello");
        assert_eq!(resp.text().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_stream_error_surfaces() {
        let chunks = vec![
            Ok(Bytes::from_static(b"part")),
            Err(TransportError::Body("connection reset".into())),
        ];
        let mut resp = response().with_body(ResponseBody::from_stream(futures::stream::iter(chunks)));
        assert!(matches!(resp.bytes().await, Err(TransportError::Body(_))));
    }

    #[test]
    fn test_release_hook_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let resp = response().on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        resp.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let resp = response().with_header("Content-Type", "text/html");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("location"), None);
        assert!(resp.is_success());
    }
}
