//! Request descriptor submitted to a chain.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

use super::cookie::CookieStore;
use crate::error::CoreError;

// ============================================================================
// Method
// ============================================================================

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// PATCH
    Patch,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "PATCH" => Ok(Self::Patch),
            other => Err(CoreError::InvalidConfig(format!("Unsupported method: {other}"))),
        }
    }
}

// ============================================================================
// Chain Request
// ============================================================================

/// One HTTP request in a chain.
///
/// Every request carries a reference to the cookie store it reads from and
/// writes to. Requests issued while resolving the same logical request share
/// one store.
#[derive(Debug, Clone)]
pub struct ChainRequest {
    /// Request method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Request headers, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Bytes>,
    /// Shared cookie store.
    pub cookie_store: Arc<CookieStore>,
}

impl ChainRequest {
    /// Creates a request with no headers or body.
    pub fn new(method: Method, url: Url, cookie_store: Arc<CookieStore>) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            cookie_store,
        }
    }

    /// Creates a GET request.
    pub fn get(url: Url, cookie_store: Arc<CookieStore>) -> Self {
        Self::new(Method::Get, url, cookie_store)
    }

    /// Parses `url` and creates a GET request.
    pub fn parse_get(url: &str, cookie_store: Arc<CookieStore>) -> Result<Self, CoreError> {
        let url = Url::parse(url).map_err(|e| CoreError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::get(url, cookie_store))
    }

    /// Creates a POST request with an `application/x-www-form-urlencoded` body.
    pub fn post_form<K, V>(
        url: Url,
        cookie_store: Arc<CookieStore>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        Self::new(Method::Post, url, cookie_store)
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(body)
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the path and query of the target URL, e.g. `/resource?a=b`.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn test_post_form_encodes_body() {
        let store = Arc::new(CookieStore::new());
        let req = ChainRequest::post_form(
            Url::parse("http://x/login").unwrap(),
            store,
            [("userName", "test user"), ("password", "a&b")],
        );
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(
            req.body.as_deref(),
            Some(b"userName=test+user&password=a%26b".as_slice())
        );
    }

    #[test]
    fn test_path_and_query() {
        let store = Arc::new(CookieStore::new());
        let req = ChainRequest::parse_get("http://x/res?a=b", store.clone()).unwrap();
        assert_eq!(req.path_and_query(), "/res?a=b");
        assert!(ChainRequest::parse_get("not a url", store).is_err());
    }
}
