//! Cookie types shared by every hop of a chain.
//!
//! This module contains:
//! - [`Cookie`] - A read-only view of one stored cookie
//! - [`CookieStore`] - The mutable cookie jar shared between requests
//!
//! A [`CookieStore`] is the only piece of state that outlives a single hop.
//! It is shared through an `Arc` by the initial request, by every response it
//! produces, and by any sub-request an interaction handler issues. Matching
//! and storage follow RFC 6265 through the `cookie_store` crate.

use chrono::{DateTime, Utc};
use cookie_store::{
    Cookie as StoredCookie, CookieDomain, CookieError, CookieExpiration, RawCookie, StoreAction,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{trace, warn};
use url::Url;

use crate::error::CoreError;

// ============================================================================
// Cookie
// ============================================================================

/// A cookie as held by a [`CookieStore`].
///
/// Cookies are created by the store from `Set-Cookie` values; this type is
/// the snapshot handed out for inspection and reporting.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie belongs to, without a leading dot.
    pub domain: String,
    /// Path the cookie is valid for.
    pub path: String,
    /// Expiration time. `None` for session cookies.
    pub expires: Option<DateTime<Utc>>,
    /// Whether the cookie requires HTTPS.
    pub secure: bool,
    /// Whether the cookie is HTTP-only.
    pub http_only: bool,
    /// Whether the cookie is only sent to the exact host that set it.
    pub host_only: bool,
}

impl Cookie {
    /// Returns true if the cookie is expired.
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|exp| exp <= Utc::now())
    }
}

impl From<&StoredCookie<'_>> for Cookie {
    fn from(cookie: &StoredCookie<'_>) -> Self {
        let expires = match &cookie.expires {
            CookieExpiration::AtUtc(at) => DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond()),
            CookieExpiration::SessionEnd => None,
        };
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: String::from(&cookie.domain),
            path: String::from(&cookie.path),
            expires,
            secure: cookie.secure().unwrap_or(false),
            http_only: cookie.http_only().unwrap_or(false),
            host_only: matches!(cookie.domain, CookieDomain::HostOnly(_)),
        }
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("host_only", &self.host_only)
            .finish()
    }
}

// ============================================================================
// Cookie Store
// ============================================================================

/// Shared, internally synchronized cookie jar.
///
/// Individual operations are atomic. Chains that logically depend on each
/// other (e.g. one logs in, the next relies on the session) must still be run
/// one after the other by the caller when they share a store.
#[derive(Default)]
pub struct CookieStore {
    inner: RwLock<cookie_store::CookieStore>,
}

impl CookieStore {
    /// Creates an empty cookie store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, cookie_store::CookieStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, cookie_store::CookieStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores one `Set-Cookie` value received from `url`.
    ///
    /// An already expired cookie deletes its stored counterpart, which is how
    /// servers remove cookies. Cookies whose `Domain` does not domain-match
    /// the host of `url` are rejected.
    pub fn parse(&self, set_cookie: &str, url: &Url) -> Result<Cookie, CoreError> {
        let raw = RawCookie::parse(set_cookie.to_owned())
            .map_err(|e| CoreError::InvalidCookie(e.to_string()))?;
        let name = raw.name().to_string();
        let cookie = StoredCookie::try_from_raw_cookie(&raw, url)
            .map_err(|e| CoreError::InvalidCookie(format!("{name}: {e}")))?;
        let snapshot = Cookie::from(&cookie);

        match self.write().insert(cookie, url) {
            Ok(StoreAction::ExpiredExisting) | Err(CookieError::Expired) => {
                trace!(name = %snapshot.name, domain = %snapshot.domain, "Cookie removed");
            }
            Ok(_) => trace!(name = %snapshot.name, domain = %snapshot.domain, "Cookie stored"),
            Err(e) => return Err(CoreError::InvalidCookie(format!("{name}: {e}"))),
        }
        Ok(snapshot)
    }

    /// Stores the `Set-Cookie` values of a response from `url`.
    ///
    /// Returns the cookies that were accepted. Rejected cookies are logged
    /// and skipped.
    pub fn store_response_cookies<'a>(
        &self,
        set_cookies: impl IntoIterator<Item = &'a str>,
        url: &Url,
    ) -> Vec<Cookie> {
        set_cookies
            .into_iter()
            .filter_map(|set_cookie| match self.parse(set_cookie, url) {
                Ok(cookie) => Some(cookie),
                Err(e) => {
                    warn!(url = %url, error = %e, "Rejecting cookie");
                    None
                }
            })
            .collect()
    }

    /// Returns the cookies that would be sent with a request for `url`.
    ///
    /// Cookies with longer paths come first.
    pub fn cookies_for(&self, url: &Url) -> Vec<Cookie> {
        let store = self.read();
        let mut matching = store.matches(url);
        matching.sort_by_key(|c| Reverse(c.path.len()));
        matching.into_iter().map(Cookie::from).collect()
    }

    /// Builds the `Cookie` header value for a request to `url`.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let store = self.read();
        let mut matching = store.matches(url);
        if matching.is_empty() {
            return None;
        }
        matching.sort_by_key(|c| Reverse(c.path.len()));
        Some(
            matching
                .iter()
                .map(|c| {
                    let (name, value) = c.name_value();
                    format!("{name}={value}")
                })
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Looks up an unexpired cookie by name, regardless of scope.
    pub fn get(&self, name: &str) -> Option<Cookie> {
        self.read()
            .iter_unexpired()
            .find(|c| c.name() == name)
            .map(Cookie::from)
    }

    /// Returns a copy of every unexpired cookie.
    pub fn all(&self) -> Vec<Cookie> {
        self.read().iter_unexpired().map(Cookie::from).collect()
    }

    /// Removes every cookie.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Returns the number of unexpired cookies.
    pub fn len(&self) -> usize {
        self.read().iter_unexpired().count()
    }

    /// Returns true if the store holds no unexpired cookies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore").field("len", &self.len()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_domain_cookie_reaches_subdomains() {
        let store = CookieStore::new();
        let cookie = store
            .parse("sid=1; Domain=.example.com", &url("http://login.example.com/"))
            .unwrap();
        assert_eq!(cookie.domain, "example.com");
        assert!(!cookie.host_only);

        assert!(store.header_for(&url("http://example.com/")).is_some());
        assert!(store.header_for(&url("http://app.example.com/")).is_some());
        assert!(store.header_for(&url("http://badexample.com/")).is_none());
        assert!(store.header_for(&url("http://example.org/")).is_none());
    }

    #[test]
    fn test_host_only_cookie() {
        let store = CookieStore::new();
        let cookie = store.parse("sid=1", &url("http://example.com/app/page")).unwrap();
        assert!(cookie.host_only);
        assert_eq!(cookie.path, "/app");

        assert!(store.header_for(&url("http://example.com/app/x")).is_some());
        assert!(store.header_for(&url("http://sub.example.com/app/x")).is_none());
    }

    #[test]
    fn test_foreign_domain_is_rejected() {
        let store = CookieStore::new();
        let result = store.parse("sid=1; Domain=evil.com", &url("http://example.com/"));
        assert!(matches!(result, Err(CoreError::InvalidCookie(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_ip_host_requires_exact_domain() {
        let store = CookieStore::new();
        assert!(store.parse("sid=1; Domain=0.0.1", &url("http://127.0.0.1/")).is_err());
        assert!(store.is_empty());

        store.parse("sid=1", &url("http://127.0.0.1/")).unwrap();
        assert_eq!(store.header_for(&url("http://127.0.0.1/")).as_deref(), Some("sid=1"));
        assert!(store.header_for(&url("http://10.0.0.1/")).is_none());
    }

    #[test]
    fn test_path_matching() {
        let store = CookieStore::new();
        store.parse("a=b; Path=/app", &url("http://example.com/")).unwrap();
        assert!(store.header_for(&url("http://example.com/app")).is_some());
        assert!(store.header_for(&url("http://example.com/app/deep")).is_some());
        assert!(store.header_for(&url("http://example.com/application")).is_none());
        assert!(store.header_for(&url("http://example.com/")).is_none());
    }

    #[test]
    fn test_secure_cookie_not_sent_over_http() {
        let store = CookieStore::new();
        store.parse("a=b; Secure", &url("https://example.com/")).unwrap();
        assert!(store.header_for(&url("https://example.com/")).is_some());
        assert!(store.header_for(&url("http://example.com/")).is_none());
    }

    #[test]
    fn test_same_identity_is_replaced() {
        let store = CookieStore::new();
        let target = url("http://example.com/");
        store.parse("sid=old; Path=/", &target).unwrap();
        store.parse("sid=new; Path=/", &target).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("sid").unwrap().value, "new");
    }

    #[test]
    fn test_expired_cookie_deletes() {
        let store = CookieStore::new();
        let target = url("http://example.com/");
        store.parse("sid=v; Path=/", &target).unwrap();
        let removal = store.parse("sid=; Max-Age=0; Path=/", &target).unwrap();
        assert!(removal.is_expired());
        assert!(store.is_empty());
        assert!(store.get("sid").is_none());
    }

    #[test]
    fn test_header_orders_longer_paths_first() {
        let store = CookieStore::new();
        let target = url("http://example.com/");
        store.parse("root=1; Path=/", &target).unwrap();
        store.parse("deep=2; Path=/app", &target).unwrap();
        assert_eq!(
            store.header_for(&url("http://example.com/app/x")).as_deref(),
            Some("deep=2; root=1")
        );
        assert_eq!(store.header_for(&url("http://example.com/")).as_deref(), Some("root=1"));
        assert_eq!(store.header_for(&url("http://other.com/")), None);
    }

    #[test]
    fn test_response_cookies_skip_rejected() {
        let store = CookieStore::new();
        let accepted = store.store_response_cookies(
            ["a=1; Path=/", "b=2; Domain=other.org", "not a cookie"],
            &url("http://example.com/"),
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].name, "a");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_debug_redacts_value() {
        let store = CookieStore::new();
        let cookie = store.parse("sid=secret-value", &url("http://example.com/")).unwrap();
        assert!(!format!("{cookie:?}").contains("secret-value"));
    }
}
