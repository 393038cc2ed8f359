//! HTTP transport with tracing, redirect following, and domain allowlist.
//!
//! [`HttpTransport`] wraps a reqwest client and adds:
//! - Cookie handling through the request's shared [`CookieStore`]
//! - Redirect following that records `Set-Cookie` from every hop and drops
//!   credentials when a redirect leaves the original host
//! - Domain allowlist for security
//! - Streamed response bodies

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{header, redirect, Client, Response, StatusCode};
use ssochain_core::{ChainRequest, ChainResponse, Cookie, CookieStore, Method, ResponseBody, Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum number of redirects followed per request.
const DEFAULT_MAX_REDIRECTS: usize = 10;

/// User agent string for ssochain.
const USER_AGENT: &str = concat!("ssochain/", env!("CARGO_PKG_VERSION"));

/// Request headers dropped when a redirect changes host or port.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "proxy-authorization", "www-authenticate"];

// ============================================================================
// Transport Settings
// ============================================================================

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Timeout for each request, including reading the headers.
    pub timeout: Duration,
    /// Maximum number of redirects followed for one request.
    pub max_redirects: usize,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Hosts requests may go to. `None` allows all.
    pub allowed_domains: Option<Vec<String>>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: USER_AGENT.to_string(),
            allowed_domains: None,
        }
    }
}

impl TransportSettings {
    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the redirect limit.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Restricts requests to the given domains and their subdomains.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
    settings: TransportSettings,
}

impl HttpTransport {
    /// Creates a transport with default settings.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_settings(TransportSettings::default())
    }

    /// Creates a transport with custom settings.
    ///
    /// Fails only if the TLS backend cannot be initialized.
    pub fn with_settings(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::request("<client>", e))?;

        Ok(Self {
            inner: client,
            settings,
        })
    }

    /// Returns the settings this transport was built with.
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &Url) -> Result<(), TransportError> {
        let Some(ref allowed) = self.settings.allowed_domains else {
            return Ok(()); // No restrictions
        };

        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl(format!("No host in URL: {url}")))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(TransportError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Sends one request without following redirects.
    async fn dispatch(
        &self,
        method: Method,
        url: &Url,
        headers: &[(String, String)],
        body: Option<Bytes>,
        cookie_store: &CookieStore,
    ) -> Result<Response, TransportError> {
        let mut builder = self.inner.request(to_reqwest_method(method), url.clone());
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = cookie_store.header_for(url) {
            builder = builder.header(header::COOKIE, cookies);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        debug!(method = %method, url = %url, "Sending request");
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(url.to_string())
            } else {
                TransportError::request(url.as_str(), e)
            }
        })?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: ChainRequest) -> Result<ChainResponse, TransportError> {
        let ChainRequest {
            mut method,
            mut url,
            mut headers,
            mut body,
            cookie_store,
        } = request;
        let origin = url.to_string();
        let mut set_cookies = Vec::new();
        let mut redirects = 0;

        loop {
            self.is_domain_allowed(&url)?;
            let response = self
                .dispatch(method, &url, &headers, body.clone(), &cookie_store)
                .await?;

            set_cookies.extend(received_cookies(&response, &url, &cookie_store));

            let status = response.status();
            let Some(location) = redirect_location(&response) else {
                return Ok(into_chain_response(response, url, set_cookies, cookie_store));
            };

            redirects += 1;
            if redirects > self.settings.max_redirects {
                return Err(TransportError::TooManyRedirects {
                    url: origin,
                    limit: self.settings.max_redirects,
                });
            }

            let location = location.map_err(|reason| TransportError::InvalidRedirect {
                from: url.to_string(),
                reason,
            })?;
            let next = url.join(&location).map_err(|e| TransportError::InvalidRedirect {
                from: url.to_string(),
                reason: format!("{location}: {e}"),
            })?;
            debug!(status = status.as_u16(), from = %url, to = %next, "Following redirect");

            match status {
                StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => {}
                StatusCode::SEE_OTHER if method != Method::Head => {
                    method = Method::Get;
                    body = None;
                }
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND if method == Method::Post => {
                    method = Method::Get;
                    body = None;
                }
                _ => {}
            }
            if crosses_origin(&url, &next) {
                headers.retain(|(name, _)| !is_sensitive(name));
            }
            if body.is_none() {
                headers.retain(|(name, _)| {
                    !name.eq_ignore_ascii_case("content-type") && !name.eq_ignore_ascii_case("content-length")
                });
            }

            url = next;
        }
    }
}

/// Returns the `Location` of a redirect response, or `None` if the response
/// is not a redirect to follow.
fn redirect_location(response: &Response) -> Option<Result<String, String>> {
    let status = response.status();
    if !status.is_redirection() || status == StatusCode::NOT_MODIFIED {
        return None;
    }
    let location = response.headers().get(header::LOCATION)?;
    Some(
        location
            .to_str()
            .map(str::to_owned)
            .map_err(|e| format!("unreadable Location header: {e}")),
    )
}

fn into_chain_response(
    response: Response,
    url: Url,
    set_cookies: Vec<Cookie>,
    cookie_store: Arc<CookieStore>,
) -> ChainResponse {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())));

    ChainResponse::new(status, url, cookie_store)
        .with_headers(headers)
        .with_set_cookies(set_cookies)
        .with_body(ResponseBody::from_stream(body))
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Patch => reqwest::Method::PATCH,
    }
}

/// Returns true if a redirect from `from` to `to` leaves the original host.
fn crosses_origin(from: &Url, to: &Url) -> bool {
    from.host_str() != to.host_str() || from.port_or_known_default() != to.port_or_known_default()
}

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|sensitive| name.eq_ignore_ascii_case(sensitive))
}

/// Writes the `Set-Cookie` headers of `response` into the store and returns
/// the cookies it accepted.
fn received_cookies(response: &Response, url: &Url, cookie_store: &CookieStore) -> Vec<Cookie> {
    let values = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok());
    cookie_store.store_response_cookies(values, url)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(domains: Option<Vec<&str>>) -> HttpTransport {
        let mut settings = TransportSettings::default();
        if let Some(domains) = domains {
            settings = settings.with_allowed_domains(domains.into_iter().map(String::from).collect());
        }
        HttpTransport::with_settings(settings).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_domain_allowlist() {
        let transport = transport(Some(vec!["sso.example.com", "example.org"]));

        // Allowed domains
        assert!(transport.is_domain_allowed(&url("https://sso.example.com/login")).is_ok());
        assert!(transport.is_domain_allowed(&url("https://example.org/")).is_ok());

        // Subdomain matching
        assert!(transport.is_domain_allowed(&url("https://api.example.org/v1")).is_ok());

        // Not allowed
        assert!(matches!(
            transport.is_domain_allowed(&url("https://evil.com/steal")),
            Err(TransportError::DomainNotAllowed(_))
        ));
        assert!(transport.is_domain_allowed(&url("https://notexample.org/")).is_err());
    }

    #[test]
    fn test_no_domain_restrictions() {
        let transport = transport(None);
        assert!(transport.is_domain_allowed(&url("https://any.domain.com")).is_ok());
    }

    #[test]
    fn test_url_without_host_is_rejected_with_allowlist() {
        let transport = transport(Some(vec!["example.com"]));
        assert!(matches!(
            transport.is_domain_allowed(&url("data:text/plain,hello")),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_default_settings() {
        let settings = TransportSettings::default();
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.max_redirects, 10);
        assert!(settings.user_agent.starts_with("ssochain/"));
        assert!(settings.allowed_domains.is_none());
    }

    #[test]
    fn test_cross_origin_detection() {
        assert!(!crosses_origin(&url("http://a.com/x"), &url("http://a.com:80/y")));
        assert!(crosses_origin(&url("http://a.com/x"), &url("http://b.com/x")));
        assert!(crosses_origin(&url("http://a.com/x"), &url("http://a.com:8080/x")));
        assert!(is_sensitive("Authorization"));
        assert!(!is_sensitive("Accept"));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(Method::Post), reqwest::Method::POST);
        assert_eq!(to_reqwest_method(Method::Head), reqwest::Method::HEAD);
    }
}
