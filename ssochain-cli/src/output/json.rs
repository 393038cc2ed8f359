//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;
use ssochain_core::{ChainResponse, Cookie};
use ssochain_fetch::HopRecord;

// ============================================================================
// Output Types
// ============================================================================

/// JSON report for one fetched URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub url: String,
    pub resolved_url: String,
    pub status: u16,
    pub hops: Vec<HopOutput>,
    pub cookies: Vec<CookieOutput>,
    pub body: String,
}

/// One hop of the chain.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HopOutput {
    pub index: usize,
    pub status: u16,
    pub resolved_url: String,
    pub decision: String,
    pub elapsed_ms: u64,
}

/// A cookie left in the store. Values are never printed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieOutput {
    pub name: String,
    pub domain: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

impl FetchReport {
    /// Builds a report from the final response of a chain.
    pub fn new(
        url: &str,
        response: &ChainResponse,
        body: &[u8],
        hops: &[HopRecord],
        cookies: &[Cookie],
    ) -> Self {
        Self {
            url: url.to_string(),
            resolved_url: response.resolved_url().to_string(),
            status: response.status(),
            hops: hops.iter().map(HopOutput::from).collect(),
            cookies: cookies.iter().map(CookieOutput::from).collect(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

impl From<&HopRecord> for HopOutput {
    fn from(hop: &HopRecord) -> Self {
        Self {
            index: hop.index,
            status: hop.status,
            resolved_url: hop.resolved_url.clone(),
            decision: hop.decision.to_string(),
            elapsed_ms: u64::try_from(hop.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<&Cookie> for CookieOutput {
    fn from(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            expires: cookie.expires.map(|e| e.to_rfc3339()),
        }
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ssochain_core::{CookieStore, DecisionKind};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    fn report() -> FetchReport {
        let url = Url::parse("http://x/home").unwrap();
        let response = ChainResponse::new(200, url.clone(), Arc::new(CookieStore::new()));
        let hops = [
            HopRecord {
                index: 1,
                status: 200,
                resolved_url: "http://x/login".to_string(),
                decision: DecisionKind::Continue,
                elapsed: Duration::from_millis(12),
            },
            HopRecord {
                index: 2,
                status: 200,
                resolved_url: "http://x/home".to_string(),
                decision: DecisionKind::Final,
                elapsed: Duration::from_millis(30),
            },
        ];
        let cookies = [CookieStore::new().parse("session=secret-value", &url).unwrap()];
        FetchReport::new("http://x/resource", &response, b"Home page", &hops, &cookies)
    }

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_report_fields() {
        let output = JsonFormatter::new(false).format(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["resolvedUrl"], "http://x/home");
        assert_eq!(value["status"], 200);
        assert_eq!(value["body"], "Home page");
        assert_eq!(value["hops"][0]["decision"], "continue");
        assert_eq!(value["hops"][1]["elapsedMs"], 30);
        assert_eq!(value["cookies"][0]["name"], "session");
        assert!(value["cookies"][0].get("expires").is_none());
    }

    #[test]
    fn test_cookie_values_are_not_printed() {
        let output = JsonFormatter::new(false).format(&report()).unwrap();
        assert!(!output.contains("secret-value"));
    }
}
