//! CLI configuration file.
//!
//! The file is JSON and optional. Every key may be omitted:
//!
//! ```json
//! {
//!   "wait_secs": 60,
//!   "request_timeout_secs": 30,
//!   "max_redirects": 10,
//!   "timeout_policy": "cancel_chain",
//!   "allowed_domains": ["example.com"],
//!   "login_pattern": ".*/providerOAuthLoginPage.*",
//!   "form_fields": { "userName": "test" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ssochain_fetch::{ChainSettings, TimeoutPolicy, TransportSettings, Wait};
use tracing::debug;

/// Returns the default config file path.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ssochain").join("config.json"))
}

/// Settings read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// How long to wait for a chain; unset waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_secs: Option<u64>,
    /// Per-request transport timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Redirect limit per request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,
    /// User agent override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// What happens to a chain when the wait times out.
    pub timeout_policy: TimeoutPolicy,
    /// Hosts requests may go to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    /// Default login pattern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_pattern: Option<String>,
    /// Default login form values.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub form_fields: BTreeMap<String, String>,
}

impl CliConfig {
    /// Loads the config.
    ///
    /// An explicit path must exist. A missing file at the default location
    /// yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Loads the config from `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Wait derived from `wait_secs`.
    pub fn wait(&self) -> Wait {
        self.wait_secs.map(Duration::from_secs).into()
    }

    /// Builds chain settings from the config.
    pub fn chain_settings(&self) -> ChainSettings {
        let mut transport = TransportSettings::default();
        if let Some(secs) = self.request_timeout_secs {
            transport = transport.with_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_redirects {
            transport = transport.with_max_redirects(max);
        }
        if let Some(agent) = &self.user_agent {
            transport = transport.with_user_agent(agent.clone());
        }
        if let Some(domains) = &self.allowed_domains {
            transport = transport.with_allowed_domains(domains.clone());
        }

        ChainSettings::default()
            .with_wait(self.wait())
            .with_timeout_policy(self.timeout_policy)
            .with_transport(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "wait_secs": 5,
                "request_timeout_secs": 2,
                "max_redirects": 3,
                "timeout_policy": "detach",
                "allowed_domains": ["example.com"],
                "login_pattern": ".*/login.*",
                "form_fields": {{ "userName": "test" }}
            }}"#
        )
        .unwrap();

        let config = CliConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.wait(), Wait::For(Duration::from_secs(5)));
        assert_eq!(config.timeout_policy, TimeoutPolicy::Detach);
        assert_eq!(config.form_fields.get("userName").map(String::as_str), Some("test"));

        let settings = config.chain_settings();
        assert_eq!(settings.transport.timeout, Duration::from_secs(2));
        assert_eq!(settings.transport.max_redirects, 3);
        assert_eq!(
            settings.transport.allowed_domains,
            Some(vec!["example.com".to_string()])
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.wait(), Wait::Infinite);
        assert_eq!(config.chain_settings().timeout_policy, TimeoutPolicy::CancelChain);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn test_invalid_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "timeout_policy": "sometimes" }"#).unwrap();
        assert!(CliConfig::load(Some(&path)).is_err());
    }
}
