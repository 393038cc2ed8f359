//! URL patterns that detect responses requiring interaction.

use regex::Regex;
use std::fmt;

use crate::error::CoreError;
use crate::traits::UrlMatcher;

/// Regular expression matched against the whole resolved URL.
///
/// The pattern is always anchored at both ends: `.*/login.*` matches
/// `http://x/login?a=b` but `/login` does not, because it would only match a
/// substring.
#[derive(Clone)]
pub struct InteractionPattern {
    source: String,
    regex: Regex,
}

impl InteractionPattern {
    /// Compiles a pattern.
    pub fn new(pattern: &str) -> Result<Self, CoreError> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| CoreError::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Re-anchors an already compiled regex.
    pub fn from_regex(regex: &Regex) -> Result<Self, CoreError> {
        Self::new(regex.as_str())
    }

    /// The pattern as given, without the anchoring wrapper.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl UrlMatcher for InteractionPattern {
    fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

impl fmt::Debug for InteractionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InteractionPattern").field(&self.source).finish()
    }
}

impl fmt::Display for InteractionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_required() {
        let pattern = InteractionPattern::new(r".*/login.*").unwrap();
        assert!(pattern.matches("http://x/login?a=b"));
        assert!(!pattern.matches("http://x/home"));

        let partial = InteractionPattern::new("/login").unwrap();
        assert!(!partial.matches("http://x/login"));
    }

    #[test]
    fn test_explicit_anchors_still_work() {
        let pattern = InteractionPattern::new(r"^.*/login.*$").unwrap();
        assert!(pattern.matches("http://x/login?a=b"));
        assert!(!pattern.matches("http://x/home"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let pattern = InteractionPattern::new("http://a/x|http://b/y").unwrap();
        assert!(pattern.matches("http://a/x"));
        assert!(!pattern.matches("http://a/x/more"));
        assert!(!pattern.matches("prefix-http://b/y"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            InteractionPattern::new("(unclosed"),
            Err(CoreError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_from_regex() {
        let regex = Regex::new(r".*/providerOAuthLoginPage.*").unwrap();
        let pattern = InteractionPattern::from_regex(&regex).unwrap();
        assert!(pattern.matches("http://localhost:8088/providerOAuthLoginPage?a=b"));
        assert_eq!(pattern.as_str(), regex.as_str());
    }
}
