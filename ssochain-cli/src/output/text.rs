//! Text output formatting with colors.

use ssochain_core::DecisionKind;

use super::json::FetchReport;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats the hops of a chain, one per line.
    pub fn format_hops(&self, report: &FetchReport) -> String {
        let mut lines = vec![self.bold(&format!("{} {}", report.status, report.resolved_url))];

        for hop in &report.hops {
            let decision = match hop.decision.as_str() {
                d if d == DecisionKind::Final.to_string() => self.green(d),
                d if d == DecisionKind::Cancel.to_string() => self.red(d),
                d => self.yellow(d),
            };
            lines.push(format!(
                "  {:>2}. {} {} {}",
                hop.index,
                hop.status,
                hop.resolved_url,
                self.dim(&format!("({decision}, {}ms)", hop.elapsed_ms)),
            ));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::json::HopOutput;

    fn report() -> FetchReport {
        FetchReport {
            url: "http://x/resource".to_string(),
            resolved_url: "http://x/home".to_string(),
            status: 200,
            hops: vec![
                HopOutput {
                    index: 1,
                    status: 200,
                    resolved_url: "http://x/login".to_string(),
                    decision: "continue".to_string(),
                    elapsed_ms: 12,
                },
                HopOutput {
                    index: 2,
                    status: 200,
                    resolved_url: "http://x/home".to_string(),
                    decision: "final".to_string(),
                    elapsed_ms: 30,
                },
            ],
            cookies: Vec::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_format_hops_plain() {
        let output = TextFormatter::new(false).format_hops(&report());
        assert_eq!(
            output,
            "200 http://x/home\n   1. 200 http://x/login (continue, 12ms)\n   2. 200 http://x/home (final, 30ms)"
        );
    }

    #[test]
    fn test_format_hops_colored() {
        let output = TextFormatter::new(true).format_hops(&report());
        assert!(output.contains(GREEN));
        assert!(output.contains(YELLOW));
        assert!(!output.contains(RED));
    }
}
