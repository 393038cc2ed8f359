//! Continuation decisions.

use std::fmt;

use super::response::ChainResponse;

/// Outcome of inspecting one response.
#[derive(Debug)]
pub enum ContinuationDecision {
    /// The inspected response is the final response.
    Final,
    /// Release the inspected response and continue with this one.
    Continue(ChainResponse),
    /// Abort the chain without a final response.
    Cancel,
}

impl ContinuationDecision {
    /// Builds a decision from the `(next response, cancel)` pair an
    /// interaction reports.
    ///
    /// Cancellation wins over a supplied response; the response is released.
    pub fn from_parts(next: Option<ChainResponse>, cancel: bool) -> Self {
        match (next, cancel) {
            (_, true) => Self::Cancel,
            (Some(next), false) => Self::Continue(next),
            (None, false) => Self::Final,
        }
    }

    /// Returns the kind of this decision without its payload.
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Final => DecisionKind::Final,
            Self::Continue(_) => DecisionKind::Continue,
            Self::Cancel => DecisionKind::Cancel,
        }
    }
}

/// Payload-free view of a [`ContinuationDecision`], used in hop records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    /// Response was final.
    Final,
    /// Another hop followed.
    Continue,
    /// Chain was canceled.
    Cancel,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Final => "final",
            Self::Continue => "continue",
            Self::Cancel => "cancel",
        })
    }
}
