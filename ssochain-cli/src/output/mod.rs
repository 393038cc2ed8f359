//! Output formatting for CLI.

mod json;
mod text;

pub use json::{FetchReport, JsonFormatter};
pub use text::TextFormatter;
