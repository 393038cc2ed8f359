// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! ssochain CLI - fetch resources behind a web single sign-on login.
//!
//! # Examples
//!
//! ```bash
//! # Plain request, following redirects
//! ssochain get https://app.example.com/resource
//!
//! # Fill in the login form whenever a login page comes up
//! ssochain get https://app.example.com/resource \
//!     --login-pattern '.*/providerOAuthLoginPage.*' \
//!     --form-field userName=test --form-field password=secret
//!
//! # Post credentials to a fixed login endpoint, asking on the terminal
//! ssochain get https://app.example.com/resource \
//!     --login-pattern '.*/login.*' --login-mode submit \
//!     --submit-url https://sso.example.com/submitLogin
//!
//! # JSON report with every hop
//! ssochain get https://app.example.com/resource --format json --show-hops
//! ```

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ssochain_fetch::ChainError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{config as config_cmd, get};

// ============================================================================
// CLI Definition
// ============================================================================

/// ssochain CLI - chained HTTP requests with login interaction.
#[derive(Parser)]
#[command(name = "ssochain")]
#[command(about = "Fetch resources behind web single sign-on")]
#[command(long_about = r#"
ssochain sends a request and follows it through redirects and login pages
until the resource itself comes back.

When a response lands on a URL matching --login-pattern, the login is handled
either by filling in the form on the page (--login-mode form) or by posting
credentials to a fixed endpoint (--login-mode submit).

Exit codes:
  0  success
  1  error
  2  login canceled
  4  timeout
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Config file (default: <config dir>/ssochain/config.json).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a URL, handling logins on the way.
    #[command(visible_alias = "g")]
    Get(get::GetArgs),

    /// Show configuration.
    Config(config_cmd::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// The login was canceled.
    Canceled = 2,
    /// Timeout.
    Timeout = 4,
}

impl ExitCode {
    /// Maps a failed command to its exit code.
    fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<ChainError>() {
            Some(e) if e.is_canceled() => Self::Canceled,
            Some(e) if e.is_timeout() => Self::Timeout,
            _ => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("ssochain=debug,info")
    } else {
        EnvFilter::new("ssochain=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Chains run on this runtime while the main thread blocks on them.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = match &cli.command {
        Commands::Get(args) => get::run(args, &cli, &runtime),
        Commands::Config(args) => config_cmd::run(args, &cli),
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
