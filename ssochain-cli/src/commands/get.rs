//! Get command - fetch a URL through redirects and login pages.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use ssochain_core::{ChainRequest, CookieStore, Method};
use ssochain_fetch::{
    ChainContext, CredentialPrompt, Credentials, FormLoginHandler, InteractionError,
    InteractionHandler, PromptLoginHandler, Wait,
};
use tokio::runtime::Runtime;
use tracing::{debug, info};
use url::Url;

use crate::config::CliConfig;
use crate::output::{FetchReport, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// How a login page is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LoginMode {
    /// Fill in and submit the form on the login page.
    #[default]
    Form,
    /// Post credentials to --submit-url.
    Submit,
}

/// Arguments for the get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// URL to fetch.
    pub url: String,

    /// Request method.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: Method,

    /// Request body. Sent as a URL-encoded form unless a Content-Type header
    /// is given.
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Extra request header as NAME:VALUE. Repeatable.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Regex the resolved URL of a login page matches in full.
    #[arg(long)]
    pub login_pattern: Option<String>,

    /// How to handle login pages.
    #[arg(long, value_enum, default_value = "form")]
    pub login_mode: LoginMode,

    /// Login form value as NAME=VALUE, overriding the page. Repeatable.
    #[arg(long = "form-field", value_parser = parse_key_value)]
    pub form_fields: Vec<(String, String)>,

    /// CSS selector of the login form.
    #[arg(long, default_value = "form")]
    pub form_selector: String,

    /// Login endpoint for --login-mode submit.
    #[arg(long)]
    pub submit_url: Option<String>,

    /// User name for --login-mode submit; asked on the terminal if missing.
    #[arg(long)]
    pub user: Option<String>,

    /// Environment variable holding the password for --login-mode submit.
    #[arg(long)]
    pub password_env: Option<String>,

    /// Seconds to wait for the whole chain. Waits forever if unset.
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,

    /// Print every hop of the chain to stderr.
    #[arg(long)]
    pub show_hops: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got `{s}`"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// Runs the get command.
pub fn run(args: &GetArgs, cli: &Cli, runtime: &Runtime) -> Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let ctx = ChainContext::builder()
        .settings(config.chain_settings())
        .runtime(runtime.handle().clone())
        .build()?;

    let store = Arc::new(CookieStore::new());
    let request = build_request(args, &store)?;
    let wait = args
        .timeout
        .map_or_else(|| ctx.wait(), |secs| Wait::For(Duration::from_secs(secs)));

    let pattern = args
        .login_pattern
        .as_deref()
        .or(config.login_pattern.as_deref());
    let chain = match pattern {
        None => ctx.chain(request)?,
        Some(pattern) => {
            let handler = login_handler(args, &config, &ctx, &request)?;
            ctx.interactive(request, pattern, handler)?.chain().clone()
        }
    };

    info!(url = %args.url, wait = ?wait, "Fetching");
    if let Err(e) = chain.get_response_with_timeout(wait) {
        if args.show_hops && !cli.quiet {
            for hop in chain.hops() {
                eprintln!("hop {}: {} {} ({})", hop.index, hop.status, hop.resolved_url, hop.decision);
            }
        }
        return Err(e.into());
    }

    let mut response = chain
        .take_response()
        .context("Chain completed without a final response")?;
    let body = runtime.block_on(response.bytes())?;
    debug!(bytes = body.len(), "Body read");

    let report = FetchReport::new(&args.url, &response, &body, &chain.hops(), &store.all());
    drop(response);

    match cli.format {
        OutputFormat::Text => {
            if args.show_hops && !cli.quiet {
                let use_colors = !cli.no_color && io::stderr().is_terminal();
                eprintln!("{}", TextFormatter::new(use_colors).format_hops(&report));
            }
            let mut stdout = io::stdout().lock();
            stdout.write_all(&body)?;
            stdout.flush()?;
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&report)?);
        }
    }

    Ok(())
}

fn build_request(args: &GetArgs, store: &Arc<CookieStore>) -> Result<ChainRequest> {
    let mut request = ChainRequest::parse_get(&args.url, Arc::clone(store))?;
    request.method = args.method;
    for (name, value) in &args.headers {
        request = request.with_header(name, value);
    }
    if let Some(data) = &args.data {
        if request.header("content-type").is_none() {
            request = request.with_header("Content-Type", "application/x-www-form-urlencoded");
        }
        request = request.with_body(data.clone());
    }
    Ok(request)
}

fn login_handler(
    args: &GetArgs,
    config: &CliConfig,
    ctx: &ChainContext,
    request: &ChainRequest,
) -> Result<Arc<dyn InteractionHandler>> {
    match args.login_mode {
        LoginMode::Form => {
            let handler = FormLoginHandler::new(Arc::clone(&ctx.transport))
                .with_values(config.form_fields.clone())
                .with_values(args.form_fields.clone())
                .with_form_selector(&args.form_selector);
            Ok(Arc::new(handler))
        }
        LoginMode::Submit => {
            let submit_url = args
                .submit_url
                .as_deref()
                .context("--submit-url is required with --login-mode submit")?;
            let submit_url =
                Url::parse(submit_url).with_context(|| format!("Invalid --submit-url {submit_url}"))?;
            let password = args
                .password_env
                .as_deref()
                .map(|var| std::env::var(var).with_context(|| format!("Environment variable {var} is not set")))
                .transpose()?;

            let prompt = TerminalPrompt {
                user: args.user.clone(),
                password,
            };
            Ok(Arc::new(PromptLoginHandler::for_request(
                Arc::clone(&ctx.transport),
                Arc::new(prompt),
                submit_url,
                request,
            )))
        }
    }
}

// ============================================================================
// Terminal Prompt
// ============================================================================

/// Asks for missing credentials on the terminal.
///
/// An empty user name (or end of input) declines the login.
struct TerminalPrompt {
    user: Option<String>,
    password: Option<String>,
}

#[async_trait]
impl CredentialPrompt for TerminalPrompt {
    async fn credentials(&self, login_url: &Url) -> Result<Option<Credentials>, InteractionError> {
        let user = self.user.clone();
        let password = self.password.clone();
        let login_url = login_url.to_string();

        tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            ask_credentials(&mut stdin.lock(), &login_url, user, password)
        })
        .await
        .map_err(|e| InteractionError::Prompt(e.to_string()))?
    }
}

fn ask_credentials(
    input: &mut impl BufRead,
    login_url: &str,
    user: Option<String>,
    password: Option<String>,
) -> Result<Option<Credentials>, InteractionError> {
    eprintln!("Login required at {login_url}");

    let user = match user {
        Some(user) => user,
        None => read_line(input, "User name: ")?,
    };
    if user.is_empty() {
        return Ok(None);
    }

    let password = match password {
        Some(password) => password,
        None => read_line(input, "Password: ")?,
    };
    Ok(Some(Credentials::new(user, password)))
}

fn read_line(input: &mut impl BufRead, prompt: &str) -> Result<String, InteractionError> {
    eprint!("{prompt}");
    io::stderr()
        .flush()
        .map_err(|e| InteractionError::Prompt(e.to_string()))?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| InteractionError::Prompt(e.to_string()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ============================================================================
// Tests
// ============================================================================
