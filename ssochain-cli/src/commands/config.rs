//! Config command - show configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::{default_config_path, CliConfig};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Show the configuration path.
    Path,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_path(cli),
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let settings = config.chain_settings();

    match cli.format {
        OutputFormat::Text => {
            println!("ssochain Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Wait:             {:?}", settings.wait);
            println!("Timeout policy:   {:?}", settings.timeout_policy);
            println!("Request timeout:  {:?}", settings.transport.timeout);
            println!("Max redirects:    {}", settings.transport.max_redirects);
            println!("User agent:       {}", settings.transport.user_agent);
            match &settings.transport.allowed_domains {
                Some(domains) => println!("Allowed domains:  {}", domains.join(", ")),
                None => println!("Allowed domains:  any"),
            }
            if let Some(pattern) = &config.login_pattern {
                println!("Login pattern:    {pattern}");
            }
            for name in config.form_fields.keys() {
                println!("Form field:       {name}");
            }
        }
        OutputFormat::Json => {
            let mut redacted = config.clone();
            for value in redacted.form_fields.values_mut() {
                *value = "[REDACTED]".to_string();
            }
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&redacted)?);
        }
    }

    Ok(())
}

fn show_path(cli: &Cli) -> Result<()> {
    let path = cli.config.clone().or_else(default_config_path);
    let display = path
        .as_ref()
        .map_or_else(|| "(no config directory)".to_string(), |p| p.display().to_string());

    match cli.format {
        OutputFormat::Text => {
            println!("Config file: {display}");
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_file": display,
                "exists": path.is_some_and(|p| p.exists()),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}
