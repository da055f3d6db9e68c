//! promptforge - model and prompt recommendation server
//!
//! CLI entry point: runs the HTTP server, checks configuration, or extracts a
//! recommendation from saved model output.

use std::fs;
use std::io::Read;
use std::path::Path;

use clap::{CommandFactory, FromArgMatches, Parser};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use promptforge::cli::{Cli, Command, check_config, generate_after_help};
use promptforge::config::Config;
use promptforge::{parse_recommendation, run_server};

fn setup_logging(cli_log_level: Option<&str>, config: Option<&Config>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level_str = cli_log_level.or_else(|| config.and_then(|c| c.log_level.as_deref()));
    let level = match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match config.and_then(|c| c.log_file.as_deref()) {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).context("Failed to create log directory")?;
            }
            let log_file = fs::File::create(path).context("Failed to create log file")?;
            tracing_subscriber::fmt()
                .with_writer(log_file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Peek at the config before logging so the help footer and the log
    // target can use it; failures are reported after logging is up
    let early_config = {
        let cli = Cli::try_parse_from(std::env::args()).ok();
        Config::load(cli.and_then(|c| c.config).as_ref()).ok()
    };

    let cmd = Cli::command().after_help(generate_after_help(early_config.as_ref().unwrap_or(&Config::default())));
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    setup_logging(cli.log_level.as_deref(), early_config.as_ref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Serve { bind }) => {
            debug!(?bind, "main: matched Serve command");
            run_server(&config, bind.as_deref()).await
        }
        None => {
            debug!("main: no command specified, serving");
            run_server(&config, None).await
        }
        Some(Command::Check) => {
            debug!("main: matched Check command");
            cmd_check(&config)
        }
        Some(Command::Parse { input }) => {
            debug!(%input, "main: matched Parse command");
            cmd_parse(&input)
        }
    }
}

/// Print the configuration report; fail if anything is missing
fn cmd_check(config: &Config) -> Result<()> {
    debug!("cmd_check: called");
    let items = check_config(config);
    for item in &items {
        let mark = if item.ok { "✓".green() } else { "✗".red() };
        println!("{} {:<12} {}", mark, item.name.bold(), item.detail);
    }

    // The browser client is optional
    let failed = items.iter().filter(|i| !i.ok && i.name != "static-dir").count();
    if failed > 0 {
        return Err(eyre!("{} check(s) failed", failed));
    }
    println!("{}", "Configuration OK".green());
    Ok(())
}

/// Print the recommendation found in a file or stdin as JSON
fn cmd_parse(input: &str) -> Result<()> {
    debug!(%input, "cmd_parse: called");
    let text = if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        text
    } else {
        fs::read_to_string(Path::new(input)).context(format!("Failed to read {}", input))?
    };

    match parse_recommendation(&text) {
        Some(recommendation) => {
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
            Ok(())
        }
        None => Err(eyre!("No recommendation found")),
    }
}
