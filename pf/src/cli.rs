//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;

/// promptforge - iterative model and prompt recommendations
#[derive(Parser)]
#[command(
    name = "pf",
    about = "Recommend a model and prompt for a task, refined through feedback rounds",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (default: serve)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Listen address (overrides PORT and the config file)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Validate configuration: API key and task template
    Check,

    /// Extract a recommendation from model output
    Parse {
        /// File to read, or `-` for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: String,
    },
}

/// One line of the `check` report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Check everything the server needs at runtime
pub fn check_config(config: &Config) -> Vec<CheckItem> {
    debug!("check_config: called");
    let key_set = std::env::var(&config.llm.api_key_env)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let template = config.prompts.task_template_path();
    let static_dir = &config.server.static_dir;

    let items = vec![
        CheckItem {
            name: "api-key",
            ok: key_set,
            detail: if key_set {
                format!("{} is set", config.llm.api_key_env)
            } else {
                format!("{} is not set", config.llm.api_key_env)
            },
        },
        CheckItem {
            name: "template",
            ok: template.is_file(),
            detail: template.display().to_string(),
        },
        CheckItem {
            name: "static-dir",
            ok: static_dir.is_dir(),
            detail: static_dir.display().to_string(),
        },
    ];
    debug!(failed = items.iter().filter(|i| !i.ok).count(), "check_config: done");
    items
}

/// Help footer showing whether the server could start right now
pub fn generate_after_help(config: &Config) -> String {
    debug!("generate_after_help: called");
    let mut help = String::from("Configuration:\n");
    for item in check_config(config) {
        let icon = if item.ok { "\u{2705}" } else { "\u{274C}" };
        help.push_str(&format!("  {} {:<12} {}\n", icon, item.name, item.detail));
    }
    help
}
