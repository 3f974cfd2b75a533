use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use spendboard::cli::{self, FilterArgs, OutputFormat};
use spendboard::config;

#[derive(Debug, Parser)]
#[command(name = "spendboard")]
#[command(about = "Advertising spend dashboard for the terminal")]
struct App {
    /// Backend base URL (overrides config and SPENDBOARD_URL)
    #[arg(long, global = true)]
    url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the filter values the backend offers
    Options {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Fetch and render statistics for one filter selection
    Stats {
        #[command(flatten)]
        filters: FilterFlags,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Interactive dashboard: change filters and watch the numbers update
    Shell,
    /// Download the full data export as a spreadsheet
    Export {
        /// Destination file (default: 广告数据_<timestamp>.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check config, backend reachability and the refresh log
    Health,
    /// Show recent refresh events
    Log {
        /// Number of events to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Args)]
struct FilterFlags {
    /// First day, YYYY-MM-DD (default: earliest available)
    #[arg(long)]
    date_from: Option<String>,
    /// Last day, YYYY-MM-DD (default: latest available)
    #[arg(long)]
    date_to: Option<String>,
    #[arg(long)]
    agent: Option<String>,
    #[arg(long)]
    bidding_method: Option<String>,
    /// Comma-separated targeting values
    #[arg(long, value_delimiter = ',')]
    targeting: Vec<String>,
    #[arg(long)]
    resource: Option<String>,
    #[arg(long)]
    material: Option<String>,
    #[arg(long)]
    benefit: Option<String>,
}

impl From<FilterFlags> for FilterArgs {
    fn from(flags: FilterFlags) -> Self {
        Self {
            date_from: flags.date_from,
            date_to: flags.date_to,
            agent: flags.agent,
            bidding_method: flags.bidding_method,
            targeting: flags.targeting,
            resource: flags.resource,
            material: flags.material,
            benefit: flags.benefit,
        }
    }
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective merged configuration
    Show,
    /// Write a default config file to ~/.spendboard/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a value by dotted key, e.g. server.base_url
    Set { key: String, value: String },
    /// Reset the global config file to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    let mut cfg = config::load();
    if let Some(url) = app.url {
        cfg.server.base_url = url;
    }
    if !cfg.display.color {
        colored::control::set_override(false);
    }

    match app.command {
        Commands::Options { format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_options(&cfg, fmt)
        }
        Commands::Stats { filters, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_stats(&cfg, &filters.into(), fmt)
        }
        Commands::Shell => cli::run_shell(&cfg),
        Commands::Export { output } => cli::run_export(&cfg, output),
        Commands::Health => cli::run_health(&cfg),
        Commands::Log { limit, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_log(&cfg, limit, fmt)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
