//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `spendboard options`: filter values offered by the backend
//! - `spendboard stats [filters]`: one statistics refresh, printed once
//! - `spendboard shell`: interactive session that re-renders on every change
//! - `spendboard export [-o FILE]`: download the full data export
//! - `spendboard health`: check config, backend and refresh log
//! - `spendboard log`: recent refresh events
//! - `spendboard config show|init|set|reset`: configuration management

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use colored::Colorize;

use crate::api::http::HttpApi;
use crate::api::{ApiError, DashboardApi};
use crate::config::{self, SpendboardConfig};
use crate::diagnostics::{EventOutcome, RefreshLog};
use crate::filter::{ALL, FilterField, FilterOptions, FilterState};
use crate::pipeline::{LoadingIndicator, NoIndicator, RefreshOutcome, Renderer, StatisticsPipeline};
use crate::render::format::truncate;
use crate::render::{JsonRenderer, TerminalIndicator, TerminalRenderer};
use crate::session::{DashboardSession, FilterCommand};

/// Output format for data commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Filter values given on the command line. Unset fields keep their
/// defaults: "all" for categories, the available date range for dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArgs {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub agent: Option<String>,
    pub bidding_method: Option<String>,
    pub targeting: Vec<String>,
    pub resource: Option<String>,
    pub material: Option<String>,
    pub benefit: Option<String>,
}

impl FilterArgs {
    /// Overlay the given values on `state`.
    pub fn apply_to(&self, state: &mut FilterState) {
        let fields = [
            (FilterField::DateFrom, &self.date_from),
            (FilterField::DateTo, &self.date_to),
            (FilterField::Agent, &self.agent),
            (FilterField::BiddingMethod, &self.bidding_method),
            (FilterField::Resource, &self.resource),
            (FilterField::Material, &self.material),
            (FilterField::Benefit, &self.benefit),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                state.update_field(field, value);
            }
        }
        if !self.targeting.is_empty() {
            state.set_targeting(self.targeting.iter());
        }
    }
}

/// Wrap an API error so the user-facing message leads and the detail follows.
fn api_error(err: ApiError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

fn pipeline(cfg: &SpendboardConfig) -> StatisticsPipeline<HttpApi> {
    StatisticsPipeline::new(HttpApi::from_config(&cfg.server))
        .with_log(RefreshLog::from_config(&cfg.logging))
}

// ---------------------------------------------------------------------------
// spendboard options
// ---------------------------------------------------------------------------

/// Show the filter values the backend offers.
pub fn run_options(cfg: &SpendboardConfig, format: OutputFormat) -> Result<()> {
    let api = HttpApi::from_config(&cfg.server);
    let options = api
        .fetch_options()
        .map_err(api_error)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&options)?),
        OutputFormat::Table => print_options_table(&options, cfg.display.max_rows),
    }
    Ok(())
}

fn print_options_table(options: &FilterOptions, max_rows: usize) {
    println!("{}", "Filter Options".bold().cyan());
    println!("{}", "=".repeat(40));

    match options.date_range() {
        Some((from, to)) => println!("  {} {from} … {to}", "Dates:".bold()),
        None => println!("  {} {}", "Dates:".bold(), "none".dimmed()),
    }

    let categories = [
        ("Agents", &options.agents),
        ("Bidding methods", &options.bidding_methods),
        ("Targetings", &options.targetings),
        ("Resources", &options.resources),
        ("Materials", &options.materials),
        ("Benefits", &options.benefits),
    ];
    for (name, values) in categories {
        println!();
        println!("  {} ({})", name.bold(), values.len());
        for value in values.iter().take(max_rows) {
            println!("    {}", truncate(value, 40));
        }
        if values.len() > max_rows {
            println!("    {}", format!("… {} more", values.len() - max_rows).dimmed());
        }
    }
}

// ---------------------------------------------------------------------------
// spendboard stats
// ---------------------------------------------------------------------------

/// Load options, apply `filters` over the defaults and render one refresh.
pub fn run_stats(cfg: &SpendboardConfig, filters: &FilterArgs, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => stats_with(cfg, filters, JsonRenderer::stdout(), NoIndicator),
        OutputFormat::Table => stats_with(
            cfg,
            filters,
            TerminalRenderer::stdout(cfg.display.clone()),
            TerminalIndicator::new(),
        ),
    }
}

fn stats_with<R: Renderer, L: LoadingIndicator>(
    cfg: &SpendboardConfig,
    filters: &FilterArgs,
    renderer: R,
    indicator: L,
) -> Result<()> {
    let mut session = DashboardSession::new(pipeline(cfg), renderer, indicator);
    if let Err(err) = session.reload_options() {
        eprintln!("[spendboard] failed to load filter options: {err}");
    }
    filters.apply_to(session.state_mut());

    refresh_status(session.refresh())
}

/// Exit status for a one-shot refresh. The renderer has already shown the
/// failure message, so the error only carries the non-zero exit.
fn refresh_status(outcome: RefreshOutcome) -> Result<()> {
    match outcome {
        RefreshOutcome::Failed(_) => Err(anyhow!("statistics refresh failed")),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// spendboard shell
// ---------------------------------------------------------------------------

const SHELL_HELP: &str = "\
commands:
  set <field> <value>   date_from, date_to, agent, bidding_method, resource, material, benefit
  unset <field>         back to all (dates: no bound)
  targeting A,B,...     select targetings (empty: all)
  clear targeting       select all targetings
  reset                 clear every filter except the date range
  reload                refresh with the current filters
  options               reload filter options, then refresh
  show                  print the current filters
  export [FILE]         download the data export
  help                  this text
  quit                  leave the shell";

/// Interactive dashboard: renders once, then re-renders after each command.
pub fn run_shell(cfg: &SpendboardConfig) -> Result<()> {
    let renderer = TerminalRenderer::stdout(cfg.display.clone());
    let mut session = DashboardSession::new(pipeline(cfg), renderer, TerminalIndicator::new());
    session.start();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} ", "spendboard>".bold().cyan());
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("failed to read from stdin")?;
        let trimmed = line.trim();

        match trimmed.split_whitespace().next().unwrap_or_default() {
            "" => continue,
            "quit" | "exit" => break,
            "help" => println!("{}", SHELL_HELP.dimmed()),
            "show" => print_state(session.state()),
            "export" => {
                let path = trimmed
                    .split_once(char::is_whitespace)
                    .map(|(_, rest)| PathBuf::from(rest.trim()));
                if let Err(err) = export_to(&session, path) {
                    eprintln!("{} {err:#}", "✗".red().bold());
                }
            }
            _ => match trimmed.parse::<FilterCommand>() {
                Ok(command) => {
                    session.apply(command);
                }
                Err(err) => println!("{} {err} (try `help`)", "?".yellow().bold()),
            },
        }
    }
    Ok(())
}

fn print_state(state: &FilterState) {
    for field in FilterField::ALL_FIELDS {
        let value = state.get(field).unwrap_or(if field.is_date() { "" } else { ALL });
        println!("  {:<16} {}", field.to_string().bold(), value);
    }
    let targeting = if state.targeting().is_empty() {
        ALL.to_string()
    } else {
        state.targeting().join(", ")
    };
    println!("  {:<16} {}", "targeting".bold(), targeting);
}

// ---------------------------------------------------------------------------
// spendboard export
// ---------------------------------------------------------------------------

/// Download the spreadsheet export to `output` or a timestamped file name.
pub fn run_export(cfg: &SpendboardConfig, output: Option<PathBuf>) -> Result<()> {
    let session = DashboardSession::new(
        pipeline(cfg),
        TerminalRenderer::stdout(cfg.display.clone()),
        NoIndicator,
    );
    export_to(&session, output)
}

/// `广告数据_YYYYmmdd_HHMMSS.xlsx` in local time.
pub fn default_export_filename() -> String {
    format!("广告数据_{}.xlsx", Local::now().format("%Y%m%d_%H%M%S"))
}

fn export_to<A, R, L>(session: &DashboardSession<A, R, L>, output: Option<PathBuf>) -> Result<()>
where
    A: DashboardApi,
    R: Renderer,
    L: LoadingIndicator,
{
    let path = output.unwrap_or_else(|| PathBuf::from(default_export_filename()));
    let file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let written = session
        .export(&mut writer)
        .and_then(|bytes| writer.flush().map(|()| bytes).map_err(Into::into));
    match written {
        Ok(bytes) => {
            println!(
                "{} Exported {} bytes to {}",
                "✓".green().bold(),
                bytes,
                path.display()
            );
            Ok(())
        }
        Err(err) => {
            drop(writer);
            let _ = std::fs::remove_file(&path);
            Err(api_error(err))
        }
    }
}

// ---------------------------------------------------------------------------
// spendboard health
// ---------------------------------------------------------------------------

pub fn run_health(cfg: &SpendboardConfig) -> Result<()> {
    println!("{}", "Spendboard Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    // Config files
    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.spendboard/config.toml found"
        } else {
            "not found (run `spendboard config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".spendboard.toml found"
        } else {
            "none (optional)"
        },
    );

    // Backend
    let api = HttpApi::from_config(&cfg.server);
    match api.fetch_options() {
        Ok(options) => {
            print_health_item("Backend", true, &format!("reachable at {}", api.base_url()));
            let dates = match options.date_range() {
                Some((from, to)) => format!("{from} … {to}"),
                None => "no dates".to_string(),
            };
            print_health_item(
                "Data",
                !options.dates.is_empty(),
                &format!("{dates}, {} agents", options.agents.len()),
            );
        }
        Err(err) => print_health_item("Backend", false, &format!("{} ({err})", api.base_url())),
    }

    // Refresh log
    let log = RefreshLog::from_config(&cfg.logging);
    match log.path() {
        None => print_health_item("Refresh log", true, "disabled"),
        Some(path) if path.exists() => {
            let events = log.read_all();
            let failed = events
                .iter()
                .filter(|e| e.outcome == EventOutcome::Failed)
                .count();
            print_health_item(
                "Refresh log",
                true,
                &format!("{} entries, {} failed", events.len(), failed),
            );
        }
        Some(_) => print_health_item("Refresh log", true, "no log file yet"),
    }

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<16} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// spendboard log
// ---------------------------------------------------------------------------

/// Show the last `limit` refresh events.
pub fn run_log(cfg: &SpendboardConfig, limit: usize, format: OutputFormat) -> Result<()> {
    let log = RefreshLog::from_config(&cfg.logging);
    let events = log.read_recent(limit);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("{}", "No refresh events logged yet.".yellow());
        return Ok(());
    }

    println!("{}", "Recent Refreshes".bold().cyan());
    println!("{}", "=".repeat(72));
    for event in &events {
        let outcome = match event.outcome {
            EventOutcome::Applied => event.outcome.to_string().green(),
            EventOutcome::Failed => event.outcome.to_string().red(),
            EventOutcome::Superseded => event.outcome.to_string().yellow(),
        };
        let sequence = event
            .sequence
            .map(|s| format!("#{s}"))
            .unwrap_or_default();
        let timestamp = event.timestamp.get(..19).unwrap_or(event.timestamp.as_str());
        println!(
            "  {}  {:<10} {:>5}  {:<10} {:>6}ms  {}",
            timestamp.dimmed(),
            format!("{:?}", event.kind).to_lowercase(),
            sequence,
            outcome,
            event.latency_ms,
            truncate(event.message.as_deref().unwrap_or_default(), 60).dimmed()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// spendboard config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective Spendboard Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source(global_exists, "~/.spendboard/config.toml");
    print_source(project_exists, ".spendboard.toml");
    println!(
        "  {} {}",
        "·".dimmed(),
        "SPENDBOARD_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(exists: bool, name: &str) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.spendboard/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!("  {}", "Edit the file to point at your backend.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str_opt(Some("unknown")),
            OutputFormat::Table
        );
    }

    #[test]
    fn filter_args_overlay_only_given_fields() {
        let mut state = FilterState::new();
        state.initialize_from_options(&FilterOptions {
            dates: vec!["2024-03-01".into(), "2024-03-31".into()],
            ..FilterOptions::default()
        });

        let args = FilterArgs {
            date_from: Some("2024-03-10".into()),
            agent: Some("奇异果".into()),
            targeting: vec!["A".into(), "B".into()],
            ..FilterArgs::default()
        };
        args.apply_to(&mut state);

        let params = state.to_query_params();
        assert_eq!(params.get("date_from"), Some("2024-03-10"));
        assert_eq!(params.get("date_to"), Some("2024-03-31"));
        assert_eq!(params.get("agent"), Some("奇异果"));
        assert_eq!(params.get("bidding_method"), Some(ALL));
        assert_eq!(params.get("targeting"), Some("A,B"));
    }

    #[test]
    fn default_export_filename_is_timestamped() {
        let name = default_export_filename();
        assert!(name.starts_with("广告数据_"));
        assert!(name.ends_with(".xlsx"));
        // 广告数据_ + YYYYmmdd_HHMMSS + .xlsx
        assert_eq!(name.chars().count(), 5 + 15 + 5);
    }

    #[test]
    fn failed_refresh_exits_without_repeating_the_message() {
        let outcome = RefreshOutcome::Failed(ApiError::Rejected {
            message: Some("no data".into()),
        });
        let err = refresh_status(outcome).unwrap_err();
        let text = format!("{err:#}");
        assert_eq!(text, "statistics refresh failed");
        assert!(!text.contains("加载数据失败"));
        assert!(!text.contains("no data"));

        assert!(refresh_status(RefreshOutcome::Superseded { sequence: 1 }).is_ok());
    }
}
