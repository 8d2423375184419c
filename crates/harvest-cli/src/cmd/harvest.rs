//! Harvest subcommand - walk the catalog and write the TSV dataset

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, ValueEnum};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use harvest_core::{SharedProgress, fmt_num};
use harvest_narou::record::format_timestamp;
use harvest_narou::{Harvester, HttpPageSource, RunSummary, Termination};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Output root directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum number of iterations (cursor advances)
    #[arg(short = 'n', long)]
    pub max_iterations: Option<usize>,

    /// Milliseconds between API calls
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// What a failed page means
    #[arg(long, value_enum)]
    pub on_fetch_error: Option<FetchErrorArg>,

    /// Catalog API endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum FetchErrorArg {
    /// Treat the failure as the end of data
    Exhausted,
    /// Retry transient failures with backoff first
    Retry,
}

impl From<FetchErrorArg> for harvest_narou::FetchFailurePolicy {
    fn from(a: FetchErrorArg) -> Self {
        match a {
            FetchErrorArg::Exhausted => harvest_narou::FetchFailurePolicy::Exhausted,
            FetchErrorArg::Retry => harvest_narou::FetchFailurePolicy::Retry,
        }
    }
}

/// Run a harvest; the returned termination decides the exit code
pub fn run(args: HarvestArgs, config: &Config, progress: &SharedProgress) -> Result<Termination> {
    let mut harvest = config.harvest_config()?;
    if let Some(output) = args.output {
        harvest.output_dir = output;
    }
    if let Some(n) = args.max_iterations {
        harvest.max_iterations = n;
    }
    if let Some(ms) = args.interval_ms {
        harvest.interval = Duration::from_millis(ms);
    }
    if let Some(policy) = args.on_fetch_error {
        harvest.on_fetch_error = policy.into();
    }
    if let Some(endpoint) = args.endpoint {
        harvest.endpoint = endpoint;
    }
    harvest.validate()?;

    let source = HttpPageSource::new(harvest.endpoint.clone());
    let summary = Harvester::new(harvest, source)
        .with_progress(progress.stage_line("harvest"))
        .run()?;

    print_summary(&summary);
    Ok(summary.termination)
}

/// Print the run summary table on stderr
fn print_summary(summary: &RunSummary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Harvest").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let rows = [
        ("Stopped", summary.termination.to_string()),
        ("Iterations", summary.iterations.to_string()),
        (
            "Pages",
            format!(
                "{} ({} failed)",
                summary.pages_fetched, summary.failed_pages
            ),
        ),
        ("Rows written", fmt_num(summary.records_written)),
        ("Duplicates", fmt_num(summary.duplicates_skipped)),
        ("Final cursor", format_timestamp(&summary.final_cursor)),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ];
    for (label, value) in rows {
        let cell = match (&summary.termination, label) {
            (Termination::OrderError(_), "Stopped") => Cell::new(value).fg(Color::Red),
            _ => Cell::new(value),
        };
        table.add_row(vec![Cell::new(label), cell]);
    }
    eprintln!("\n{table}");
}
