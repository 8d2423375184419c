//! narou-harvest - incremental harvester for the Narou novel catalog
//!
//! Pages through the catalog oldest-first and writes a deduplicated TSV
//! dataset. Exit codes: 0 tail reached, 1 error, 2 iteration cap reached,
//! 3 cursor ordering error.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "narou-harvest")]
#[command(about = "Incremental harvester for the Narou novel catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./narou-harvest.toml or ~/.config/narou-harvest/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest the catalog into sharded TSV files
    Harvest(cmd::harvest::HarvestArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let progress = Arc::new(harvest_core::ProgressContext::new());

    // Logs are the per-page record of a run, so stay at info on a TTY too;
    // the spinner only adds a live row counter.
    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    harvest_core::init_logging(false, cli.debug, multi);

    match run(cli, &progress) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, progress: &harvest_core::SharedProgress) -> Result<u8> {
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Harvest(args) => {
            let termination = cmd::harvest::run(args, &config, progress)?;
            Ok(termination.exit_code())
        }
        Command::Config => {
            show_config(&config)?;
            Ok(0)
        }
    }
}

fn show_config(config: &Config) -> Result<()> {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let harvest = config.harvest_config()?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![
        "Output directory",
        &harvest.output_dir.display().to_string(),
    ]);
    table.add_row(vec!["Output filename", &harvest.output_filename]);
    table.add_row(vec!["Shard width", &harvest.shard_width.to_string()]);
    table.add_row(vec!["Endpoint", &harvest.endpoint]);
    table.add_row(vec![
        "Interval",
        &format!("{}ms", harvest.interval.as_millis()),
    ]);
    table.add_row(vec![
        "Page size",
        &format!(
            "{} x {} pages {:?}",
            harvest.page_size,
            harvest.pages_per_iteration,
            harvest.offsets()
        ),
    ]);
    table.add_row(vec!["Max iterations", &harvest.max_iterations.to_string()]);
    table.add_row(vec!["Epoch floor", &harvest.epoch_floor.to_rfc3339()]);
    table.add_row(vec![
        "Cursor correction",
        &format!("{}h", harvest.correction.num_hours()),
    ]);
    table.add_row(vec![
        "On fetch error",
        &format!(
            "{} (max retries: {})",
            harvest.on_fetch_error, harvest.max_retries
        ),
    ]);

    eprintln!("\n{table}");
    Ok(())
}
