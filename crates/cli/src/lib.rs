//! `demandflow` command line: loads inputs from disk, runs the planning
//! core, and writes the forecast artifact.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod commands;

#[derive(Debug, Parser)]
#[command(name = "demandflow")]
#[command(about = "Demand forecasting and reorder planning", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a seeded synthetic history with a matching encoding and model
    Generate(GenerateArgs),

    /// Forecast demand and write reorder recommendations
    Forecast(ForecastArgs),

    /// Print a previously written forecast artifact
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Directory receiving inventory.csv, encoding.json and model.json
    #[arg(short, long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Number of SKUs
    #[arg(long, default_value_t = 150)]
    pub skus: usize,

    /// Number of monthly periods
    #[arg(long, default_value_t = 24)]
    pub months: u32,

    /// First month of the history (any day within it)
    #[arg(long, default_value = "2021-01-01")]
    pub start: NaiveDate,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    /// Inventory history (CSV)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Model artifact (JSON)
    #[arg(short, long)]
    pub model: PathBuf,

    /// Category encoding artifact (JSON)
    #[arg(short, long)]
    pub encoding: PathBuf,

    /// Forecast artifact to write (CSV)
    #[arg(short, long, default_value = "forecast.csv")]
    pub output: PathBuf,

    /// Optional run summary to write (JSON)
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Ignore history after this date (default: latest record date)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Planning config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Flags below also read `DEMANDFLOW_*`; a flag on the command line wins.
    #[arg(long, env = "DEMANDFLOW_THRESHOLD_FRACTION")]
    pub threshold_fraction: Option<f64>,

    #[arg(long, env = "DEMANDFLOW_HORIZON_MONTHS")]
    pub horizon_months: Option<u32>,

    #[arg(long, env = "DEMANDFLOW_LEAD_TIME_BUFFER_DAYS")]
    pub lead_time_buffer_days: Option<i64>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Forecast artifact (CSV)
    #[arg(default_value = "forecast.csv")]
    pub artifact: PathBuf,

    /// Which rows to print
    #[arg(long, value_enum, default_value_t = ShowFilter::All)]
    pub filter: ShowFilter,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum)]
pub enum ShowFilter {
    #[default]
    All,
    /// Rows that need a reorder
    Reorders,
    /// Rows marked "No Order Needed"
    NoReorders,
}

impl ShowFilter {
    pub fn keeps(self, reorder_needed: bool) -> bool {
        match self {
            ShowFilter::All => true,
            ShowFilter::Reorders => reorder_needed,
            ShowFilter::NoReorders => !reorder_needed,
        }
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Generate(args) => commands::generate(&args, &mut out),
        Command::Forecast(args) => commands::forecast(&args, &mut out),
        Command::Show(args) => commands::show(&args, &mut out),
    }
}
