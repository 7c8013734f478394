//! coinhist CLI — fetch historical prices and inspect source configuration.
//!
//! Commands:
//! - `fetch` — pull one ticker from one source and append it to a CSV table
//! - `sources` — list configured sources, their tickers and output columns
//! - `check-config` — load and validate a configuration file

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use coinhist_core::config::{AppConfig, TickerRules};
use coinhist_core::dates;
use coinhist_core::sources::{poloniex, FetchRequest, HttpClient, SourceKind};
use coinhist_core::{load_result, CsvSink, LoadOutcome, ResultSet};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "coinhist",
    version,
    about = "coinhist — historical crypto price ingestion"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one ticker's history and append it to a table.
    Fetch {
        /// Source to query: coindesk or poloniex.
        #[arg(long)]
        source: SourceKind,

        /// Ticker (USD, ETH) or ticker pair (BTC_ETH), depending on the source.
        #[arg(long)]
        ticker: String,

        /// Start date (YYYY-MM-DD). Defaults to yesterday.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Candle period in seconds, for sources that take one.
        #[arg(long)]
        period: Option<u32>,

        /// Source configuration file. Defaults to the built-in config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Destination table name.
        #[arg(long, default_value = "hist_prices")]
        table: String,

        /// Output directory for table files.
        #[arg(long, default_value = "data")]
        out_dir: PathBuf,

        /// Print rows as JSON lines instead of loading them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// HTTP request timeout in seconds.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// List configured sources, tickers and output columns.
    Sources {
        /// Source configuration file. Defaults to the built-in config.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file.
    CheckConfig {
        /// Source configuration file. Defaults to the built-in config.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Fetch {
            source,
            ticker,
            start,
            end,
            period,
            config,
            table,
            out_dir,
            dry_run,
            timeout_secs,
        } => {
            let request = FetchRequest {
                ticker,
                start,
                end,
                period,
            };
            let opts = FetchOptions {
                table,
                out_dir,
                dry_run,
                timeout: Duration::from_secs(timeout_secs),
            };
            run_fetch(source, &request, config.as_deref(), &opts)
        }
        Commands::Sources { config } => run_sources(config.as_deref()),
        Commands::CheckConfig { config } => run_check_config(config.as_deref()),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            AppConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => AppConfig::builtin().context("Built-in config is invalid"),
    }
}

struct FetchOptions {
    table: String,
    out_dir: PathBuf,
    dry_run: bool,
    timeout: Duration,
}

fn run_fetch(
    source: SourceKind,
    request: &FetchRequest,
    config_path: Option<&Path>,
    opts: &FetchOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let adapter = source
        .build(&config, request, dates::today())
        .with_context(|| format!("Failed to set up {source} request"))?;
    let client = HttpClient::new(opts.timeout)?;

    let result = adapter.run(&client);

    if opts.dry_run {
        match &result {
            Some(rs) => print_json_lines(rs)?,
            None => println!("Nothing to load."),
        }
        return Ok(());
    }

    let mut sink = CsvSink::new(&opts.out_dir);
    match load_result(&mut sink, &opts.table, result.as_ref())? {
        LoadOutcome::Skipped => println!("Nothing to load."),
        LoadOutcome::Loaded(n) => {
            let path = sink.table_path(&opts.table)?;
            info!(source = %source, ticker = adapter.ticker(), rows = n, "fetch complete");
            println!("Loaded {n} row(s) into {}", path.display());
        }
    }
    Ok(())
}

fn print_json_lines(rs: &ResultSet) -> Result<()> {
    for row in &rs.rows {
        let obj: Map<String, Value> = rs
            .columns
            .iter()
            .zip(row)
            .map(|(col, cell)| serde_json::to_value(cell).map(|v| (col.clone(), v)))
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string(&obj)?);
    }
    Ok(())
}

fn run_sources(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    for (name, source) in &config.sources {
        println!("[{name}]");
        match &source.tickers {
            TickerRules::Single { allowed, default } => {
                println!("  tickers:  {} (default {default})", allowed.join(", "));
            }
            TickerRules::Pairs { pairs } => {
                for (base, quotes) in pairs {
                    println!("  {base}_*:    {}", quotes.join(", "));
                }
            }
        }
        if name == poloniex::NAME {
            let periods: Vec<String> = poloniex::ALLOWED_PERIODS.iter().map(u32::to_string).collect();
            println!("  periods:  {} (default {})", periods.join(", "), poloniex::DEFAULT_PERIOD);
        }
        println!("  columns:  {}", source.columns().join(", "));
        println!();
    }
    Ok(())
}

fn run_check_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let known: Vec<&str> = SourceKind::ALL.iter().map(|k| k.name()).collect();

    for name in config.source_names() {
        if !known.contains(&name) {
            println!("WARNING: section [{name}] has no adapter and will be ignored");
        }
    }
    for kind in SourceKind::ALL {
        if config.source(kind.name()).is_err() {
            println!("WARNING: no section for {kind}; fetches from it will fail");
        }
    }

    println!(
        "Config OK: {} source(s): {}",
        config.sources.len(),
        config.source_names().join(", ")
    );
    Ok(())
}
