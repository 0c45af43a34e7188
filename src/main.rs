mod config;
mod driver;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::driver::SnapshotDriver;
use crate::pipeline::Pipeline;
use crate::scraper::{DilutionScraper, SectionSettings};
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "dilution-etl", about = "Dilution risk scraper and loader", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Log in, scrape every ticker in the tickers file and store the results
    Scrape {
        /// Tickers CSV (`name,key` rows); defaults to pipeline.tickers_csv
        #[arg(short, long, env = "DT_TICKERS")]
        tickers: Option<PathBuf>,

        /// Stop after this many tickers
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run the section parsers over a saved company page and print JSON
    Parse {
        /// HTML snapshot of a company dashboard
        file: PathBuf,

        #[arg(short, long, default_value = "SNAPSHOT")]
        ticker: String,
    },

    /// Show database statistics
    Stats,

    /// Apply schema migrations without scraping
    Migrate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "dilution_etl=info,warn",
        1 => "dilution_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Scrape { tickers, limit } => {
            let _t = utils::Timer::start("Dilution scrape");
            let stats = Pipeline::new(config).run(tickers.as_deref(), limit)?;
            info!(
                "Done: {} tickers, {} not covered, {} rows, {} errors",
                stats.tickers_processed, stats.not_found, stats.records_saved, stats.errors
            );
        }

        Command::Parse { file, ticker } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Could not read {:?}", file))?;
            let url = format!("file://{}", file.display());
            let driver = SnapshotDriver::from_html(&url, &html);
            let mut scraper = DilutionScraper::new(
                driver,
                &config.browser,
                SectionSettings::from(&config.pipeline),
            )?;
            let report = scraper.collect(&ticker, false)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let (found, not_found) = repo.coverage_counts()?;
            let last = repo.last_scrape()?;
            println!("─────────────────────────────────");
            println!("  Dilution ETL — Database Stats");
            println!("─────────────────────────────────");
            for (table, count) in repo.table_counts()? {
                println!("  {:<20}: {}", table, utils::fmt_number(count));
            }
            println!("  Covered tickers     : {}", utils::fmt_number(found));
            println!("  Not covered         : {}", utils::fmt_number(not_found));
            println!(
                "  Last scrape         : {}",
                last.map(|d| d.to_string()).unwrap_or("—".into())
            );
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
