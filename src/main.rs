//! Site Indexer main entry point
//!
//! This is the command-line interface for the site indexer. Results go to stdout, logs to
//! stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use site_indexer::config::load_config_with_hash;
use site_indexer::output::{
    format_columns, format_page, format_plan, format_search_results, format_sites,
    format_summary, format_tables, write_report,
};
use site_indexer::{CancelToken, CrawlJobSummary, JobState, SiteIndexer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Site Indexer: crawl a site into a searchable chunk index
///
/// Pages are discovered within a scope rule, fetched politely, reduced to their main text,
/// split into chunks and stored in SQLite. Refreshing a site skips unchanged pages and
/// tombstones pages that are gone.
#[derive(Parser, Debug)]
#[command(name = "site-indexer")]
#[command(version)]
#[command(about = "Crawl, chunk and search a web site", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Path to the index database
    #[arg(
        long,
        env = "SITEINDEXER_DB",
        default_value = ".siteindexer/siteindexer.db",
        global = true
    )]
    database: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a site config, store it as the site's plan and show what would be crawled
    Plan {
        /// Path to TOML site configuration
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Plan and index a site from its configuration
    Run {
        /// Path to TOML site configuration
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Also write the job summary as markdown to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Re-crawl a stored site, skipping unchanged pages
    Refresh {
        /// Site name
        site: String,

        /// Also write the job summary as markdown to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Search a site's chunks
    Search {
        /// Site name
        site: String,

        /// Query text
        query: String,

        /// Maximum number of results (defaults to the site's configured limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a stored page and its chunks
    Page {
        /// Site name
        site: String,

        /// Page URL
        url: String,
    },

    /// List indexed sites
    Sites,

    /// List the tables of the index database with row counts
    Tables,

    /// Show the columns of one table of the index database
    Describe {
        /// Table name
        table: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let indexer = SiteIndexer::open(&cli.database)
        .with_context(|| format!("Failed to open database {}", cli.database.display()))?;

    match cli.command {
        Command::Plan { config } => {
            let (config, hash) = load_config_with_hash(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            tracing::info!("Configuration loaded (hash: {})", hash);

            let plan = indexer.plan_index(&config)?;
            println!("{}", format_plan(&plan));
        }

        Command::Run { config, report } => {
            tracing::info!("Loading configuration from: {}", config.display());
            let (config, hash) = load_config_with_hash(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            tracing::info!("Configuration loaded (hash: {})", hash);

            // The file is the site's definition: re-plan so the stored site follows it
            let plan = indexer.plan_index(&config)?;
            for warning in &plan.warnings {
                tracing::warn!("{}", warning);
            }

            let cancel = cancel_on_ctrl_c();
            let summary = indexer.run_index_with_cancel(config, cancel).await?;
            print_summary(&summary, report)?;
        }

        Command::Refresh { site, report } => {
            let cancel = cancel_on_ctrl_c();
            let summary = indexer.refresh_with_cancel(&site, cancel).await?;
            print_summary(&summary, report)?;
        }

        Command::Search { site, query, limit } => {
            let results = indexer.search(&site, &query, limit)?;
            print!("{}", format_search_results(&query, &results));
        }

        Command::Page { site, url } => match indexer.get_page(&site, &url)? {
            Some(detail) => println!("{}", format_page(&detail)),
            None => anyhow::bail!("No page {} stored for site '{}'", url, site),
        },

        Command::Sites => {
            print!("{}", format_sites(&indexer.list_sites()?));
        }

        Command::Tables => {
            print!("{}", format_tables(&indexer.list_tables()?));
        }

        Command::Describe { table } => match indexer.describe_table(&table)? {
            Some(columns) => print!("{}", format_columns(&table, &columns)),
            None => anyhow::bail!("No table named '{}' in the index database", table),
        },
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_indexer=info,warn"),
            1 => EnvFilter::new("site_indexer=debug,info"),
            2 => EnvFilter::new("site_indexer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Returns a token that fires on the first Ctrl-C; in-flight fetches drain before exit
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, letting in-flight pages finish");
            trigger.cancel();
        }
    });
    cancel
}

fn print_summary(summary: &CrawlJobSummary, report: Option<PathBuf>) -> anyhow::Result<()> {
    let markdown = format_summary(summary);
    println!("{}", markdown);

    if let Some(path) = report {
        write_report(&markdown, &path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        tracing::info!("Summary written to: {}", path.display());
    }

    if summary.state == JobState::Failed {
        anyhow::bail!("Job {} failed", summary.job_id);
    }
    Ok(())
}
