//! Site-Sentinel main entry point
//!
//! This is the command-line interface for the Site-Sentinel website validator.

use anyhow::{bail, Context};
use clap::Parser;
use site_sentinel::config::{load_config_with_hash, validate as validate_config, Config};
use site_sentinel::crawler::validate;
use site_sentinel::output::{
    load_statistics, print_statistics, write_issues_json, OutputError, ValidationReport,
};
use site_sentinel::storage::{open_storage, persist_run, Storage};
use site_sentinel::{PageStatus, Severity};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Site-Sentinel: a website validation crawler
///
/// Site-Sentinel crawls a site from its seed URL, classifies every response
/// (HTTP errors, TLS failures, timeouts, redirect loops, broken links) and
/// writes a severity-ranked issue list.
#[derive(Parser, Debug)]
#[command(name = "site-sentinel")]
#[command(version)]
#[command(about = "A website validation crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_issues"])]
    dry_run: bool,

    /// Show statistics of the latest run in the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_issues"])]
    stats: bool,

    /// Rewrite issues.json from the latest run in the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_issues: bool,

    /// Override the configured seed URL
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Override the configured run deadline
    #[arg(long, value_name = "N")]
    deadline_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(seed) = cli.seed {
        config.validator.seed = seed;
    }
    if let Some(deadline) = cli.deadline_secs {
        config.validator.deadline_secs = deadline;
    }
    validate_config(&config).context("Invalid configuration after command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_issues {
        handle_export_issues(&config)?;
    } else {
        handle_validate(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_sentinel=info,warn"),
            1 => EnvFilter::new("site_sentinel=debug,info"),
            2 => EnvFilter::new("site_sentinel=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn database_path(config: &Config) -> anyhow::Result<&Path> {
    match &config.output.database_path {
        Some(path) => Ok(Path::new(path)),
        None => bail!("No [output] database-path configured"),
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Site-Sentinel Dry Run ===\n");

    println!("Validator:");
    println!("  Seed: {}", config.validator.seed);
    println!("  Max depth: {}", config.validator.max_depth);
    println!("  Max pages: {}", config.validator.max_pages);
    println!(
        "  Concurrency: {} global, {} per host",
        config.validator.max_concurrent_fetches, config.validator.per_host_concurrency
    );
    println!(
        "  Politeness delay: {}ms",
        config.validator.politeness_delay_ms
    );
    println!("  Deadline: {}s", config.validator.deadline_secs);

    println!("\nScope:");
    if config.scope.allowed_hosts.is_empty() {
        println!("  Allowed hosts: seed host only");
    } else {
        for pattern in &config.scope.allowed_hosts {
            println!("  - {}", pattern);
        }
    }
    println!(
        "  Follow seed redirect: {}",
        config.scope.follow_seed_redirect
    );

    println!("\nFetcher:");
    println!(
        "  Timeouts: {}ms request, {}ms connect",
        config.fetcher.request_timeout_ms, config.fetcher.connect_timeout_ms
    );
    println!(
        "  Max redirects: {}, max retries: {}",
        config.fetcher.max_redirects, config.fetcher.max_retries
    );
    if let Some(proxy) = &config.fetcher.proxy {
        println!("  Proxy: {}", proxy);
    }
    println!("  User-Agent: {}", config.user_agent.header_value());

    println!("\nReview pages ({}):", config.review.pages.len());
    for page in &config.review.pages {
        println!("  - {}", page);
    }

    println!("\nOutput:");
    println!("  Issues: {}", config.output.issues_path);
    if let Some(db) = &config.output.database_path {
        println!("  Database: {}", db);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics of the latest run
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = database_path(config)?;
    println!("Database: {}\n", path.display());

    let storage = open_storage(path)?;
    let run = storage.get_latest_run()?.ok_or(OutputError::NoRuns)?;
    let stats = load_statistics(&storage, run.id)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-issues mode: rewrites issues.json from storage
fn handle_export_issues(config: &Config) -> anyhow::Result<()> {
    let path = database_path(config)?;
    let storage = open_storage(path)?;
    let run = storage.get_latest_run()?.ok_or(OutputError::NoRuns)?;

    tracing::info!("Loading run {} from {}", run.id, path.display());
    let report = ValidationReport::from_storage(&storage, run.id)?;
    write_issues_json(&report, Path::new(&config.output.issues_path))?;

    println!("✓ Issues exported to: {}", config.output.issues_path);
    Ok(())
}

/// Handles the main validation run
async fn handle_validate(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let issues_path = PathBuf::from(&config.output.issues_path);
    let db_path = config.output.database_path.clone();

    let run = validate(config).await.context("Validation run failed")?;

    let report = ValidationReport::from_run(&run, config_hash);
    write_issues_json(&report, &issues_path)?;

    if let Some(db_path) = db_path {
        let mut storage = open_storage(Path::new(&db_path))?;
        persist_run(&mut storage, &run, config_hash)?;
    }

    tracing::info!(
        "Validation of {} finished: {} pages ({} fetched, {} failed, {} pending){}",
        run.seed,
        run.records.len(),
        run.count_by_status(PageStatus::Fetched),
        run.count_by_status(PageStatus::Failed),
        run.count_by_status(PageStatus::Pending),
        if run.deadline_hit { ", deadline hit" } else { "" }
    );
    let counts = &report.summary.issues_by_severity;
    tracing::info!(
        "Issues: {} {}, {} {}, {} {}, {} {}",
        counts.get(Severity::High),
        Severity::High,
        counts.get(Severity::Medium),
        Severity::Medium,
        counts.get(Severity::Low),
        Severity::Low,
        counts.get(Severity::Info),
        Severity::Info
    );

    Ok(())
}
