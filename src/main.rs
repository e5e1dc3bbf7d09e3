//! Newsprint main entry point
//!
//! Command surface over the crawl engine and the capture orchestrator.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use newsprint::capture::{
    interleave_by_group, load_completed_ids, read_jobs_from_path, write_results, CaptureMode,
    CaptureOrchestrator, CapturePlan, CaptureResult, ImageFormat, OutputLayout, RenderBackend,
};
use newsprint::config::{load_capture_config, load_site_config_with_hash, CaptureConfig, SiteConfig};
use newsprint::crawler::CrawlEngine;
use newsprint::detect::ContentDetector;
use newsprint::output::{
    format_capture_summary, format_crawl_summary, print_capture_statistics,
    print_crawl_statistics, write_markdown, JsonArticleWriter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Newsprint: configuration-driven news crawling and page capture
///
/// `crawl` walks the category listings of a configured news site and writes
/// the extracted articles as JSON. `capture` renders a table of article URLs
/// to full-page and content-region images.
#[derive(Parser, Debug)]
#[command(name = "newsprint")]
#[command(version)]
#[command(about = "Configuration-driven news crawling and page capture", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the categories of one site
    Crawl(CrawlArgs),
    /// Capture screenshots of the URLs listed in a CSV file
    Capture(CaptureArgs),
    /// Validate site or capture configuration documents and exit
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Path to the site document (.toml, .yaml or .yml)
    #[arg(value_name = "SITE_CONFIG")]
    config: PathBuf,

    /// Categories to crawl (repeatable); all categories when omitted
    #[arg(short, long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Maximum articles per category; 0 means no limit
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Maximum listing pages per category
    #[arg(short = 'p', long, default_value_t = 5)]
    max_pages: i64,

    /// Directory receiving raw and classified JSON output
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Also write a markdown summary to this path
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// CSV file listing the pages to capture
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Capture configuration document
    #[arg(short, long, value_name = "CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override the capture mode (full-page, content, both)
    #[arg(short, long)]
    mode: Option<CaptureMode>,

    /// Override the image format (png, jpeg, webp)
    #[arg(short, long)]
    format: Option<ImageFormat>,

    /// Override the batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override the number of workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip identifiers already captured successfully in the results file
    #[arg(long)]
    skip_completed: bool,

    /// Also write a markdown summary to this path
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Documents to validate
    #[arg(value_name = "CONFIG", required = true)]
    configs: Vec<PathBuf>,

    /// Treat the documents as capture configuration
    #[arg(long)]
    capture: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl(args) => handle_crawl(args).await,
        Command::Capture(args) => handle_capture(args).await,
        Command::Validate(args) => handle_validate(&args),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("newsprint=info,warn"),
            1 => EnvFilter::new("newsprint=debug,info"),
            2 => EnvFilter::new("newsprint=trace,debug"),
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

fn needs_script_driver(site: &SiteConfig) -> bool {
    site.categories
        .values()
        .any(|c| c.pagination.kind_name() == "script-triggered-load")
}

#[cfg(feature = "chromium")]
async fn attach_script_driver(engine: CrawlEngine, site: &SiteConfig) -> anyhow::Result<CrawlEngine> {
    if !needs_script_driver(site) {
        return Ok(engine);
    }
    let backend = Arc::new(newsprint::capture::ChromiumBackend::launch(site.crawl.timeout).await?);
    Ok(engine.with_script_driver(backend.script_driver()))
}

#[cfg(not(feature = "chromium"))]
async fn attach_script_driver(engine: CrawlEngine, site: &SiteConfig) -> anyhow::Result<CrawlEngine> {
    if needs_script_driver(site) {
        tracing::warn!(
            "Script-triggered pagination needs a browser; rebuild with the `chromium` feature"
        );
    }
    Ok(engine)
}

/// Handles the crawl subcommand
async fn handle_crawl(args: CrawlArgs) -> anyhow::Result<()> {
    tracing::info!("Loading site configuration from: {}", args.config.display());
    let (site, hash) = load_site_config_with_hash(&args.config)
        .with_context(|| format!("invalid site configuration {}", args.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let engine = CrawlEngine::new(site.clone())?.with_config_hash(hash);
    let engine = attach_script_driver(engine, &site).await?;

    let report = engine
        .crawl(&args.categories, args.limit, args.max_pages)
        .await?;

    let written = JsonArticleWriter::new(&args.output).write_report(&report)?;
    println!("Raw output: {}", written.raw.display());
    for path in &written.classified {
        println!("Classified: {}", path.display());
    }
    println!();

    print_crawl_statistics(&report);

    if let Some(path) = &args.summary {
        write_markdown(&format_crawl_summary(&report), path)?;
        println!("\n✓ Summary written to: {}", path.display());
    }

    Ok(())
}

#[cfg(feature = "chromium")]
async fn render_backend(config: &CaptureConfig) -> anyhow::Result<Arc<dyn RenderBackend>> {
    let backend = newsprint::capture::ChromiumBackend::launch(config.settings.job_timeout).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "chromium"))]
async fn render_backend(_config: &CaptureConfig) -> anyhow::Result<Arc<dyn RenderBackend>> {
    anyhow::bail!("capturing needs a browser; rebuild with `--features chromium`")
}

fn capture_config(args: &CaptureArgs) -> anyhow::Result<CaptureConfig> {
    let mut config = match &args.config {
        Some(path) => load_capture_config(path)
            .with_context(|| format!("invalid capture configuration {}", path.display()))?,
        None => CaptureConfig::default(),
    };

    let settings = &mut config.settings;
    if let Some(dir) = &args.output_dir {
        if let Ok(rest) = settings.results_file.strip_prefix(&settings.output_dir) {
            let moved = dir.join(rest);
            settings.results_file = moved;
        }
        settings.output_dir = dir.clone();
    }
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if let Some(format) = args.format {
        settings.format = format;
    }
    if let Some(n) = args.batch_size {
        anyhow::ensure!(n >= 1, "--batch-size must be at least 1");
        settings.batch_size = n;
    }
    if let Some(n) = args.workers {
        anyhow::ensure!(n >= 1, "--workers must be at least 1");
        settings.max_workers = n;
    }
    settings.skip_completed |= args.skip_completed;

    Ok(config)
}

/// Handles the capture subcommand
async fn handle_capture(args: CaptureArgs) -> anyhow::Result<()> {
    let config = capture_config(&args)?;
    let settings = &config.settings;

    let input = read_jobs_from_path(&args.input, &config.columns)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let mut skipped: Vec<CaptureResult> = input.skipped;
    let mut jobs = input.jobs;

    if settings.skip_completed {
        let completed = load_completed_ids(&settings.results_file)?;
        let before = jobs.len();
        jobs.retain(|job| !completed.contains(&job.id));
        tracing::info!("Skipping {} already captured job(s)", before - jobs.len());
    }
    if settings.interleave_groups {
        jobs = interleave_by_group(jobs);
    }

    let detector = ContentDetector::new(config.detector.clone())?;
    let backend = render_backend(&config).await?;
    let orchestrator = CaptureOrchestrator::new(
        backend,
        detector,
        OutputLayout::new(&settings.output_dir),
    );

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight jobs");
            token.cancel();
        }
    });

    let plan = CapturePlan::from_settings(settings, config.popup_selectors.clone());
    let mut run = orchestrator.run(jobs, &plan).await;
    run.results.append(&mut skipped);

    write_results(&settings.results_file, &run.results)?;
    println!("Results index: {}\n", settings.results_file.display());
    print_capture_statistics(&run);

    if let Some(path) = &args.summary {
        write_markdown(&format_capture_summary(&run), path)?;
        println!("\n✓ Summary written to: {}", path.display());
    }

    Ok(())
}

fn validate_one(path: &Path, capture: bool) -> anyhow::Result<String> {
    if capture {
        let config = load_capture_config(path)?;
        ContentDetector::new(config.detector)?;
        Ok(format!(
            "capture: {} worker(s), batches of {}, mode {}, format {}",
            config.settings.max_workers,
            config.settings.batch_size,
            config.settings.mode,
            config.settings.format
        ))
    } else {
        let (site, hash) = load_site_config_with_hash(path)?;
        let categories: Vec<String> = site
            .categories
            .values()
            .map(|c| format!("{} ({})", c.name, c.pagination.kind_name()))
            .collect();
        Ok(format!(
            "site '{}' at {}, categories: {} [hash {}]",
            site.site_name,
            site.base_url,
            categories.join(", "),
            &hash[..12]
        ))
    }
}

/// Handles the validate subcommand: reports every document, fails if any
/// is invalid
fn handle_validate(args: &ValidateArgs) -> anyhow::Result<()> {
    let mut invalid = 0;
    for path in &args.configs {
        match validate_one(path, args.capture) {
            Ok(description) => println!("✓ {}: {}", path.display(), description),
            Err(e) => {
                invalid += 1;
                println!("✗ {}: {}", path.display(), e);
            }
        }
    }

    anyhow::ensure!(invalid == 0, "{} invalid document(s)", invalid);
    Ok(())
}
