use anyhow::Context;
use clap::{Parser, Subcommand};
use eventi_scraper::assembler::EventAssembler;
use eventi_scraper::config::Config;
use eventi_scraper::enrich::DescriptionEnricher;
use eventi_scraper::extractor::EventSelectors;
use eventi_scraper::infra::description_client::ChatCompletionsDescriber;
use eventi_scraper::infra::http_client::ReqwestPageSource;
use eventi_scraper::pipeline::PipelineDriver;
use eventi_scraper::storage::{DedupStore, JsonFileStore};
use eventi_scraper::types::{EventRecord, RunSummary};
use eventi_scraper::{logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "eventi_scraper")]
#[command(about = "Scrapes event pages from a listing and merges them into a JSON collection")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration; built-in defaults are used when it does not exist
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Directory for the rolling JSON log file
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every event on the listing page and merge new ones into the collection
    Run {
        /// Overrides `source.listing_url`
        #[arg(long)]
        listing_url: Option<String>,
        /// Overrides `store.path`
        #[arg(long)]
        output: Option<PathBuf>,
        /// Generate descriptions even if `description.enabled` is false
        #[arg(long)]
        describe: bool,
    },
    /// Print the canonical form of an Italian date text
    NormalizeDate { text: String },
    /// Merge JSON event arrays into a collection file without creating duplicates
    Merge {
        /// Collection to merge into; overrides `store.path`
        #[arg(long)]
        into: Option<PathBuf>,
        files: Vec<PathBuf>,
    },
}

async fn cancellation(run_timeout_seconds: Option<u64>) {
    let deadline = async {
        match run_timeout_seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => warn!("Interrupt received"),
        _ = deadline => warn!("Run deadline reached"),
    }
}

fn print_summary(summary: &RunSummary, output: &std::path::Path) {
    println!("\n📊 Run results:");
    println!("   Links attempted: {}", summary.attempted);
    println!("   Assembled: {}", summary.assembled);
    println!("   Failed: {}", summary.failed);
    println!("   New events added: {}", summary.added);
    println!("   Total events in {}: {}", output.display(), summary.total);
    if summary.enrichment_failed > 0 {
        println!("   Without generated description: {}", summary.enrichment_failed);
    }
    if summary.cancelled {
        println!("   ⚠️  Run was cancelled before every link finished");
    }
    if !summary.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("   - {}", error);
        }
    }
    let secs = summary.elapsed_seconds as u64;
    println!(
        "\n⏱️  Completed in {}h {}m {}s",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    );
}

async fn run(mut config: Config, describe: bool) -> anyhow::Result<()> {
    if describe {
        config.description.enabled = true;
    }
    config.description.resolve_api_key();

    if let Some(port) = config.metrics.prometheus_port {
        metrics::init_metrics(port);
    }

    // Everything that can be misconfigured fails here, before any fetch
    let selectors = EventSelectors::from_config(&config.selectors)?;
    let assembler = EventAssembler::new(selectors, config.dates.normalizer()?);
    let page_source = Arc::new(ReqwestPageSource::new(&config.source)?);
    let store = DedupStore::new(
        Arc::new(JsonFileStore::new(&config.store.path)),
        config.store.duplicate_policy,
    );

    let mut driver = PipelineDriver::new(page_source, assembler, store)
        .with_concurrency(config.source.concurrency);
    if config.description.enabled {
        let describer = ChatCompletionsDescriber::new(&config.description)?;
        driver = driver.with_enricher(DescriptionEnricher::new(Arc::new(describer)));
    }

    println!("🔄 Scraping {}", config.source.listing_url);
    let summary = driver
        .run_until(
            &config.source.listing_url,
            cancellation(config.source.run_timeout_seconds),
        )
        .await?;

    info!(
        attempted = summary.attempted,
        assembled = summary.assembled,
        added = summary.added,
        failed = summary.failed,
        "Run finished"
    );
    print_summary(&summary, &config.store.path);
    Ok(())
}

fn merge_files(config: &Config, files: &[PathBuf]) -> anyhow::Result<()> {
    let normalizer = config.dates.normalizer()?;
    let mut incoming = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let records: Vec<EventRecord> = serde_json::from_str(&content)
            .with_context(|| format!("decoding {}", file.display()))?;
        for mut record in records {
            match normalizer.normalize(&record.date) {
                Ok(date) => {
                    record.date = date;
                    incoming.push(record);
                }
                Err(e) => warn!("Skipping '{}' from {}: {}", record.title, file.display(), e),
            }
        }
    }

    let store = DedupStore::new(
        Arc::new(JsonFileStore::new(&config.store.path)),
        config.store.duplicate_policy,
    );
    let outcome = store.merge_and_persist(incoming)?;
    println!(
        "{} new events added. Total events in {}: {}",
        outcome.added,
        config.store.path.display(),
        outcome.total
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = logging::init_logging(&cli.log_dir);

    let mut config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Run {
            listing_url,
            output,
            describe,
        } => {
            if let Some(url) = listing_url {
                config.source.listing_url = url;
            }
            if let Some(path) = output {
                config.store.path = path;
            }
            if let Err(e) = run(config, describe).await {
                error!("Run failed: {:#}", e);
                println!("❌ Run failed: {:#}", e);
                return Err(e);
            }
        }
        Commands::NormalizeDate { text } => {
            let normalizer = config.dates.normalizer()?;
            match normalizer.normalize(&text) {
                Ok(date) => println!("{date}"),
                Err(e) => {
                    println!("❌ {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Merge { into, files } => {
            if let Some(path) = into {
                config.store.path = path;
            }
            merge_files(&config, &files)?;
        }
    }
    Ok(())
}
