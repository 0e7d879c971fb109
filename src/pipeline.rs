use crate::app::ports::PageSourcePort;
use crate::assembler::EventAssembler;
use crate::document::HtmlDocument;
use crate::enrich::DescriptionEnricher;
use crate::error::{ConfigError, Result, ScraperError};
use crate::extractor::extract_links;
use crate::metrics::PipelineMetrics;
use crate::storage::DedupStore;
use crate::types::{EventRecord, RunSummary};
use chrono::Utc;
use reqwest::Url;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

enum LinkOutcome {
    Assembled {
        record: EventRecord,
        enrichment_failed: bool,
    },
    Failed(String),
}

/// Drives one run: listing page, every event link, then a single merge into the store.
pub struct PipelineDriver {
    page_source: Arc<dyn PageSourcePort>,
    assembler: Arc<EventAssembler>,
    enricher: Option<DescriptionEnricher>,
    store: DedupStore,
    concurrency: usize,
}

impl PipelineDriver {
    pub fn new(
        page_source: Arc<dyn PageSourcePort>,
        assembler: EventAssembler,
        store: DedupStore,
    ) -> Self {
        Self {
            page_source,
            assembler: Arc::new(assembler),
            enricher: None,
            store,
            concurrency: 1,
        }
    }

    pub fn with_enricher(mut self, enricher: DescriptionEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetches the listing page and returns the absolute event links it carries.
    ///
    /// This is the only fetch whose failure aborts a run.
    #[instrument(skip(self))]
    pub async fn discover_links(&self, listing_url: &str) -> Result<Vec<String>> {
        let base = Url::parse(listing_url).map_err(|e| ConfigError::InvalidUrl {
            url: listing_url.to_string(),
            reason: e.to_string(),
        })?;

        let page = self
            .page_source
            .fetch_rendered(listing_url)
            .await
            .map_err(ScraperError::Listing)?;

        // Resolve against where the listing actually ended up after redirects
        let base = Url::parse(&page.url).unwrap_or(base);
        let links = {
            let document = HtmlDocument::parse(&page.html);
            extract_links(&document, &self.assembler.selectors().listing_links, &base)
        };

        info!("Found {} event links on {}", links.len(), listing_url);
        Ok(links.into_iter().map(String::from).collect())
    }

    pub async fn run(&self, listing_url: &str) -> Result<RunSummary> {
        self.run_until(listing_url, std::future::pending()).await
    }

    /// Like [`PipelineDriver::run`], but stops early when `cancel` resolves.
    pub async fn run_until<F>(&self, listing_url: &str, cancel: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let links = self.discover_links(listing_url).await?;
        self.run_links_until(links, cancel).await
    }

    pub async fn run_links(&self, links: Vec<String>) -> Result<RunSummary> {
        self.run_links_until(links, std::future::pending()).await
    }

    /// Processes `links` on a bounded worker pool and commits the results once.
    ///
    /// When `cancel` resolves, unfinished links are abandoned and counted as failed, and
    /// whatever was already assembled, collected or not, is still merged into the store.
    #[instrument(skip_all, fields(links = links.len()))]
    pub async fn run_links_until<F>(&self, links: Vec<String>, cancel: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let t_run = Instant::now();
        info!("🚀 Processing {} event links", links.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (index, link) in links.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let page_source = self.page_source.clone();
            let assembler = self.assembler.clone();
            let enricher = self.enricher.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome =
                    process_link(page_source.as_ref(), &assembler, enricher.as_ref(), &link).await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<LinkOutcome>> = links.iter().map(|_| None).collect();
        let mut cancelled = false;
        tokio::pin!(cancel);
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, outcome))) => outcomes[index] = Some(outcome),
                    Some(Err(e)) => warn!("Worker task ended abnormally: {}", e),
                    None => break,
                },
                _ = &mut cancel => {
                    cancelled = true;
                    warn!("Run cancelled, keeping events assembled so far");
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Workers that finished before the abort still hand back their outcome
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("Worker task ended abnormally: {}", e),
            }
        }

        let mut records = Vec::new();
        let mut failed = 0;
        let mut enrichment_failed = 0;
        let mut errors = Vec::new();
        for (link, outcome) in links.iter().zip(outcomes) {
            match outcome {
                Some(LinkOutcome::Assembled {
                    record,
                    enrichment_failed: enrich_err,
                }) => {
                    if enrich_err {
                        enrichment_failed += 1;
                    }
                    records.push(record);
                }
                Some(LinkOutcome::Failed(message)) => {
                    failed += 1;
                    errors.push(message);
                }
                None => {
                    failed += 1;
                    PipelineMetrics::record_link_failed("unfinished");
                    errors.push(format!("{link}: not completed"));
                }
            }
        }

        let assembled = records.len();
        info!(
            "✅ Assembled {} events ({} failed, {} without generated description)",
            assembled, failed, enrichment_failed
        );

        let outcome = self.store.merge_and_persist(records)?;

        let elapsed_seconds = t_run.elapsed().as_secs_f64();
        PipelineMetrics::record_run(outcome.added, cancelled, elapsed_seconds);

        Ok(RunSummary {
            attempted: links.len(),
            assembled,
            added: outcome.added,
            failed,
            enrichment_failed,
            total: outcome.total,
            cancelled,
            started_at,
            elapsed_seconds,
            errors,
        })
    }
}

async fn process_link(
    page_source: &dyn PageSourcePort,
    assembler: &EventAssembler,
    enricher: Option<&DescriptionEnricher>,
    link: &str,
) -> LinkOutcome {
    let page = match page_source.fetch_rendered(link).await {
        Ok(page) => page,
        Err(e) => {
            warn!("Skipping {}: {}", link, e);
            PipelineMetrics::record_link_failed("fetch");
            return LinkOutcome::Failed(format!("{link}: {e}"));
        }
    };

    // Parsed and dropped synchronously; the document never lives across an await
    let mut record = match assembler.assemble_html(&page.html, link) {
        Ok(record) => record,
        Err(e) => {
            warn!("Skipping {}: {}", link, e);
            PipelineMetrics::record_link_failed("assembly");
            return LinkOutcome::Failed(format!("{link}: {e}"));
        }
    };
    PipelineMetrics::record_link_assembled();
    debug!("Scraped {}", record.title);

    let mut enrichment_failed = false;
    if let Some(enricher) = enricher {
        if enricher.enrich(&mut record).await.is_err() {
            PipelineMetrics::record_enrichment_failed();
            enrichment_failed = true;
        }
    }

    LinkOutcome::Assembled {
        record,
        enrichment_failed,
    }
}
