//! Harvest orchestration across sites
//!
//! Each site job owns its config, its engine and the product category its
//! pages produce. Jobs run one after another or as independent tokio tasks;
//! every task fills its own outcome buffer and the buffers are joined at the
//! end, so no state is shared while sites are crawled.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::classifier::ProductClassifier;
use crate::application::context::RunContext;
use crate::application::sink::ProductSink;
use crate::domain::{CrawlOutcome, DetailOutcome, FailureReason, Product, ProductCategory, SiteConfig, SkipReason};
use crate::infrastructure::config::{BlockPolicy, EngineSettings, ExecutionMode, HttpSettings};
use crate::infrastructure::extraction_engine::ExtractionEngine;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};
use crate::infrastructure::http_navigator::HttpNavigator;

/// One site to harvest
pub struct SiteJob {
    pub config: SiteConfig,
    pub engine: ExtractionEngine,
    pub category: ProductCategory,
}

impl SiteJob {
    pub fn new(config: SiteConfig, engine: ExtractionEngine, category: ProductCategory) -> Self {
        Self {
            config,
            engine,
            category,
        }
    }

    /// Job backed by its own HTTP navigator and randomized pacing
    pub fn over_http(
        config: SiteConfig,
        category: ProductCategory,
        engine_settings: &EngineSettings,
        http_settings: &HttpSettings,
        seed: u64,
    ) -> Result<Self> {
        let navigator = HttpNavigator::new(http_settings, seed)?;
        let engine = ExtractionEngine::with_random_delay(Box::new(navigator), engine_settings.clone(), seed.rotate_left(17));
        Ok(Self::new(config, engine, category))
    }
}

/// Outcomes of one site
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteReport {
    pub site_url: String,
    pub category: ProductCategory,
    pub outcomes: Vec<CrawlOutcome>,
    /// Error that stopped the site early, if any
    pub fatal_error: Option<String>,
}

impl SiteReport {
    fn new(site_url: &str, category: ProductCategory) -> Self {
        Self {
            site_url: site_url.to_string(),
            category,
            outcomes: Vec::new(),
            fatal_error: None,
        }
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.outcomes.iter().filter_map(CrawlOutcome::product)
    }

    pub fn was_blocked(&self) -> bool {
        self.outcomes.iter().any(CrawlOutcome::is_blocked)
    }
}

/// Everything a harvest run produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sites: Vec<SiteReport>,
}

impl HarvestReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &CrawlOutcome> {
        self.sites.iter().flat_map(|site| site.outcomes.iter())
    }

    pub fn success_count(&self) -> usize {
        self.outcomes().filter(|o| o.is_success()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes().filter(|o| matches!(o, CrawlOutcome::Skipped { .. })).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes().filter(|o| matches!(o, CrawlOutcome::Failed { .. })).count()
    }

    /// Successful products grouped by the category of the job that produced them
    pub fn products_by_category(&self) -> BTreeMap<ProductCategory, Vec<Product>> {
        let mut partitions: BTreeMap<ProductCategory, Vec<Product>> = BTreeMap::new();
        for site in &self.sites {
            for product in site.products() {
                partitions.entry(site.category).or_default().push(product.clone());
            }
        }
        partitions
    }

    /// Hand every category partition to `sink`; returns the number of products delivered
    pub fn deliver(&self, sink: &mut dyn ProductSink) -> Result<usize> {
        let mut delivered = 0;
        for (category, products) in self.products_by_category() {
            sink.accept(category, &products)?;
            info!("Delivered {} {} products", products.len(), category);
            delivered += products.len();
        }
        Ok(delivered)
    }
}

pub struct HarvestOrchestrator {
    context: RunContext,
    mode: ExecutionMode,
    block_policy: BlockPolicy,
}

impl HarvestOrchestrator {
    pub fn new(context: RunContext, mode: ExecutionMode, block_policy: BlockPolicy) -> Self {
        Self {
            context,
            mode,
            block_policy,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run every job and collect their outcomes.
    ///
    /// All site configs are validated before any navigation; an invalid one
    /// closes every engine and fails the run with a `Config` error. A fatal
    /// navigator error only ends its own site.
    pub async fn run(&self, mut jobs: Vec<SiteJob>) -> HarvestResult<HarvestReport> {
        if let Err(e) = validate_jobs(&jobs) {
            error!("Invalid configuration, nothing crawled: {}", e);
            for job in &mut jobs {
                job.engine.close().await;
            }
            return Err(e);
        }

        info!(
            "Starting harvest run {} over {} sites ({:?})",
            self.context.run_id,
            jobs.len(),
            self.mode
        );

        let policy = self.block_policy;
        let sites = match self.mode {
            ExecutionMode::Sequential => {
                let mut sites = Vec::with_capacity(jobs.len());
                for job in jobs {
                    sites.push(run_site(job, policy).await);
                }
                sites
            }
            ExecutionMode::Parallel => {
                let labels: Vec<(String, ProductCategory)> =
                    jobs.iter().map(|job| (job.config.url().to_string(), job.category)).collect();
                let handles: Vec<_> = jobs.into_iter().map(|job| tokio::spawn(run_site(job, policy))).collect();

                join_all(handles)
                    .await
                    .into_iter()
                    .zip(labels)
                    .map(|(joined, (url, category))| {
                        joined.unwrap_or_else(|e| {
                            error!("Site task for {} did not finish: {}", url, e);
                            let mut report = SiteReport::new(&url, category);
                            report.fatal_error = Some(format!("site task failed: {e}"));
                            report
                        })
                    })
                    .collect()
            }
        };

        let report = HarvestReport {
            run_id: self.context.run_id,
            started_at: self.context.started_at,
            finished_at: Utc::now(),
            sites,
        };
        info!(
            "Harvest run {} finished: {} succeeded, {} skipped, {} failed",
            report.run_id,
            report.success_count(),
            report.skipped_count(),
            report.failed_count()
        );
        Ok(report)
    }
}

fn validate_jobs(jobs: &[SiteJob]) -> HarvestResult<()> {
    for job in jobs {
        job.config.validate()?;
        job.engine.settings().validate()?;
    }
    Ok(())
}

/// Harvest one site; its engine is closed whatever happens
async fn run_site(mut job: SiteJob, policy: BlockPolicy) -> SiteReport {
    let mut report = SiteReport::new(job.config.url(), job.category);
    info!("Harvesting {} as {}", report.site_url, job.category);

    let result = harvest_site(&mut job, policy, &mut report.outcomes).await;
    job.engine.close().await;

    if let Err(e) = result {
        error!("Site {} stopped early: {}", report.site_url, e);
        report.fatal_error = Some(e.to_string());
    }
    info!(
        "Site {} done: {} products from {} URLs",
        report.site_url,
        report.products().count(),
        report.outcomes.len()
    );
    report
}

async fn harvest_site(job: &mut SiteJob, policy: BlockPolicy, outcomes: &mut Vec<CrawlOutcome>) -> HarvestResult<()> {
    let urls = match job.engine.discover_listings(&job.config).await {
        Ok(urls) => urls,
        Err(HarvestError::BlockedSite { url, marker }) => {
            outcomes.push(CrawlOutcome::Failed {
                url,
                reason: FailureReason::Blocked { marker },
            });
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let mut abandoned = false;
    for url in urls {
        let url = url.to_string();
        if abandoned {
            outcomes.push(CrawlOutcome::Skipped {
                url,
                reason: SkipReason::SiteAbandoned,
            });
            continue;
        }

        let detail = match job.engine.extract_detail(&url, &job.config).await {
            Ok(detail) => detail,
            Err(e) => {
                // The URL that took the navigator down still gets an outcome
                outcomes.push(CrawlOutcome::Failed {
                    url,
                    reason: FailureReason::Navigation { message: e.to_string() },
                });
                return Err(e);
            }
        };
        let outcome = match detail {
            DetailOutcome::Extracted(fields) => CrawlOutcome::Success(ProductClassifier::build(job.category, fields, &url)),
            DetailOutcome::Skipped(reason) => CrawlOutcome::Skipped { url, reason },
            DetailOutcome::Failed(reason) => CrawlOutcome::Failed { url, reason },
        };

        if outcome.is_blocked() && policy == BlockPolicy::AbandonSite {
            warn!("Abandoning {} after a block", job.config.url());
            abandoned = true;
        }
        outcomes.push(outcome);
    }
    Ok(())
}
