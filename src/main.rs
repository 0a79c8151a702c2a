//! Thin runner: `product-harvester [settings-file]`
//!
//! Harvests every configured site and prints the successful products as JSON
//! lines on stdout. Logs go to stderr (and optionally to files).

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, info};

use product_harvester::application::{HarvestOrchestrator, JsonLinesSink, RunContext, SiteJob};
use product_harvester::infrastructure::logging::{init_logging_with_config, log_system_info};
use product_harvester::infrastructure::ConfigManager;

#[tokio::main]
async fn main() -> Result<()> {
    let manager = match std::env::args().nth(1) {
        Some(path) => ConfigManager::with_path(PathBuf::from(path)),
        None => ConfigManager::new()?,
    };
    let settings = manager.load_settings()?;

    init_logging_with_config(settings.logging.clone())?;
    log_system_info();
    info!("Settings: {:?}", manager.config_path());

    let context = RunContext::new(settings.seed);
    let mut jobs = Vec::new();
    for (index, (category, config)) in manager.site_configs(&settings)?.into_iter().enumerate() {
        match SiteJob::over_http(config, category, &settings.engine, &settings.http, context.seed_for(index)) {
            Ok(job) => jobs.push(job),
            Err(e) => {
                for job in &mut jobs {
                    job.engine.close().await;
                }
                return Err(e.context("Failed to prepare site jobs"));
            }
        }
    }

    if jobs.is_empty() {
        info!("No sites configured in {:?}", manager.config_path());
        return Ok(());
    }

    let orchestrator = HarvestOrchestrator::new(context, settings.execution, settings.block_policy);
    let report = match orchestrator.run(jobs).await {
        Ok(report) => report,
        Err(e) => {
            error!("Harvest aborted: {}", e);
            return Err(e.into());
        }
    };

    let mut sink = JsonLinesSink::new(io::stdout().lock());
    let delivered = report.deliver(&mut sink)?;
    info!(
        "Run {}: {} products written, {} skipped, {} failed",
        report.run_id,
        delivered,
        report.skipped_count(),
        report.failed_count()
    );
    Ok(())
}
