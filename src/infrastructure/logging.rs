//! Logging system configuration and initialization
//!
//! - console output on stderr (stdout is reserved for harvested records)
//! - optional daily rolled log files through a non-blocking writer
//! - optional JSON formatting
//! - `RUST_LOG` wins over the configured level and module filters
//! - timestamps rendered at a configurable UTC offset

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use lazy_static::lazy_static;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

// Re-export LoggingConfig from config module
pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::ConfigManager;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Timestamps at a fixed offset from UTC
#[derive(Debug, Clone, Copy)]
struct OffsetTimer {
    offset: FixedOffset,
}

impl OffsetTimer {
    fn from_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

impl FormatTime for OffsetTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&self.offset);
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Directory for log files: the configured one, else `<data dir>/logs`
pub fn get_log_directory(config: &LoggingConfig) -> Result<PathBuf> {
    match &config.log_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(ConfigManager::get_app_data_dir()?.join("logs")),
    }
}

/// Filter from `RUST_LOG`, or from the configured level plus module filters
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);

        // Keep third-party chatter down unless tracing everything
        if !config.level.eq_ignore_ascii_case("trace") {
            let mut modules: Vec<_> = config.module_filters.iter().collect();
            modules.sort();
            for (module, level) in modules {
                if let Ok(directive) = format!("{module}={level}").parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }

        filter
    })
}

/// Install the global subscriber described by `config`
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    let timer = OffsetTimer::from_hours(config.utc_offset_hours);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(timer)
            .with_target(true);
        if config.json_format {
            layers.push(console_layer.json().boxed());
        } else {
            layers.push(console_layer.boxed());
        }
    }

    let mut log_dir = None;
    if config.file_output {
        let dir = get_log_directory(&config)?;
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create log directory {:?}", dir))?;

        let file_appender = rolling::daily(&dir, &config.file_name_prefix);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry is poisoned"))?
            .push(file_guard);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_timer(timer)
            .with_thread_ids(true);
        if config.json_format {
            layers.push(file_layer.json().boxed());
        } else {
            layers.push(file_layer.boxed());
        }
        log_dir = Some(dir);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(&config))
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized (level: {}, console: {}, file: {:?}, json: {})",
        config.level, config.console_output, log_dir, config.json_format
    );
    Ok(())
}

/// Initialize logging with default settings
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Log runtime information for diagnostics
pub fn log_system_info() {
    info!("=== Product Harvester ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
}
