//! Observability
//!
//! Structured logging setup and save/notification counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::config::config::LoggingConfig;
use crate::error::{GraphError, Result};

// ===== Metrics =====

/// Graph counters
#[derive(Clone, Default, Debug)]
pub struct GraphMetrics {
    pub saves_total: Arc<AtomicU64>,
    pub save_failures_total: Arc<AtomicU64>,
    pub events_total: Arc<AtomicU64>,
    pub deliveries_total: Arc<AtomicU64>,
    pub entities_persisted: Arc<AtomicU64>,
    pub actions_persisted: Arc<AtomicU64>,
}

impl GraphMetrics {
    /// Record a successful save and the size of what was written
    pub fn record_save(&self, entities: usize, actions: usize) {
        self.saves_total.fetch_add(1, Ordering::SeqCst);
        self.entities_persisted.store(entities as u64, Ordering::SeqCst);
        self.actions_persisted.store(actions as u64, Ordering::SeqCst);
    }

    pub fn record_save_failure(&self) {
        self.save_failures_total.fetch_add(1, Ordering::SeqCst);
    }

    /// Record events produced by a save and how many observer deliveries they made
    pub fn record_events(&self, events: usize, deliveries: usize) {
        self.events_total.fetch_add(events as u64, Ordering::SeqCst);
        self.deliveries_total
            .fetch_add(deliveries as u64, Ordering::SeqCst);
    }

    /// Prometheus text format
    pub fn gather(&self) -> String {
        format!(
            r#"# HELP graph_saves_total Successful saves
# TYPE graph_saves_total counter
graph_saves_total {}
# HELP graph_save_failures_total Failed saves
# TYPE graph_save_failures_total counter
graph_save_failures_total {}
# HELP graph_events_total Change events produced by saves
# TYPE graph_events_total counter
graph_events_total {}
# HELP graph_deliveries_total Events delivered to delegates and subscribers
# TYPE graph_deliveries_total counter
graph_deliveries_total {}
# HELP graph_entities_persisted Entities in the last persisted snapshot
# TYPE graph_entities_persisted gauge
graph_entities_persisted {}
# HELP graph_actions_persisted Actions in the last persisted snapshot
# TYPE graph_actions_persisted gauge
graph_actions_persisted {}
"#,
            self.saves_total.load(Ordering::SeqCst),
            self.save_failures_total.load(Ordering::SeqCst),
            self.events_total.load(Ordering::SeqCst),
            self.deliveries_total.load(Ordering::SeqCst),
            self.entities_persisted.load(Ordering::SeqCst),
            self.actions_persisted.load(Ordering::SeqCst),
        )
    }
}

// ===== Structured Logging =====

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. When `log_dir` is set, a daily
/// rolling file is written as well; keep the returned guard alive for as
/// long as logs should be flushed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level = if config.level.is_empty() {
        "info"
    } else {
        config.level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| GraphError::Config(format!("invalid log level '{}': {}", level, e)))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.structured {
        layers.push(fmt::layer().json().with_target(true).boxed());
    } else {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .boxed(),
        );
    }

    let mut guard = None;
    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)?;
        let appender = tracing_appender::rolling::daily(dir, "graphkit.log");
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
        if config.structured {
            layers.push(file_layer.json().boxed());
        } else {
            layers.push(file_layer.boxed());
        }
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| GraphError::Internal(format!("failed to set tracing subscriber: {}", e)))?;

    Ok(guard)
}
