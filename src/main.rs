use anyhow::Context;
use graphkit::config::AppConfig;
use graphkit::config::loader::{ConfigLoader, config_exists, default_config_path};
use graphkit::error::{ErrorReport, GraphError};
use graphkit::observability::init_tracing;
use graphkit::services::Graph;
use tracing::info;

/// Open the configured graph and print a JSON summary of its contents.
///
/// Configuration comes from `graphkit.toml` / `graphkit.yaml` and
/// `GRAPHKIT_*` variables, or from the file given as the first argument.
/// Failures are printed to stderr as a JSON error report.
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let report = match e.downcast_ref::<GraphError>() {
            Some(err) => ErrorReport::from(err),
            None => ErrorReport::new("INTERNAL", &e.to_string()),
        }
        .with_details(&format!("{:#}", e));
        match serde_json::to_string_pretty(&report) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::args().nth(1) {
        Some(path) => ConfigLoader::load_from(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };
    ConfigLoader::validate(&config).map_err(GraphError::from)?;
    Ok(config)
}

async fn run() -> anyhow::Result<()> {
    let config = load_config()?;

    let _log_guard = init_tracing(&config.logging)?;
    if std::env::args().nth(1).is_none() && !config_exists() {
        info!(
            "No {} found, using defaults and environment",
            default_config_path().display()
        );
    }
    info!(
        "Starting GraphKit (environment: {}, backend: {:?})",
        config.environment, config.storage.backend
    );

    let graph = Graph::open(&config)
        .await
        .with_context(|| format!("failed to open graph '{}'", config.graph_name))?;

    let summary = graph.summary();
    info!(
        "Graph '{}' has {} entities and {} actions",
        summary.graph, summary.entities, summary.actions
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
