//! Spawn reconciler: binary entrypoint.
//! Loads config, harvests the channel, classifies uncaught spawns and writes
//! the report file. Exits non-zero (and writes nothing) when the run fails.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spawn_reconciler::config::catalog::load_catalog_default;
use spawn_reconciler::config::{ReportFormat, RunConfig};
use spawn_reconciler::live_pipeline;

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("spawn_reconciler=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RunConfig::from_env()?;
    let catalog = load_catalog_default()?;
    tracing::info!(
        channel = %cfg.channel_id,
        categories = catalog.len(),
        strategy = ?cfg.classify.strategy,
        "starting reconciliation run; this is going to take a while"
    );

    let pipeline = live_pipeline(&cfg, catalog);
    let outcome = pipeline.run_with_timeout(cfg.run_timeout).await?;

    let warnings = outcome.harvest_warnings.len() + outcome.corpus_warnings.len();
    if warnings > 0 {
        tracing::warn!(warnings, "run finished with recovered warnings");
    }

    let body = match cfg.report_format {
        ReportFormat::Text => outcome.report.render_text(),
        ReportFormat::Json => outcome.report.render_json()?,
    };
    tokio::fs::write(&cfg.report_path, body)
        .await
        .with_context(|| format!("writing report to {}", cfg.report_path.display()))?;

    tracing::info!(
        path = %cfg.report_path.display(),
        spawns = outcome.report.total_spawns,
        caught = outcome.report.total_caught,
        identified = outcome.report.auto_identified,
        manual = outcome.report.manual_review.len(),
        "report written"
    );
    Ok(())
}
