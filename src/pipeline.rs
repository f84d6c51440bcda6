// src/pipeline.rs
//! One reconciliation run: harvest -> list corpus -> classify unverified ->
//! report. Nothing survives the run; the image cache is cleared at both ends.

use anyhow::{anyhow, Context, Result};
use metrics::gauge;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::classify::Classifier;
use crate::config::{ClassifyConfig, HarvestRules};
use crate::corpus::cache::CorpusCache;
use crate::corpus::{entries_from_listing, CorpusSource};
use crate::diff::Scorer;
use crate::error::{DataIntegrityWarning, HarvestWarning};
use crate::harvest::harvest;
use crate::harvest::types::{EventSource, SpawnRecord};
use crate::report::Report;
use crate::telemetry as m;

/// Everything a run reads from, wired once by the caller.
pub struct Pipeline {
    pub events: Arc<dyn EventSource>,
    pub corpus: Arc<dyn CorpusSource>,
    pub cache: Arc<CorpusCache>,
    pub scorer: Arc<dyn Scorer>,
    pub catalog: Catalog,
    pub rules: HarvestRules,
    pub classify: ClassifyConfig,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub harvest_warnings: Vec<HarvestWarning>,
    pub corpus_warnings: Vec<DataIntegrityWarning>,
}

impl Pipeline {
    pub async fn run(&self) -> Result<RunOutcome> {
        m::ensure_described();

        let outcome = harvest(self.events.as_ref(), &self.rules, &self.catalog)
            .await
            .context("harvesting spawn history")?;

        let unverified: Vec<SpawnRecord> = outcome.unverified().cloned().collect();

        let files = self
            .corpus
            .list_files()
            .await
            .with_context(|| format!("listing reference corpus from {}", self.corpus.name()))?;
        let (entries, corpus_warnings) = entries_from_listing(files, &self.catalog);
        tracing::info!(target: "corpus", entries = entries.len(), skipped = corpus_warnings.len(), "corpus listed");

        self.cache.clear().await;
        let mut tally = outcome.tally;
        let classifier = Classifier::new(&self.cache, self.scorer.clone(), self.classify.clone());
        let classified = classifier
            .classify_all(unverified, &entries, &mut tally)
            .await;

        let report = Report::build(
            &outcome.spawns,
            &outcome.verified,
            tally,
            classified.manual_review,
        )
        .with_accept_threshold(self.classify.accept_threshold);

        gauge!(m::RUN_LAST_TS).set(chrono::Utc::now().timestamp().max(0) as f64);
        Ok(RunOutcome {
            report,
            harvest_warnings: outcome.warnings,
            corpus_warnings,
        })
    }

    /// `run` bounded by `limit`. On timeout every in-flight fetch is dropped
    /// and no partial result is returned.
    pub async fn run_with_timeout(&self, limit: Duration) -> Result<RunOutcome> {
        let res = tokio::time::timeout(limit, self.run()).await;
        self.cache.clear().await;
        match res {
            Ok(r) => r,
            Err(_) => Err(anyhow!("run aborted after {}s timeout", limit.as_secs())),
        }
    }
}
