// src/classify.rs
//! # Unverified Classifier
//! Scores each unverified spawn image against every corpus entry and keeps
//! the best match. A best score at or above the acceptance threshold counts
//! as identified; anything else goes to manual review.
//!
//! Ties keep the entry that comes first in corpus order. Spawns are scored
//! concurrently, but results are folded into the tally and the review list
//! one at a time, in spawn order.

use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ClassifyConfig;
use crate::corpus::cache::{CorpusCache, ImageBuffer};
use crate::corpus::CorpusEntry;
use crate::diff::Scorer;
use crate::harvest::types::SpawnRecord;
use crate::tally::Tally;
use crate::telemetry as m;

/// Best score needed for an automatic identification.
pub const ACCEPT_THRESHOLD: f64 = 95.0;

/// Corpus images fetched concurrently while preparing one spawn.
const CORPUS_FETCH_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// Score every entry, keep the maximum.
    Exhaustive,
    /// Stop at the first entry that meets the threshold.
    FirstAccepted,
}

impl FromStr for MatchStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exhaustive" => Ok(Self::Exhaustive),
            "first-accepted" | "first_accepted" | "short-circuit" => Ok(Self::FirstAccepted),
            other => Err(anyhow::anyhow!("unknown match strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// `None` when nothing could be scored.
    pub category: Option<String>,
    pub score: f64,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            category: None,
            score: f64::NEG_INFINITY,
        }
    }

    pub fn is_identified(&self, threshold: f64) -> bool {
        self.category.is_some() && is_accepted(self.score, threshold)
    }
}

/// `score >= threshold`, the single acceptance rule for every strategy.
pub fn is_accepted(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Pick the best `(category, score)` pair. Strictly greater scores replace the
/// current best, so the first of equal scores wins.
pub fn select_best<'a, I>(scores: I, strategy: MatchStrategy, threshold: f64) -> MatchResult
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut best = MatchResult::none();
    for (category, score) in scores {
        if best.category.is_none() || score > best.score {
            best = MatchResult {
                category: Some(category.to_string()),
                score,
            };
        }
        if strategy == MatchStrategy::FirstAccepted && is_accepted(score, threshold) {
            break;
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identified {
    pub spawn: SpawnRecord,
    pub result: MatchResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifyOutcome {
    pub identified: Vec<Identified>,
    /// Image URLs of spawns nobody could place, in spawn order.
    pub manual_review: Vec<String>,
}

pub struct Classifier<'a> {
    cache: &'a CorpusCache,
    scorer: Arc<dyn Scorer>,
    cfg: ClassifyConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(cache: &'a CorpusCache, scorer: Arc<dyn Scorer>, cfg: ClassifyConfig) -> Self {
        Self { cache, scorer, cfg }
    }

    /// Best corpus match for one spawn image. Unreachable images score
    /// `-inf`, so they can never win over a real comparison.
    pub async fn best_guess(&self, image_url: &str, corpus: &[CorpusEntry]) -> MatchResult {
        let spawn = match self.cache.get_uncached(image_url).await {
            Ok(buf) => buf,
            Err(_) => return MatchResult::none(),
        };

        let refs: Vec<(String, Option<ImageBuffer>)> = stream::iter(corpus)
            .map(|entry| async move {
                let buf = self.cache.get(&entry.source_url).await.ok();
                (entry.category.clone(), buf)
            })
            .buffered(CORPUS_FETCH_CONCURRENCY)
            .collect()
            .await;

        let scorer = self.scorer.clone();
        let strategy = self.cfg.strategy;
        let threshold = self.cfg.accept_threshold;
        let scored = tokio::task::spawn_blocking(move || {
            let scores = refs.iter().map(|(category, buf)| {
                let score = match buf {
                    Some(b) => scorer.score(&spawn, b),
                    None => f64::NEG_INFINITY,
                };
                (category.as_str(), score)
            });
            select_best(scores, strategy, threshold)
        })
        .await;

        match scored {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "classify", url = %image_url, error = %e, "scoring task failed");
                MatchResult::none()
            }
        }
    }

    /// Classify every spawn, updating `tally` for identified ones.
    pub async fn classify_all(
        &self,
        spawns: Vec<SpawnRecord>,
        corpus: &[CorpusEntry],
        tally: &mut Tally,
    ) -> ClassifyOutcome {
        let total = spawns.len();
        tracing::info!(target: "classify", total, corpus = corpus.len(), "Now analyzing {total} unverified spawns...");

        let mut results = stream::iter(spawns)
            .map(|spawn| async move {
                let t0 = std::time::Instant::now();
                let result = self.best_guess(&spawn.image_url, corpus).await;
                histogram!(m::CLASSIFY_SPAWN_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);
                (spawn, result)
            })
            .buffered(self.cfg.concurrency.max(1));

        let mut out = ClassifyOutcome::default();
        let mut done = 0usize;
        while let Some((spawn, result)) = results.next().await {
            done += 1;
            let accepted = result.is_identified(self.cfg.accept_threshold)
                && result
                    .category
                    .as_deref()
                    .is_some_and(|c| tally.increment(c));

            if accepted {
                counter!(m::CLASSIFY_IDENTIFIED).increment(1);
                tracing::debug!(
                    target: "classify",
                    spawn_id = %spawn.id,
                    category = result.category.as_deref().unwrap_or_default(),
                    score = result.score,
                    "identified"
                );
                out.identified.push(Identified { spawn, result });
            } else {
                counter!(m::CLASSIFY_MANUAL).increment(1);
                tracing::debug!(target: "classify", spawn_id = %spawn.id, score = result.score, "left for manual review");
                out.manual_review.push(spawn.image_url);
            }
            tracing::debug!(target: "classify", "{done}/{total} done.");
        }

        tracing::info!(
            target: "classify",
            identified = out.identified.len(),
            manual = out.manual_review.len(),
            "Finished. {} balls automatically identified.",
            out.identified.len()
        );
        out
    }
}
