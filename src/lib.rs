// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod corpus;
pub mod diff;
pub mod error;
pub mod harvest;
pub mod pipeline;
pub mod report;
pub mod tally;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::catalog::Catalog;
pub use crate::classify::{MatchResult, MatchStrategy, ACCEPT_THRESHOLD};
pub use crate::pipeline::{Pipeline, RunOutcome};
pub use crate::report::Report;
pub use crate::tally::Tally;

use std::sync::Arc;

use crate::config::RunConfig;
use crate::corpus::cache::CorpusCache;
use crate::corpus::providers::github::{GitHubCorpusSource, HttpImageFetcher};
use crate::diff::PixelDiffScorer;
use crate::harvest::providers::discord::DiscordChannelSource;

/// Wire the production collaborators (Discord history, GitHub corpus, HTTP
/// image downloads) from a loaded configuration.
pub fn live_pipeline(cfg: &RunConfig, catalog: Catalog) -> Pipeline {
    let events = DiscordChannelSource::new(cfg.bot_token.clone(), cfg.channel_id.clone());
    let corpus = GitHubCorpusSource::new(cfg.corpus.clone());
    let cache = CorpusCache::new(Arc::new(HttpImageFetcher::default()));
    Pipeline {
        events: Arc::new(events),
        corpus: Arc::new(corpus),
        cache: Arc::new(cache),
        scorer: Arc::new(PixelDiffScorer::new(cfg.classify.diff_threshold)),
        catalog,
        rules: cfg.harvest.clone(),
        classify: cfg.classify.clone(),
    }
}
