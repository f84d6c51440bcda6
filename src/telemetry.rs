// src/telemetry.rs
//! Metric names and their one-time descriptions. Without an installed
//! recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub const HARVEST_PAGES: &str = "harvest_pages_total";
pub const HARVEST_SPAWNS: &str = "harvest_spawns_total";
pub const HARVEST_CATCHES: &str = "harvest_catches_total";
pub const HARVEST_WARNINGS: &str = "harvest_warnings_total";
pub const CORPUS_FETCHES: &str = "corpus_fetch_total";
pub const CORPUS_CACHE_HITS: &str = "corpus_cache_hits_total";
pub const CORPUS_FETCH_ERRORS: &str = "corpus_fetch_errors_total";
pub const CLASSIFY_IDENTIFIED: &str = "classify_identified_total";
pub const CLASSIFY_MANUAL: &str = "classify_manual_review_total";
pub const CLASSIFY_SPAWN_MS: &str = "classify_spawn_ms";
pub const RUN_LAST_TS: &str = "run_last_finished_ts";

/// One-time metrics registration (so series show up with help text).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(HARVEST_PAGES, "History pages fetched from the event source.");
        describe_counter!(HARVEST_SPAWNS, "Spawn announcements recognized.");
        describe_counter!(HARVEST_CATCHES, "Catch messages counted into the tally.");
        describe_counter!(
            HARVEST_WARNINGS,
            "Malformed events and data-integrity warnings during harvest."
        );
        describe_counter!(CORPUS_FETCHES, "Images downloaded and normalized.");
        describe_counter!(CORPUS_CACHE_HITS, "Image requests served from the run cache.");
        describe_counter!(CORPUS_FETCH_ERRORS, "Image downloads or decodes that failed.");
        describe_counter!(CLASSIFY_IDENTIFIED, "Unverified spawns identified automatically.");
        describe_counter!(CLASSIFY_MANUAL, "Unverified spawns left for manual review.");
        describe_histogram!(CLASSIFY_SPAWN_MS, "Time to classify one spawn, in milliseconds.");
        describe_gauge!(RUN_LAST_TS, "Unix ts when the last run finished.");
    });
}
