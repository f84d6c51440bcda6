// src/config/mod.rs
//! Run configuration, read from the environment (a `.env` file is loaded by
//! the binary before this runs).

pub mod catalog;

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::classify::{MatchStrategy, ACCEPT_THRESHOLD};
use crate::diff::DEFAULT_DIFF_THRESHOLD;

pub const DEFAULT_SPAWN_TEXT: &str = "A wild countryball appeared!";
pub const DEFAULT_CATCH_PREFIX: &str = "You caught **";
pub const MAX_PAGE_SIZE: usize = 100;

pub const DEFAULT_CORPUS_OWNER: &str = "gyang0";
pub const DEFAULT_CORPUS_REPO: &str = "BallsDex-Spawnarts";

/// What the harvester looks for in the message stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRules {
    /// Only events authored by this identity are considered.
    pub bot_id: String,
    pub spawn_text: String,
    pub catch_prefix: String,
    pub page_size: usize,
}

impl HarvestRules {
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            spawn_text: DEFAULT_SPAWN_TEXT.to_string(),
            catch_prefix: DEFAULT_CATCH_PREFIX.to_string(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyConfig {
    pub accept_threshold: f64,
    pub diff_threshold: f64,
    pub strategy: MatchStrategy,
    pub concurrency: usize,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            accept_threshold: ACCEPT_THRESHOLD,
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            strategy: MatchStrategy::Exhaustive,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRepo {
    pub owner: String,
    pub repo: String,
    /// Directory inside the repository; empty means the root.
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub bot_token: String,
    pub channel_id: String,
    pub harvest: HarvestRules,
    pub corpus: CorpusRepo,
    pub classify: ClassifyConfig,
    pub run_timeout: Duration,
    pub report_path: PathBuf,
    pub report_format: ReportFormat,
}

fn required(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("missing required env var {key}"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional(key) {
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparsable env value, using default");
            default
        }),
        None => default,
    }
}

impl RunConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = required("BOT_TOKEN")?;
        let channel_id = required("CHANNEL_ID")?;
        let bot_id = required("BALLSDEX_USER_ID")?;

        let mut harvest =
            HarvestRules::new(bot_id).with_page_size(parse_or("PAGE_SIZE", MAX_PAGE_SIZE));
        // Text values are not trimmed: the spawn text must match exactly and the
        // catch prefix ends in a space.
        if let Ok(v) = std::env::var("SPAWN_TEXT") {
            if !v.is_empty() {
                harvest.spawn_text = v;
            }
        }
        if let Ok(v) = std::env::var("CATCH_PREFIX") {
            if !v.is_empty() {
                harvest.catch_prefix = v;
            }
        }

        let corpus = CorpusRepo {
            owner: optional("CORPUS_OWNER").unwrap_or_else(|| DEFAULT_CORPUS_OWNER.into()),
            repo: optional("CORPUS_REPO").unwrap_or_else(|| DEFAULT_CORPUS_REPO.into()),
            path: optional("CORPUS_PATH").unwrap_or_default(),
        };

        let strategy = match optional("MATCH_STRATEGY") {
            Some(raw) => raw.parse::<MatchStrategy>()?,
            None => MatchStrategy::Exhaustive,
        };
        let classify = ClassifyConfig {
            accept_threshold: parse_or("ACCEPT_THRESHOLD", ACCEPT_THRESHOLD),
            diff_threshold: parse_or("DIFF_THRESHOLD", DEFAULT_DIFF_THRESHOLD).clamp(0.0, 1.0),
            strategy,
            concurrency: parse_or("CLASSIFY_CONCURRENCY", 4usize).max(1),
        };

        let report_format = match optional("REPORT_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => ReportFormat::Json,
            _ => ReportFormat::Text,
        };

        Ok(Self {
            bot_token,
            channel_id,
            harvest,
            corpus,
            classify,
            run_timeout: Duration::from_secs(parse_or("RUN_TIMEOUT_SECS", 3600u64).max(1)),
            report_path: PathBuf::from(
                optional("REPORT_PATH").unwrap_or_else(|| "data.txt".to_string()),
            ),
            report_format,
        })
    }
}
