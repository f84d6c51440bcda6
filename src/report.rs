// src/report.rs
//! Report Builder: derives the summary numbers and renders the plain-text
//! artifact posted back to the channel.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::classify::ACCEPT_THRESHOLD;
use crate::harvest::types::SpawnRecord;
use crate::tally::Tally;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total_spawns: usize,
    pub total_caught: usize,
    pub total_unverified: usize,
    pub auto_identified: usize,
    pub manual_review: Vec<String>,
    pub tally: Tally,
    pub accept_threshold: f64,
}

impl Report {
    /// Pure derivation from the pipeline results.
    pub fn build(
        spawns: &[SpawnRecord],
        verified: &HashSet<String>,
        tally: Tally,
        manual_review: Vec<String>,
    ) -> Self {
        let total_spawns = spawns.len();
        let total_unverified = spawns.iter().filter(|s| !verified.contains(&s.id)).count();
        Self {
            total_spawns,
            total_caught: total_spawns - total_unverified,
            total_unverified,
            auto_identified: total_unverified.saturating_sub(manual_review.len()),
            manual_review,
            tally,
            accept_threshold: ACCEPT_THRESHOLD,
        }
    }

    pub fn with_accept_threshold(mut self, threshold: f64) -> Self {
        self.accept_threshold = threshold;
        self
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "There were a total of {} ball spawns in this channel.",
            self.total_spawns
        );
        let _ = writeln!(out, "Of these, {} balls were caught.", self.total_caught);
        let _ = writeln!(out, "{} balls remained uncaught.", self.total_unverified);
        let _ = writeln!(
            out,
            "\t- Of these, {} balls were identified automatically ({}% certainty or more).",
            self.auto_identified, self.accept_threshold
        );
        let _ = writeln!(
            out,
            "\t- There are {} balls that require manual identification.",
            self.manual_review.len()
        );
        out.push('\n');

        out.push_str(">>>>>>>>>> Unverified spawn images (FACTOR THESE INTO THE TOTAL)\n");
        out.push_str(
            ">>>>>>>>>> For your own sanity, use https://www.openallurls.com/ to open these links.\n",
        );
        if self.manual_review.is_empty() {
            out.push_str("No unclear images, yay!\n");
        }
        for url in &self.manual_review {
            out.push_str(url);
            out.push('\n');
        }
        out.push('\n');

        out.push_str(">>>>>>>>>> Data for verified spawns:\n");
        for (category, n) in self.tally.iter() {
            let _ = writeln!(out, "{category}: {n}");
        }
        out
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
