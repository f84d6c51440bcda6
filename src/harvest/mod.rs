// src/harvest/mod.rs
//! Event Harvester: walks a channel's history backwards and turns it into
//! spawn records, a verification set and a partial tally.

pub mod parse;
pub mod providers;
pub mod types;

use anyhow::{Context, Result};
use metrics::counter;
use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::config::HarvestRules;
use crate::error::{DataIntegrityWarning, HarvestWarning, MalformedEvent};
use crate::harvest::parse::{is_catch, parse_catch_category};
use crate::harvest::types::{EventSource, RawEvent, SpawnRecord};
use crate::tally::Tally;
use crate::telemetry as m;

/// What a single event means to the harvester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Spawn(SpawnRecord),
    Catch {
        spawn_id: String,
        /// Canonical (alias-resolved) category name.
        category: String,
    },
    /// A catch reply whose category text could not be read. Still verifies the spawn.
    CatchUnreadable {
        spawn_id: String,
        warning: MalformedEvent,
    },
    Ignored,
    Malformed(MalformedEvent),
}

/// Classify one event. Pure: no tally or set is touched.
pub fn classify_event(ev: &RawEvent, rules: &HarvestRules, catalog: &Catalog) -> EventKind {
    if ev.author_id != rules.bot_id {
        return EventKind::Ignored;
    }

    if is_catch(&ev.text, &rules.catch_prefix) {
        let Some(spawn_id) = ev.in_reply_to_id.clone() else {
            return EventKind::Malformed(MalformedEvent::CatchWithoutReply { id: ev.id.clone() });
        };
        return match parse_catch_category(&ev.text, &rules.catch_prefix) {
            Ok(raw) => EventKind::Catch {
                spawn_id,
                category: catalog.normalize(raw),
            },
            Err(reason) => EventKind::CatchUnreadable {
                spawn_id,
                warning: MalformedEvent::UnparsableCatch {
                    id: ev.id.clone(),
                    reason,
                },
            },
        };
    }

    if ev.text == rules.spawn_text {
        return match &ev.attachment_url {
            Some(url) => EventKind::Spawn(SpawnRecord {
                id: ev.id.clone(),
                image_url: url.clone(),
            }),
            None => EventKind::Malformed(MalformedEvent::SpawnWithoutAttachment {
                id: ev.id.clone(),
            }),
        };
    }

    EventKind::Ignored
}

/// Result of draining the whole history.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// Newest first, as encountered.
    pub spawns: Vec<SpawnRecord>,
    /// Ids of spawns confirmed caught by a reply.
    pub verified: HashSet<String>,
    pub tally: Tally,
    pub warnings: Vec<HarvestWarning>,
    pub pages: usize,
}

impl HarvestOutcome {
    /// Spawns with no catch reply, in harvest order.
    pub fn unverified(&self) -> impl Iterator<Item = &SpawnRecord> {
        self.spawns
            .iter()
            .filter(move |s| !self.verified.contains(&s.id))
    }
}

/// Accumulates events page by page. Split out from the walk so it can be fed
/// directly in tests.
#[derive(Debug)]
pub struct Harvester<'a> {
    rules: &'a HarvestRules,
    catalog: &'a Catalog,
    spawns: Vec<SpawnRecord>,
    verified: HashSet<String>,
    /// Spawn ids that already have a counted catch.
    counted: HashSet<String>,
    /// First counted catch per spawn id, as `(spawn_id, catch_id, category)`.
    /// Catches come before their spawn in a newest-first walk, so the tally is
    /// only applied in `finish`.
    pending: Vec<(String, String, String)>,
    tally: Tally,
    warnings: Vec<HarvestWarning>,
    pages: usize,
}

impl<'a> Harvester<'a> {
    pub fn new(rules: &'a HarvestRules, catalog: &'a Catalog) -> Self {
        Self {
            rules,
            catalog,
            spawns: Vec::new(),
            verified: HashSet::new(),
            counted: HashSet::new(),
            pending: Vec::new(),
            tally: Tally::new(catalog),
            warnings: Vec::new(),
            pages: 0,
        }
    }

    pub fn ingest_page(&mut self, page: &[RawEvent]) {
        self.pages += 1;
        counter!(m::HARVEST_PAGES).increment(1);
        for ev in page {
            self.ingest(ev);
        }
    }

    pub fn ingest(&mut self, ev: &RawEvent) {
        match classify_event(ev, self.rules, self.catalog) {
            EventKind::Spawn(rec) => {
                self.spawns.push(rec);
                counter!(m::HARVEST_SPAWNS).increment(1);
                if self.spawns.len() % 100 == 0 {
                    tracing::info!(target: "harvest", spawns = self.spawns.len(), "spawns counted");
                }
            }
            EventKind::Catch { spawn_id, category } => {
                self.verified.insert(spawn_id.clone());
                if !self.catalog.contains(&category) {
                    self.warn(DataIntegrityWarning::UnknownCategory {
                        id: ev.id.clone(),
                        category,
                    });
                    return;
                }
                // First counted catch per spawn wins.
                if self.counted.insert(spawn_id.clone()) {
                    self.pending.push((spawn_id, ev.id.clone(), category));
                } else {
                    tracing::debug!(target: "harvest", %spawn_id, event = %ev.id, "duplicate catch ignored for tally");
                }
            }
            EventKind::CatchUnreadable { spawn_id, warning } => {
                self.verified.insert(spawn_id);
                self.warn(warning);
            }
            EventKind::Malformed(w) => self.warn(w),
            EventKind::Ignored => {}
        }
    }

    fn warn(&mut self, w: impl Into<HarvestWarning>) {
        let w = w.into();
        tracing::warn!(target: "harvest", warning = %w, "skipping event");
        counter!(m::HARVEST_WARNINGS).increment(1);
        self.warnings.push(w);
    }

    pub fn finish(mut self) -> HarvestOutcome {
        let spawn_ids: HashSet<&str> = self.spawns.iter().map(|s| s.id.as_str()).collect();
        let mut orphans = Vec::new();
        for (spawn_id, catch_id, category) in std::mem::take(&mut self.pending) {
            if spawn_ids.contains(spawn_id.as_str()) {
                self.tally.increment(&category);
                counter!(m::HARVEST_CATCHES).increment(1);
            } else {
                orphans.push(DataIntegrityWarning::CatchForUnknownSpawn {
                    id: catch_id,
                    spawn_id,
                });
            }
        }
        for w in orphans {
            self.warn(w);
        }

        tracing::info!(
            target: "harvest",
            spawns = self.spawns.len(),
            verified = self.verified.len(),
            warnings = self.warnings.len(),
            pages = self.pages,
            "Total {} spawns counted.",
            self.spawns.len()
        );
        HarvestOutcome {
            spawns: self.spawns,
            verified: self.verified,
            tally: self.tally,
            warnings: self.warnings,
            pages: self.pages,
        }
    }
}

/// Drain `source` from the newest page backwards. Stops on a short page.
/// Only a failing page fetch is fatal.
pub async fn harvest(
    source: &dyn EventSource,
    rules: &HarvestRules,
    catalog: &Catalog,
) -> Result<HarvestOutcome> {
    m::ensure_described();

    let page_size = rules.page_size.max(1);
    let mut h = Harvester::new(rules, catalog);
    let mut cursor: Option<String> = None;

    loop {
        let page = source
            .fetch_page(cursor.as_deref(), page_size)
            .await
            .with_context(|| {
                format!(
                    "fetching history page before {} from {}",
                    cursor.as_deref().unwrap_or("<newest>"),
                    source.name()
                )
            })?;

        h.ingest_page(&page);

        if page.len() < page_size {
            break;
        }
        // A full page always has a last element.
        match page.last() {
            Some(last) => cursor = Some(last.id.clone()),
            None => break,
        }
    }

    Ok(h.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "bot";

    fn rules() -> HarvestRules {
        HarvestRules::new(BOT)
    }

    fn catalog() -> Catalog {
        Catalog::new(
            ["France", "Bosnia and Herzegovina"],
            [("Bosnia", "Bosnia and Herzegovina")],
        )
        .unwrap()
    }

    fn ev(id: &str, author: &str, text: &str) -> RawEvent {
        RawEvent {
            id: id.into(),
            author_id: author.into(),
            text: text.into(),
            attachment_url: None,
            in_reply_to_id: None,
        }
    }

    #[test]
    fn other_authors_are_ignored() {
        let mut e = ev("1", "someone", "A wild countryball appeared!");
        e.attachment_url = Some("u".into());
        assert_eq!(classify_event(&e, &rules(), &catalog()), EventKind::Ignored);
    }

    #[test]
    fn spawn_needs_exact_text_and_attachment() {
        let mut e = ev("1", BOT, "A wild countryball appeared!");
        assert_eq!(
            classify_event(&e, &rules(), &catalog()),
            EventKind::Malformed(MalformedEvent::SpawnWithoutAttachment { id: "1".into() })
        );
        e.attachment_url = Some("https://cdn/x.png".into());
        assert!(matches!(
            classify_event(&e, &rules(), &catalog()),
            EventKind::Spawn(SpawnRecord { ref id, .. }) if id == "1"
        ));
        e.text = "A wild countryball appeared! ".into();
        assert_eq!(classify_event(&e, &rules(), &catalog()), EventKind::Ignored);
    }

    #[test]
    fn catch_resolves_alias() {
        let mut e = ev("2", BOT, "<@u> You caught **Bosnia!** (`#1`)");
        e.in_reply_to_id = Some("1".into());
        assert_eq!(
            classify_event(&e, &rules(), &catalog()),
            EventKind::Catch {
                spawn_id: "1".into(),
                category: "bosnia and herzegovina".into()
            }
        );
    }

    #[test]
    fn duplicate_catches_count_once() {
        let (r, c) = (rules(), catalog());
        let mut h = Harvester::new(&r, &c);
        let mut s = ev("s1", BOT, "A wild countryball appeared!");
        s.attachment_url = Some("https://cdn/s1.png".into());
        for id in ["c1", "c2"] {
            let mut e = ev(id, BOT, "<@u> You caught **France!**");
            e.in_reply_to_id = Some("s1".into());
            h.ingest(&e);
        }
        h.ingest(&s);
        let out = h.finish();
        assert_eq!(out.tally.get("france"), Some(1));
        assert!(out.verified.contains("s1"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn unknown_category_keeps_verification() {
        let (r, c) = (rules(), catalog());
        let mut h = Harvester::new(&r, &c);
        let mut e = ev("c1", BOT, "<@u> You caught **Atlantis!**");
        e.in_reply_to_id = Some("s1".into());
        h.ingest(&e);
        let out = h.finish();
        assert!(out.verified.contains("s1"));
        assert_eq!(out.tally.total(), 0);
        assert_eq!(
            out.warnings,
            vec![HarvestWarning::Integrity(DataIntegrityWarning::UnknownCategory {
                id: "c1".into(),
                category: "atlantis".into()
            })]
        );
    }

    #[test]
    fn catch_for_unrecorded_spawn_is_not_counted() {
        let (r, c) = (rules(), catalog());
        let mut h = Harvester::new(&r, &c);
        let mut e = ev("c1", BOT, "<@u> You caught **France!**");
        e.in_reply_to_id = Some("chatter".into());
        h.ingest(&e);
        let out = h.finish();
        assert_eq!(out.tally.total(), 0);
        assert_eq!(
            out.warnings,
            vec![HarvestWarning::Integrity(
                DataIntegrityWarning::CatchForUnknownSpawn {
                    id: "c1".into(),
                    spawn_id: "chatter".into()
                }
            )]
        );
    }

    #[test]
    fn catch_without_reply_is_skipped() {
        let (r, c) = (rules(), catalog());
        let mut h = Harvester::new(&r, &c);
        h.ingest(&ev("c1", BOT, "<@u> You caught **France!**"));
        let out = h.finish();
        assert!(out.verified.is_empty());
        assert_eq!(out.tally.total(), 0);
        assert_eq!(out.warnings.len(), 1);
    }
}
