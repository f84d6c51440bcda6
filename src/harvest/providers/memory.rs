// src/harvest/providers/memory.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::harvest::types::{EventSource, RawEvent};

/// In-process history, stored newest first. Paginates exactly like a remote
/// channel: `before` is an event id and only strictly older events follow it.
pub struct MemorySource {
    events: Vec<RawEvent>,
    calls: AtomicUsize,
    /// Fail every fetch once this many calls were served.
    fail_after: Option<usize>,
}

impl MemorySource {
    /// `events` must already be newest first.
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            events,
            calls: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    /// Build from oldest-first events, the order histories are usually written in.
    pub fn from_chronological(mut events: Vec<RawEvent>) -> Self {
        events.reverse();
        Self::new(events)
    }

    pub fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for MemorySource {
    async fn fetch_page(&self, before: Option<&str>, limit: usize) -> Result<Vec<RawEvent>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|max| n >= max) {
            return Err(anyhow!("memory source unavailable"));
        }

        let start = match before {
            None => 0,
            Some(id) => match self.events.iter().position(|e| e.id == id) {
                Some(i) => i + 1,
                None => return Err(anyhow!("unknown cursor {id}")),
            },
        };
        Ok(self
            .events
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
