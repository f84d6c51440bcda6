// src/corpus/cache.rs
//! Run-scoped cache of normalized reference buffers, keyed by URL.
//!
//! The first request for a URL downloads and normalizes it; concurrent
//! requests for the same URL wait on that one fetch. A failed fetch is
//! remembered too, so a broken reference costs one timeout per run rather
//! than one per spawn. `clear` forgets both.

use image::RgbaImage;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::corpus::{normalize_image, ImageFetcher};
use crate::error::FetchError;
use crate::telemetry as m;

pub type ImageBuffer = Arc<RgbaImage>;

type Slot = Arc<OnceCell<Result<ImageBuffer, FetchError>>>;

pub struct CorpusCache {
    fetcher: Arc<dyn ImageFetcher>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl CorpusCache {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Normalized buffer for `url`, fetched at most once until the next `clear`.
    pub async fn get(&self, url: &str) -> Result<ImageBuffer, FetchError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(url.to_string()).or_default().clone()
        };

        if let Some(res) = slot.get() {
            counter!(m::CORPUS_CACHE_HITS).increment(1);
            return res.clone();
        }

        slot.get_or_init(|| self.load(url)).await.clone()
    }

    /// Download and normalize `url` without keeping the buffer. For one-off
    /// images such as spawn attachments.
    pub async fn get_uncached(&self, url: &str) -> Result<ImageBuffer, FetchError> {
        self.load(url).await
    }

    async fn load(&self, url: &str) -> Result<ImageBuffer, FetchError> {
        let res = self.download(url).await;
        if let Err(e) = &res {
            counter!(m::CORPUS_FETCH_ERRORS).increment(1);
            tracing::warn!(target: "corpus", %url, error = %e, "image unavailable");
        }
        res
    }

    async fn download(&self, url: &str) -> Result<ImageBuffer, FetchError> {
        let bytes = self.fetcher.fetch(url).await?;
        counter!(m::CORPUS_FETCHES).increment(1);

        // Decoding + Lanczos resize is CPU-bound; keep it off the async workers.
        let owned_url = url.to_string();
        let img = tokio::task::spawn_blocking(move || normalize_image(&owned_url, &bytes))
            .await
            .map_err(|e| FetchError::Join {
                url: url.to_string(),
                reason: e.to_string(),
            })??;
        Ok(Arc::new(img))
    }

    /// Number of successfully cached buffers.
    pub async fn len(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|s| s.get().is_some_and(|r| r.is_ok()))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every cached buffer and remembered failure. Call at run boundaries.
    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }
}
