// tests/pipeline_e2e.rs
// Whole runs over an in-memory channel, a static corpus listing and real
// image scoring.

use anyhow::Result;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use spawn_reconciler::config::{ClassifyConfig, HarvestRules};
use spawn_reconciler::corpus::cache::CorpusCache;
use spawn_reconciler::corpus::{CorpusSource, ImageFetcher, ListedFile};
use spawn_reconciler::diff::PixelDiffScorer;
use spawn_reconciler::error::FetchError;
use spawn_reconciler::harvest::providers::memory::MemorySource;
use spawn_reconciler::harvest::types::RawEvent;
use spawn_reconciler::{Catalog, Pipeline};

const BOT: &str = "999";

fn encode(img: RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

fn flat(v: u8) -> Vec<u8> {
    encode(RgbaImage::from_pixel(16, 16, Rgba([v, v, v, 255])))
}

/// Left half black, right half white.
fn split() -> Vec<u8> {
    let img = RgbaImage::from_fn(16, 16, |x, _| {
        if x < 8 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    encode(img)
}

struct MapFetcher {
    images: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
}

#[async_trait]
impl ImageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.images.get(url).cloned().ok_or_else(|| FetchError::Request {
            url: url.into(),
            reason: "connection refused".into(),
        })
    }
}

struct StaticCorpus(Vec<ListedFile>);

#[async_trait]
impl CorpusSource for StaticCorpus {
    async fn list_files(&self) -> Result<Vec<ListedFile>> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

struct DownCorpus;

#[async_trait]
impl CorpusSource for DownCorpus {
    async fn list_files(&self) -> Result<Vec<ListedFile>> {
        Err(anyhow::anyhow!("github unreachable"))
    }
    fn name(&self) -> &'static str {
        "down"
    }
}

fn ref_url(name: &str) -> String {
    format!("https://raw.test/{name}")
}

fn listing() -> Vec<ListedFile> {
    ["[france]_1.png", "[egypt]_1.png", "README.md"]
        .into_iter()
        .map(|n| ListedFile {
            name: n.into(),
            download_url: Some(ref_url(n)),
        })
        .collect()
}

fn images() -> HashMap<String, Vec<u8>> {
    let mut m = HashMap::new();
    m.insert(ref_url("[france]_1.png"), flat(255));
    m.insert(ref_url("[egypt]_1.png"), flat(0));
    m.insert("https://cdn.test/1.png".into(), flat(255));
    m.insert("https://cdn.test/2.png".into(), flat(0));
    m.insert("https://cdn.test/4.png".into(), split());
    m
}

fn spawn(id: u32) -> RawEvent {
    RawEvent {
        id: id.to_string(),
        author_id: BOT.into(),
        text: "A wild countryball appeared!".into(),
        attachment_url: Some(format!("https://cdn.test/{id}.png")),
        in_reply_to_id: None,
    }
}

fn catch(id: u32, spawn_id: u32, name: &str) -> RawEvent {
    RawEvent {
        id: id.to_string(),
        author_id: BOT.into(),
        text: format!("<@42> You caught **{name}!**"),
        attachment_url: None,
        in_reply_to_id: Some(spawn_id.to_string()),
    }
}

fn pipeline(history: Vec<RawEvent>, corpus: Arc<dyn CorpusSource>, fetcher: MapFetcher) -> Pipeline {
    Pipeline {
        events: Arc::new(MemorySource::from_chronological(history)),
        corpus,
        cache: Arc::new(CorpusCache::new(Arc::new(fetcher))),
        scorer: Arc::new(PixelDiffScorer::default()),
        catalog: Catalog::new(["France", "Egypt"], Vec::<(&str, &str)>::new()).unwrap(),
        rules: HarvestRules::new(BOT).with_page_size(2),
        classify: ClassifyConfig::default(),
    }
}

#[tokio::test]
async fn caught_spawns_and_report_totals() {
    // Spawns 1, 2, 4; 1 and 4 caught as France; 2 stays unverified but its
    // image is pixel-identical to the egypt reference.
    let history = vec![
        spawn(1),
        spawn(2),
        catch(3, 1, "France"),
        spawn(4),
        catch(5, 4, "France"),
    ];
    let p = pipeline(
        history,
        Arc::new(StaticCorpus(listing())),
        MapFetcher {
            images: images(),
            delay: None,
        },
    );
    let out = p.run().await.unwrap();
    let r = &out.report;

    assert_eq!(r.total_spawns, 3);
    assert_eq!(r.total_caught, 2);
    assert_eq!(r.total_unverified, 1);
    assert_eq!(r.tally.get("france"), Some(2));
    assert_eq!(r.auto_identified, 1);
    assert_eq!(r.tally.get("egypt"), Some(1));
    assert!(r.manual_review.is_empty());
    assert!(r.render_text().contains("france: 2\negypt: 1\n"));
}

#[tokio::test]
async fn dissimilar_spawn_needs_manual_review() {
    // Spawn 4 is half black/half white: ~50% against either flat reference.
    let p = pipeline(
        vec![spawn(4)],
        Arc::new(StaticCorpus(listing())),
        MapFetcher {
            images: images(),
            delay: None,
        },
    );
    let out = p.run().await.unwrap();
    assert_eq!(out.report.total_unverified, 1);
    assert_eq!(out.report.auto_identified, 0);
    assert_eq!(out.report.manual_review, vec!["https://cdn.test/4.png".to_string()]);
    assert_eq!(out.report.tally.total(), 0);
}

#[tokio::test]
async fn unreachable_reference_is_not_fatal() {
    // Only the egypt reference would match spawn 2, and it cannot be fetched.
    let mut imgs = images();
    imgs.remove(&ref_url("[egypt]_1.png"));
    let p = pipeline(
        vec![spawn(2)],
        Arc::new(StaticCorpus(listing())),
        MapFetcher {
            images: imgs,
            delay: None,
        },
    );
    let out = p.run().await.unwrap();
    assert_eq!(out.report.manual_review, vec!["https://cdn.test/2.png".to_string()]);
    assert_eq!(out.report.auto_identified, 0);
}

#[tokio::test]
async fn corpus_entries_outside_catalog_are_reported() {
    let mut files = listing();
    files.push(ListedFile {
        name: "[atlantis]_1.png".into(),
        download_url: Some(ref_url("[atlantis]_1.png")),
    });
    let p = pipeline(
        vec![spawn(1), catch(2, 1, "France")],
        Arc::new(StaticCorpus(files)),
        MapFetcher {
            images: images(),
            delay: None,
        },
    );
    let out = p.run().await.unwrap();
    assert_eq!(out.corpus_warnings.len(), 1);
    assert_eq!(out.report.total_caught, 1);
}

#[tokio::test]
async fn corpus_listing_failure_fails_the_run() {
    let p = pipeline(
        vec![spawn(1)],
        Arc::new(DownCorpus),
        MapFetcher {
            images: images(),
            delay: None,
        },
    );
    let err = p.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("github unreachable"));
}

#[tokio::test]
async fn timeout_discards_partial_results() {
    let p = pipeline(
        vec![spawn(2)],
        Arc::new(StaticCorpus(listing())),
        MapFetcher {
            images: images(),
            delay: Some(Duration::from_secs(30)),
        },
    );
    let err = p
        .run_with_timeout(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timeout"));
    assert!(p.cache.is_empty().await);
}
