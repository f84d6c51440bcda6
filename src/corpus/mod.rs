// src/corpus/mod.rs
//! Reference corpus: where the reference images live, how their names encode
//! a category, and how raw image bytes become comparable buffers.

pub mod cache;
pub mod providers;

use anyhow::Result;
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::catalog::Catalog;
use crate::error::{DataIntegrityWarning, FetchError};

/// Edge length every compared image is resized to.
pub const CANONICAL_SIZE: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CorpusEntry {
    /// Canonical category name.
    pub category: String,
    pub source_url: String,
}

/// A raw listing row before category extraction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ListedFile {
    pub name: String,
    pub download_url: Option<String>,
}

/// Lists the reference images of a repository.
#[async_trait::async_trait]
pub trait CorpusSource: Send + Sync {
    async fn list_files(&self) -> Result<Vec<ListedFile>>;
    fn name(&self) -> &'static str;
}

/// Downloads raw image bytes.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Only image files take part in matching.
pub fn is_image_name(name: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)^.+\.(png|gif)$").expect("static regex"))
        .is_match(name)
}

/// `[albania]_2.png` -> `albania`. The category sits between the first `[`
/// and the following `]`; returns `None` when there is no such pair.
pub fn category_from_entry_name(name: &str) -> Option<&str> {
    let open = name.find('[')?;
    let rest = &name[open + 1..];
    let close = rest.find(']')?;
    let inner = rest[..close].trim();
    (!inner.is_empty()).then_some(inner)
}

/// Turn a listing into corpus entries: non-images and unnamed files are
/// dropped silently, categories missing from the catalog with a warning.
pub fn entries_from_listing(
    files: Vec<ListedFile>,
    catalog: &Catalog,
) -> (Vec<CorpusEntry>, Vec<DataIntegrityWarning>) {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();
    for f in files {
        if !is_image_name(&f.name) {
            continue;
        }
        let (Some(raw), Some(url)) = (category_from_entry_name(&f.name), f.download_url) else {
            tracing::debug!(target: "corpus", file = %f.name, "no category or download url, skipped");
            continue;
        };
        let category = catalog.normalize(raw);
        if !catalog.contains(&category) {
            let w = DataIntegrityWarning::UnknownCategory {
                id: f.name.clone(),
                category,
            };
            tracing::warn!(target: "corpus", warning = %w, "corpus entry skipped");
            warnings.push(w);
            continue;
        }
        entries.push(CorpusEntry {
            category,
            source_url: url,
        });
    }
    (entries, warnings)
}

/// Decode and bring an image to the one shape every comparison uses:
/// 400x400 cover-fit, grayscale, RGBA layout.
pub fn normalize_image(url: &str, bytes: &[u8]) -> Result<RgbaImage, FetchError> {
    let img = image::load_from_memory(bytes).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(normalize_decoded(&img))
}

pub fn normalize_decoded(img: &DynamicImage) -> RgbaImage {
    img.resize_to_fill(CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Lanczos3)
        .grayscale()
        .to_rgba8()
}
