// src/config/catalog.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;

pub const ENV_CATALOG_PATH: &str = "CATALOG_PATH";

#[derive(Debug, Deserialize)]
struct CatalogFile {
    categories: Vec<String>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

/// Load the catalog from an explicit path. Supports TOML or JSON formats.
pub fn load_catalog_from(path: &Path) -> Result<Catalog> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading catalog from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_catalog(&content, ext.as_str())
        .with_context(|| format!("parsing catalog {}", path.display()))
}

/// Load the catalog using env var + fallbacks:
/// 1) $CATALOG_PATH
/// 2) config/catalog.toml
/// 3) config/catalog.json
///
/// Unlike optional lists, a missing catalog is an error: nothing can be tallied without one.
pub fn load_catalog_default() -> Result<Catalog> {
    if let Ok(p) = std::env::var(ENV_CATALOG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_catalog_from(&pb);
        } else {
            return Err(anyhow!("CATALOG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/catalog.toml");
    if toml_p.exists() {
        return load_catalog_from(&toml_p);
    }
    let json_p = PathBuf::from("config/catalog.json");
    if json_p.exists() {
        return load_catalog_from(&json_p);
    }
    Err(anyhow!(
        "no catalog found (set CATALOG_PATH or add config/catalog.toml)"
    ))
}

fn parse_catalog(s: &str, hint_ext: &str) -> Result<Catalog> {
    let file = if hint_ext == "json" {
        serde_json::from_str::<CatalogFile>(s).context("catalog json")?
    } else if hint_ext == "toml" {
        toml::from_str::<CatalogFile>(s).context("catalog toml")?
    } else {
        // No usable extension: sniff JSON first, then TOML.
        match serde_json::from_str::<CatalogFile>(s) {
            Ok(v) => v,
            Err(_) => toml::from_str::<CatalogFile>(s)
                .map_err(|_| anyhow!("unsupported catalog format"))?,
        }
    };
    Ok(Catalog::new(file.categories, file.aliases)?)
}
