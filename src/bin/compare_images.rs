//! Score two local images exactly the way the classifier does.
//!
//! Usage: `compare_images <a.png> <b.png> [diff-threshold]`

use anyhow::{bail, Context, Result};
use spawn_reconciler::corpus::normalize_image;
use spawn_reconciler::diff::{PixelDiffScorer, Scorer, DEFAULT_DIFF_THRESHOLD};
use spawn_reconciler::ACCEPT_THRESHOLD;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: compare_images <a> <b> [diff-threshold]");
    }
    let threshold = match args.get(2) {
        Some(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("invalid diff threshold {raw}"))?,
        None => DEFAULT_DIFF_THRESHOLD,
    };

    let load = |path: &str| -> Result<_> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {path}"))?;
        Ok(normalize_image(path, &bytes)?)
    };
    let a = load(&args[0])?;
    let b = load(&args[1])?;

    let score = PixelDiffScorer::new(threshold).score(&a, &b);
    let verdict = if score >= ACCEPT_THRESHOLD {
        "match"
    } else {
        "no match"
    };
    println!("{score:.3} ({verdict})");
    Ok(())
}
