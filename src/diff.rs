// src/diff.rs
//! # Image Similarity Scorer
//! Perceptual per-pixel diff on RGBA buffers of identical size. Two pixels
//! differ when their YIQ color distance exceeds `35215 * threshold²`; pixels
//! that only differ because of anti-aliasing in either image are not counted.
//!
//! The score is `100 - differing * 100 / (width * height)`.

use image::RgbaImage;

/// Sensitivity on a 0..1 scale; smaller is stricter.
pub const DEFAULT_DIFF_THRESHOLD: f64 = 0.1;

/// Maximum possible YIQ delta between two RGBA pixels.
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Anything that turns two equally sized buffers into a compatibility score.
/// Must be deterministic for identical inputs; symmetry is not required.
pub trait Scorer: Send + Sync {
    fn score(&self, a: &RgbaImage, b: &RgbaImage) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelDiffScorer {
    pub threshold: f64,
}

impl Default for PixelDiffScorer {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DIFF_THRESHOLD,
        }
    }
}

impl PixelDiffScorer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl Scorer for PixelDiffScorer {
    fn score(&self, a: &RgbaImage, b: &RgbaImage) -> f64 {
        if a.dimensions() != b.dimensions() {
            // Normalization guarantees equal sizes; anything else cannot match.
            return f64::NEG_INFINITY;
        }
        let (w, h) = a.dimensions();
        let total = u64::from(w) * u64::from(h);
        if total == 0 {
            return 100.0;
        }
        let diff = count_differing(a.as_raw(), b.as_raw(), w as usize, h as usize, self.threshold);
        100.0 - (diff as f64 * 100.0) / total as f64
    }
}

/// Number of perceptually differing pixels between two RGBA byte buffers.
pub fn count_differing(img1: &[u8], img2: &[u8], width: usize, height: usize, threshold: f64) -> u64 {
    let len = width * height * 4;
    if img1.len() < len || img2.len() < len {
        return (width * height) as u64;
    }
    if img1[..len] == img2[..len] {
        return 0;
    }

    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    let mut diff = 0u64;

    for y in 0..height {
        for x in 0..width {
            let pos = (y * width + x) * 4;
            let delta = color_delta(img1, img2, pos, pos, false);
            if delta.abs() > max_delta
                && !(antialiased(img1, x, y, width, height, img2)
                    || antialiased(img2, x, y, width, height, img1))
            {
                diff += 1;
            }
        }
    }
    diff
}

/// Whether the pixel at (x1, y1) looks like an anti-aliasing artifact: it has
/// few identical neighbours and sits between a darkest and brightest
/// neighbour that both belong to flat regions in both images.
fn antialiased(img: &[u8], x1: usize, y1: usize, width: usize, height: usize, img2: &[u8]) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let mut min = 0.0f64;
    let mut max = 0.0f64;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0, 0, 0, 0);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(img, img, pos, (y * width + x) * 4, true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = x;
                min_y = y;
            } else if delta > max {
                max = delta;
                max_x = x;
                max_y = y;
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y, width, height)
        && has_many_siblings(img2, min_x, min_y, width, height))
        || (has_many_siblings(img, max_x, max_y, width, height)
            && has_many_siblings(img2, max_x, max_y, width, height))
}

/// More than two neighbours with exactly the same RGBA value.
fn has_many_siblings(img: &[u8], x1: usize, y1: usize, width: usize, height: usize) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let pos2 = (y * width + x) * 4;
            if img[pos..pos + 4] == img[pos2..pos2 + 4] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

/// Squared YIQ distance between pixel `k` of `img1` and pixel `m` of `img2`,
/// negative when `img1` is brighter. With `y_only` returns the signed luma
/// difference instead.
fn color_delta(img1: &[u8], img2: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    let p1 = &img1[k..k + 4];
    let p2 = &img2[m..m + 4];
    if p1 == p2 {
        return 0.0;
    }

    let (r1, g1, b1) = blended(p1);
    let (r2, g2, b2) = blended(p2);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

/// Composite a translucent pixel over white.
fn blended(p: &[u8]) -> (f64, f64, f64) {
    let (r, g, b, a) = (p[0] as f64, p[1] as f64, p[2] as f64, p[3]);
    if a < 255 {
        let a = a as f64 / 255.0;
        (blend(r, a), blend(g, a), blend(b, a))
    } else {
        (r, g, b)
    }
}

fn blend(c: f64, a: f64) -> f64 {
    255.0 + (c - 255.0) * a
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    #[test]
    fn identical_images_score_100() {
        let a = solid(10, 10, 80);
        assert_eq!(PixelDiffScorer::default().score(&a, &a.clone()), 100.0);
    }

    #[test]
    fn opposite_images_score_0() {
        let s = PixelDiffScorer::default().score(&solid(10, 10, 0), &solid(10, 10, 255));
        assert_eq!(s, 0.0);
    }

    #[test]
    fn small_deltas_are_under_threshold() {
        // 10 grey levels is far below 35215 * 0.01.
        let s = PixelDiffScorer::default().score(&solid(8, 8, 100), &solid(8, 8, 110));
        assert_eq!(s, 100.0);
        // ...but not when the threshold is zero.
        let s = PixelDiffScorer::new(0.0).score(&solid(8, 8, 100), &solid(8, 8, 110));
        assert_eq!(s, 0.0);
    }

    #[test]
    fn block_difference_counts_pixels() {
        // Left half black vs all white: a 10x10 image with a 5x10 block changed.
        let a = solid(10, 10, 255);
        let mut b = a.clone();
        for y in 0..10 {
            for x in 0..5 {
                b.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let s = PixelDiffScorer::default().score(&a, &b);
        assert_eq!(s, 50.0);
    }

    #[test]
    fn deterministic_on_repeat() {
        let a = solid(12, 12, 30);
        let mut b = solid(12, 12, 30);
        b.put_pixel(3, 4, Rgba([250, 10, 10, 255]));
        b.put_pixel(7, 7, Rgba([0, 200, 10, 128]));
        let sc = PixelDiffScorer::default();
        assert_eq!(sc.score(&a, &b), sc.score(&a, &b));
    }

    #[test]
    fn size_mismatch_is_worst_case() {
        let s = PixelDiffScorer::default().score(&solid(2, 2, 0), &solid(3, 3, 0));
        assert_eq!(s, f64::NEG_INFINITY);
    }

    #[test]
    fn translucent_blends_over_white() {
        assert_eq!(blended(&[0, 0, 0, 0]), (255.0, 255.0, 255.0));
        assert_eq!(blended(&[10, 20, 30, 255]), (10.0, 20.0, 30.0));
    }
}
