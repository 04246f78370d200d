//! Foliage detection by hue thresholding.
//!
//! The pipeline is: RGB → HSV per pixel, threshold a hue band into a binary
//! mask, close the mask with a square structuring element to merge leaf
//! fragments, label 8-connected regions, and keep the largest one.

use image::RgbImage;

use crate::detector::{BoundingBox, Detector};

/// Inclusive HSV acceptance band.
///
/// Hue is in degrees `[0, 360)`; saturation and value are in `[0, 1]`. When
/// `min_hue_deg > max_hue_deg` the band wraps through 0° (useful for reds).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HueBand {
    /// Lower hue bound in degrees.
    pub min_hue_deg: f32,
    /// Upper hue bound in degrees.
    pub max_hue_deg: f32,
    /// Minimum saturation; filters out greys.
    pub min_saturation: f32,
    /// Minimum value; filters out near-black shadows.
    pub min_value: f32,
}

impl HueBand {
    /// Band tuned for green foliage.
    pub const FOLIAGE: HueBand = HueBand {
        min_hue_deg: 70.0,
        max_hue_deg: 170.0,
        min_saturation: 0.15,
        min_value: 0.15,
    };

    /// Whether an HSV triple falls inside the band.
    pub fn contains(&self, hue: f32, saturation: f32, value: f32) -> bool {
        if saturation < self.min_saturation || value < self.min_value {
            return false;
        }
        if self.min_hue_deg <= self.max_hue_deg {
            hue >= self.min_hue_deg && hue <= self.max_hue_deg
        } else {
            hue >= self.min_hue_deg || hue <= self.max_hue_deg
        }
    }
}

impl Default for HueBand {
    fn default() -> Self {
        Self::FOLIAGE
    }
}

/// Settings for [`ColorSegmentationDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorSegmentationConfig {
    /// Pixels inside this band are foreground.
    pub hue_band: HueBand,
    /// Half-size of the square closing kernel (2 → 5×5). 0 disables closing.
    pub closing_radius: u32,
    /// Regions with fewer pixels are ignored.
    pub min_region_area: u64,
}

impl Default for ColorSegmentationConfig {
    fn default() -> Self {
        Self {
            hue_band: HueBand::FOLIAGE,
            closing_radius: 2,
            min_region_area: 1,
        }
    }
}

/// Heuristic detector that treats the largest foliage-colored region as the tree.
///
/// When two regions have the same pixel area, the one whose first pixel comes
/// earlier in raster order (top-to-bottom, then left-to-right) is chosen.
/// The returned box uses pixel edges, so a region spanning columns `3..=7`
/// yields `x_min = 3`, `x_max = 8`.
#[derive(Debug, Clone, Default)]
pub struct ColorSegmentationDetector {
    config: ColorSegmentationConfig,
}

impl ColorSegmentationDetector {
    /// Detector with the given configuration.
    pub fn new(config: ColorSegmentationConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &ColorSegmentationConfig {
        &self.config
    }
}

impl Detector for ColorSegmentationDetector {
    fn locate(&self, image: &RgbImage) -> Option<BoundingBox> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mask = threshold_mask(image, &self.config.hue_band);
        let mask = close(&mask, width, height, self.config.closing_radius as usize);
        let regions = label_regions(&mask, width, height);

        tracing::debug!(regions = regions.len(), "foliage regions labelled");

        let mut best: Option<&Region> = None;
        for region in regions
            .iter()
            .filter(|r| r.pixel_count >= self.config.min_region_area)
        {
            if best.map_or(true, |b| region.pixel_count > b.pixel_count) {
                best = Some(region);
            }
        }

        best.and_then(|r| {
            BoundingBox::new(
                r.min_x as f64,
                r.min_y as f64,
                (r.max_x + 1) as f64,
                (r.max_y + 1) as f64,
            )
        })
    }
}

/// Convert an 8-bit RGB triple to `(hue_deg, saturation, value)`.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue, saturation, max)
}

/// Row-major binary mask, 1 where the pixel lies inside `band`.
fn threshold_mask(image: &RgbImage, band: &HueBand) -> Vec<u8> {
    image
        .pixels()
        .map(|p| {
            let (h, s, v) = rgb_to_hsv(p.0);
            u8::from(band.contains(h, s, v))
        })
        .collect()
}

/// Morphological closing (dilate, then erode) with a `(2r+1)²` square kernel.
///
/// Pixels outside the image are ignored by both passes, so closing never
/// removes foreground.
fn close(mask: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return mask.to_vec();
    }
    let dilated = square_filter(mask, width, height, radius, Extremum::Max);
    square_filter(&dilated, width, height, radius, Extremum::Min)
}

#[derive(Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

impl Extremum {
    fn of(self, window: impl Iterator<Item = u8>) -> u8 {
        match self {
            Extremum::Max => window.max().unwrap_or(0),
            Extremum::Min => window.min().unwrap_or(0),
        }
    }
}

/// Separable square max/min filter over a binary mask.
fn square_filter(
    mask: &[u8],
    width: usize,
    height: usize,
    radius: usize,
    extremum: Extremum,
) -> Vec<u8> {
    let mut horizontal = vec![0u8; mask.len()];
    for y in 0..height {
        let row = &mask[y * width..(y + 1) * width];
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(width - 1);
            horizontal[y * width + x] = extremum.of(row[lo..=hi].iter().copied());
        }
    }

    let mut out = vec![0u8; mask.len()];
    for y in 0..height {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(height - 1);
        for x in 0..width {
            out[y * width + x] = extremum.of((lo..=hi).map(|yy| horizontal[yy * width + x]));
        }
    }
    out
}

/// Disjoint-set forest with path halving and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            self.parent[root] = self.parent[self.parent[root]];
            root = self.parent[root];
        }
        root
    }

    fn union(&mut self, i: usize, j: usize) {
        let root_i = self.find(i);
        let root_j = self.find(j);
        if root_i == root_j {
            return;
        }
        match self.rank[root_i].cmp(&self.rank[root_j]) {
            std::cmp::Ordering::Less => self.parent[root_i] = root_j,
            std::cmp::Ordering::Greater => self.parent[root_j] = root_i,
            std::cmp::Ordering::Equal => {
                self.parent[root_i] = root_j;
                self.rank[root_j] += 1;
            }
        }
    }
}

/// Horizontal run of foreground pixels; `x_end` is exclusive.
#[derive(Clone, Copy, Debug)]
struct Run {
    y: usize,
    x_start: usize,
    x_end: usize,
}

/// Pixel statistics of one 8-connected region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Region {
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
    pixel_count: u64,
}

/// Label 8-connected foreground regions.
///
/// Regions are returned in the raster order of their first pixel.
fn label_regions(mask: &[u8], width: usize, height: usize) -> Vec<Region> {
    let mut runs = Vec::new();
    let mut row_starts = Vec::with_capacity(height + 1);
    for y in 0..height {
        row_starts.push(runs.len());
        let row = &mask[y * width..(y + 1) * width];
        let mut x = 0;
        while x < width {
            if row[x] == 0 {
                x += 1;
                continue;
            }
            let x_start = x;
            while x < width && row[x] != 0 {
                x += 1;
            }
            runs.push(Run { y, x_start, x_end: x });
        }
    }
    row_starts.push(runs.len());

    let mut uf = UnionFind::new(runs.len());
    for y in 1..height {
        let (prev_lo, prev_hi) = (row_starts[y - 1], row_starts[y]);
        let (cur_lo, cur_hi) = (row_starts[y], row_starts[y + 1]);
        let mut p = prev_lo;
        for c in cur_lo..cur_hi {
            let cur = runs[c];
            // Skip previous-row runs entirely left of the diagonal neighbourhood.
            while p < prev_hi && runs[p].x_end < cur.x_start {
                p += 1;
            }
            let mut q = p;
            while q < prev_hi && runs[q].x_start <= cur.x_end {
                uf.union(c, q);
                q += 1;
            }
        }
    }

    let mut slot_of_root = vec![usize::MAX; runs.len()];
    let mut regions: Vec<Region> = Vec::new();
    for (i, run) in runs.iter().enumerate() {
        let root = uf.find(i);
        let len = (run.x_end - run.x_start) as u64;
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = regions.len();
            regions.push(Region {
                min_x: run.x_start,
                max_x: run.x_end - 1,
                min_y: run.y,
                max_y: run.y,
                pixel_count: len,
            });
        } else {
            let region = &mut regions[slot_of_root[root]];
            region.min_x = region.min_x.min(run.x_start);
            region.max_x = region.max_x.max(run.x_end - 1);
            region.max_y = region.max_y.max(run.y);
            region.pixel_count += len;
        }
    }
    regions
}
