// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Histogram equalization: the global form delegates to `imageproc`, the
// contrast-limited adaptive form (CLAHE) is implemented here.

use image::{GrayImage, Luma};
use imageproc::contrast::equalize_histogram;
use tracing::{debug, instrument};

/// Clip limit used by the `clahe` action.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Tiles per axis used by the `clahe` action.
pub const CLAHE_GRID: u32 = 8;

/// Global histogram equalization.
pub fn equalize(gray: &GrayImage) -> GrayImage {
    equalize_histogram(gray)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `grid` x `grid` set of tiles (fewer when the
/// image is smaller than the grid). Each tile gets its own equalization
/// mapping, computed from a histogram whose bins are capped at
/// `clip_limit * tile_area / 256`; the clipped excess is spread evenly over
/// all bins. Output pixels blend the mappings of the four nearest tile
/// centres bilinearly, which hides tile seams. A `clip_limit` of zero or less
/// disables clipping.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || grid == 0 {
        return gray.clone();
    }

    let cols = grid.min(width);
    let rows = grid.min(height);

    // One 256-entry lookup table per tile, row-major.
    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        let (y0, y1) = tile_span(row, rows, height);
        for col in 0..cols {
            let (x0, x1) = tile_span(col, cols, width);
            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            if clip_limit > 0.0 {
                clip_histogram(&mut histogram, clip_limit, area);
            }
            luts.push(mapping_from_histogram(&histogram, area));
        }
    }
    debug!(cols, rows, clip_limit, "CLAHE tile mappings computed");

    let tile_w = width as f32 / cols as f32;
    let tile_h = height as f32 / rows as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let (c0, c1, ax) = neighbours(x, tile_w, cols);
        let (r0, r1, ay) = neighbours(y, tile_h, rows);
        let v = gray.get_pixel(x, y).0[0] as usize;

        let at = |r: u32, c: u32| luts[(r * cols + c) as usize][v] as f32;
        let top = at(r0, c0) * (1.0 - ax) + at(r0, c1) * ax;
        let bottom = at(r1, c0) * (1.0 - ax) + at(r1, c1) * ax;
        let blended = top * (1.0 - ay) + bottom * ay;
        Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

/// Half-open pixel range covered by tile `index` out of `count` along an axis
/// of `len` pixels. Non-empty whenever `count <= len`.
fn tile_span(index: u32, count: u32, len: u32) -> (u32, u32) {
    let start = (index as u64 * len as u64 / count as u64) as u32;
    let end = ((index as u64 + 1) * len as u64 / count as u64) as u32;
    (start, end)
}

/// The two tiles whose centres bracket pixel `pos`, and the blend weight of
/// the second one.
fn neighbours(pos: u32, tile_size: f32, count: u32) -> (u32, u32, f32) {
    let g = ((pos as f32 + 0.5) / tile_size - 0.5).max(0.0);
    let first = (g.floor() as u32).min(count - 1);
    let second = (first + 1).min(count - 1);
    let weight = if first == second {
        0.0
    } else {
        (g - first as f32).clamp(0.0, 1.0)
    };
    (first, second, weight)
}

/// Cap every bin at the clip level and redistribute the excess.
fn clip_histogram(histogram: &mut [u32; 256], clip_limit: f32, area: u32) {
    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    if excess == 0 {
        return;
    }

    let per_bin = excess / 256;
    let residual = excess % 256;
    for bin in histogram.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (256 / residual).max(1) as usize;
        for bin in histogram.iter_mut().step_by(step).take(residual as usize) {
            *bin += 1;
        }
    }
}

/// Cumulative-distribution mapping scaled to 0..=255.
fn mapping_from_histogram(histogram: &[u32; 256], area: u32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }
    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (value, &count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[value] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}
