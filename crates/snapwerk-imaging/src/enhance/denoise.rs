// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Non-local-means denoising for single-channel images.
//
// For every offset in the search window we build the squared-difference image
// between the source and its shifted copy, take its summed-area table, and
// read each pixel's patch distance in O(1). The cost is therefore
// proportional to the search-window size only, not search * patch.

use image::{GrayImage, Luma};
use tracing::{debug, instrument};

/// Filter strength used by the `denoise` action. Larger values smooth more.
pub const DENOISE_STRENGTH: f32 = 10.0;

/// Patch radius (7x7 comparison template).
pub const PATCH_RADIUS: u32 = 3;

/// Search radius (11x11 window of candidate patches).
pub const SEARCH_RADIUS: u32 = 5;

/// Non-local-means filter.
///
/// Each output pixel is the weighted mean of the pixels in its search window,
/// weighted by `exp(-d / h²)` where `d` is the mean squared difference between
/// the two surrounding patches. Borders are handled by clamping coordinates.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn non_local_means(
    gray: &GrayImage,
    strength: f32,
    patch_radius: u32,
    search_radius: u32,
) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || strength <= 0.0 {
        return gray.clone();
    }

    let pixel_count = (width * height) as usize;
    let h2 = strength * strength;
    let search = search_radius as i64;

    let mut weighted_sum = vec![0f32; pixel_count];
    let mut weight_total = vec![0f32; pixel_count];
    let mut diff = vec![0u64; pixel_count];

    for dy in -search..=search {
        for dx in -search..=search {
            // Squared difference between the image and its (dx, dy) shift.
            for y in 0..height {
                for x in 0..width {
                    let a = gray.get_pixel(x, y).0[0] as i64;
                    let b = shifted(gray, x, y, dx, dy) as i64;
                    diff[(y * width + x) as usize] = ((a - b) * (a - b)) as u64;
                }
            }
            let integral = compute_integral_image(&diff, width, height);

            for y in 0..height {
                for x in 0..width {
                    let distance =
                        region_mean(&integral, width, height, x, y, patch_radius) as f32;
                    let weight = (-distance / h2).exp();
                    let idx = (y * width + x) as usize;
                    weighted_sum[idx] += weight * shifted(gray, x, y, dx, dy) as f32;
                    weight_total[idx] += weight;
                }
            }
        }
    }
    debug!(strength, patch_radius, search_radius, "Non-local means pass complete");

    GrayImage::from_fn(width, height, |x, y| {
        let idx = (y * width + x) as usize;
        // The zero offset always contributes weight 1, so the total is > 0.
        let value = weighted_sum[idx] / weight_total[idx];
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Sample at `(x + dx, y + dy)`, clamped to the image.
fn shifted(gray: &GrayImage, x: u32, y: u32, dx: i64, dy: i64) -> u8 {
    let sx = (x as i64 + dx).clamp(0, gray.width() as i64 - 1) as u32;
    let sy = (y as i64 + dy).clamp(0, gray.height() as i64 - 1) as u32;
    gray.get_pixel(sx, sy).0[0]
}

/// Summed-area table of a row-major `width` x `height` buffer.
///
/// `table[y * (width+1) + x]` holds the sum over `[0, x) x [0, y)`; the
/// first row and column are zero.
fn compute_integral_image(values: &[u64], width: u32, height: u32) -> Vec<u64> {
    let stride = (width + 1) as usize;
    let mut table = vec![0u64; stride * (height + 1) as usize];

    for y in 0..height as usize {
        let mut row_sum: u64 = 0;
        for x in 0..width as usize {
            row_sum += values[y * width as usize + x];
            table[(y + 1) * stride + x + 1] = row_sum + table[y * stride + x + 1];
        }
    }

    table
}

/// Mean of the square of side `2 * radius + 1` centred on `(cx, cy)`,
/// clipped to the image.
fn region_mean(
    integral: &[u64],
    width: u32,
    height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(width as usize);
    let y2 = ((cy + radius + 1) as usize).min(height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    let sum = integral[y2 * stride + x2] + integral[y1 * stride + x1]
        - integral[y1 * stride + x2]
        - integral[y2 * stride + x1];

    sum as f64 / area
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_is_unchanged() {
        let img = GrayImage::from_pixel(20, 12, Luma([137]));
        let out = non_local_means(&img, DENOISE_STRENGTH, PATCH_RADIUS, SEARCH_RADIUS);
        assert_eq!(out, img);
    }

    #[test]
    fn isolated_speckle_is_suppressed() {
        let mut img = GrayImage::from_pixel(24, 24, Luma([100]));
        img.put_pixel(12, 12, Luma([255]));
        let out = non_local_means(&img, 30.0, PATCH_RADIUS, SEARCH_RADIUS);
        let centre = out.get_pixel(12, 12).0[0];
        assert!(centre < 255, "speckle survived: {centre}");
        assert_eq!(out.dimensions(), (24, 24));
    }

    #[test]
    fn strong_edges_survive() {
        // Left half dark, right half bright: patches across the edge differ a
        // lot, so each side keeps its own level.
        let img = GrayImage::from_fn(30, 10, |x, _| Luma([if x < 15 { 20 } else { 230 }]));
        let out = non_local_means(&img, DENOISE_STRENGTH, PATCH_RADIUS, SEARCH_RADIUS);
        assert!(out.get_pixel(2, 5).0[0] < 40);
        assert!(out.get_pixel(27, 5).0[0] > 210);
    }

    #[test]
    fn zero_strength_is_identity() {
        let img = GrayImage::from_fn(8, 8, |x, y| Luma([(x * 30 + y) as u8]));
        assert_eq!(non_local_means(&img, 0.0, PATCH_RADIUS, SEARCH_RADIUS), img);
    }

    #[test]
    fn integral_image_region_mean() {
        let values: Vec<u64> = (0..12).collect(); // 4 x 3, row-major
        let integral = compute_integral_image(&values, 4, 3);
        // Whole image: mean of 0..12 = 5.5
        let mean = region_mean(&integral, 4, 3, 1, 1, 5);
        assert!((mean - 5.5).abs() < 1e-9);
        // Single pixel at (2, 1) = 6
        let mean = region_mean(&integral, 4, 3, 2, 1, 0);
        assert!((mean - 6.0).abs() < 1e-9);
    }
}
