// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dashed rectangle outlines.
//
// Each edge of the rectangle is split into `floor(length / dash_length)` equal
// subdivisions; even-numbered subdivisions are drawn, odd ones are the gaps.
// Edges are handled independently, so a short edge (fewer than one full
// dash) stays blank without affecting its neighbours.

use image::{Luma, Rgb};
use imageproc::drawing::{Canvas, draw_line_segment_mut};
use snapwerk_core::ChannelOrder;
use tracing::trace;

use crate::raster::{Raster, luma_bt601};

/// A point in pixel space, `(x, y)`.
pub type Point = (f32, f32);

/// Default outline color (green).
pub const DEFAULT_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Default outline thickness in pixels.
pub const DEFAULT_BOX_THICKNESS: u32 = 2;

/// Default dash length in pixels.
pub const DEFAULT_DASH_LENGTH: f32 = 10.0;

/// Draws dashed rectangle outlines onto rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashedBoxRenderer {
    /// Outline color as logical red-green-blue.
    pub color: Rgb<u8>,
    /// Number of parallel one-pixel lines per dash, growing inward.
    pub thickness: u32,
    pub dash_length: f32,
}

impl Default for DashedBoxRenderer {
    fn default() -> Self {
        Self {
            color: DEFAULT_BOX_COLOR,
            thickness: DEFAULT_BOX_THICKNESS,
            dash_length: DEFAULT_DASH_LENGTH,
        }
    }
}

impl DashedBoxRenderer {
    pub fn new(color: Rgb<u8>, thickness: u32, dash_length: f32) -> Self {
        Self {
            color,
            thickness,
            dash_length,
        }
    }

    /// Outline the rectangle spanned by `top_left` and `bottom_right` in
    /// place. Returns the number of dash segments drawn.
    ///
    /// Edges are walked top-left → top-right → bottom-right → bottom-left →
    /// top-left. The color is written in the raster's own channel order, or
    /// as its luma on gray rasters.
    pub fn draw(&self, raster: &mut Raster, top_left: (i32, i32), bottom_right: (i32, i32)) -> usize {
        let segments = self.box_segments(top_left, bottom_right);
        let (r, g, b) = (self.color.0[0], self.color.0[1], self.color.0[2]);

        match raster {
            Raster::Gray(img) => {
                let luma = Luma([luma_bt601(r, g, b)]);
                for (start, end) in &segments {
                    self.stroke(img, *start, *end, luma);
                }
            }
            Raster::Color { pixels, order } => {
                let color = match order {
                    ChannelOrder::Rgb => Rgb([r, g, b]),
                    ChannelOrder::Bgr => Rgb([b, g, r]),
                };
                for (start, end) in &segments {
                    self.stroke(pixels, *start, *end, color);
                }
            }
        }

        trace!(segments = segments.len(), "dashed box drawn");
        segments.len()
    }

    /// All dash segments of the four edges, in drawing order.
    pub fn box_segments(&self, top_left: (i32, i32), bottom_right: (i32, i32)) -> Vec<(Point, Point)> {
        let (x0, y0) = (top_left.0 as f32, top_left.1 as f32);
        let (x1, y1) = (bottom_right.0 as f32, bottom_right.1 as f32);
        let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];

        (0..corners.len())
            .flat_map(|i| dash_segments(corners[i], corners[(i + 1) % corners.len()], self.dash_length))
            .collect()
    }

    /// Draw one segment `thickness` pixels wide. Extra lines are offset along
    /// the left-hand normal of the direction of travel, which points into the
    /// box for the clockwise walk above.
    fn stroke<C: Canvas>(&self, canvas: &mut C, start: Point, end: Point, color: C::Pixel)
    where
        C::Pixel: Copy,
    {
        let (dx, dy) = (end.0 - start.0, end.1 - start.1);
        let length = dx.hypot(dy);
        if length == 0.0 {
            return;
        }
        let normal = (-dy / length, dx / length);
        let lead = (self.thickness.max(1) as i32 - 1) / 2;

        for line in 0..self.thickness.max(1) as i32 {
            let shift = (line - lead) as f32;
            let offset = (normal.0 * shift, normal.1 * shift);
            draw_line_segment_mut(
                canvas,
                (start.0 + offset.0, start.1 + offset.1),
                (end.0 + offset.0, end.1 + offset.1),
                color,
            );
        }
    }
}

/// Split the edge `a → b` into `floor(|ab| / dash_length)` equal parts and
/// return the even-numbered parts as `(start, end)` pairs.
///
/// Yields nothing when the edge is shorter than one dash or `dash_length` is
/// not positive.
pub fn dash_segments(a: Point, b: Point, dash_length: f32) -> Vec<(Point, Point)> {
    if dash_length <= 0.0 {
        return Vec::new();
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let count = (dx.hypot(dy) / dash_length).floor() as usize;

    let at = |i: usize| {
        let (i, n) = (i as f32, count as f32);
        (a.0 + dx * i / n, a.1 + dy * i / n)
    };

    (0..count).step_by(2).map(|i| (at(i), at(i + 1))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    #[test]
    fn hundred_pixel_edge_gives_five_dashes() {
        let segments = dash_segments((10.0, 10.0), (110.0, 10.0), 10.0);
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], ((10.0, 10.0), (20.0, 10.0)));
        assert_eq!(segments[4], ((90.0, 10.0), (100.0, 10.0)));
    }

    #[test]
    fn odd_subdivision_count_draws_the_last_part() {
        // 50 / 10 = 5 subdivisions → parts 0, 2, 4.
        let segments = dash_segments((0.0, 0.0), (0.0, 50.0), 10.0);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2], ((0.0, 40.0), (0.0, 50.0)));
    }

    #[test]
    fn rectangle_edges_are_independent() {
        let renderer = DashedBoxRenderer::default();
        let segments = renderer.box_segments((10, 10), (110, 50));
        // top 5 + right 2 + bottom 5 + left 2
        assert_eq!(segments.len(), 14);

        let top = dash_segments((10.0, 10.0), (110.0, 10.0), 10.0);
        let right = dash_segments((110.0, 10.0), (110.0, 50.0), 10.0);
        assert_eq!(top.len(), 5);
        assert_eq!(right.len(), 2);
        assert_eq!(&segments[..5], &top[..]);
        assert_eq!(&segments[5..7], &right[..]);
    }

    #[test]
    fn box_smaller_than_a_dash_draws_nothing() {
        let mut raster = Raster::from_rgb(RgbImage::new(20, 20));
        let before = raster.clone();
        let drawn = DashedBoxRenderer::default().draw(&mut raster, (2, 2), (8, 9));
        assert_eq!(drawn, 0);
        assert_eq!(raster, before);
    }

    #[test]
    fn non_positive_dash_length_draws_nothing() {
        assert!(dash_segments((0.0, 0.0), (100.0, 0.0), 0.0).is_empty());
        assert!(dash_segments((0.0, 0.0), (100.0, 0.0), -3.0).is_empty());
    }

    #[test]
    fn draw_paints_dashes_and_leaves_gaps() {
        let mut raster = Raster::from_rgb(RgbImage::new(130, 70));
        let renderer = DashedBoxRenderer::new(Rgb([255, 0, 0]), 1, 10.0);
        let drawn = renderer.draw(&mut raster, (10, 10), (110, 50));
        assert_eq!(drawn, 14);

        let Raster::Color { pixels, .. } = &raster else {
            panic!("expected color raster");
        };
        // Inside the first dash of the top edge.
        assert_eq!(pixels.get_pixel(15, 10).0, [255, 0, 0]);
        // Inside the first gap of the top edge.
        assert_eq!(pixels.get_pixel(25, 10).0, [0, 0, 0]);
        // Box interior untouched.
        assert_eq!(pixels.get_pixel(60, 30).0, [0, 0, 0]);
    }

    #[test]
    fn draw_respects_bgr_order() {
        let mut raster = Raster::from_bgr(RgbImage::new(40, 40));
        let renderer = DashedBoxRenderer::new(Rgb([255, 0, 0]), 1, 10.0);
        renderer.draw(&mut raster, (0, 0), (30, 30));
        let Raster::Color { pixels, .. } = &raster else {
            panic!("expected color raster");
        };
        assert_eq!(pixels.get_pixel(5, 0).0, [0, 0, 255]);
    }

    #[test]
    fn thickness_grows_inward() {
        let mut raster = Raster::from_rgb(RgbImage::new(60, 60));
        let renderer = DashedBoxRenderer::new(Rgb([0, 255, 0]), 2, 10.0);
        renderer.draw(&mut raster, (10, 10), (50, 50));
        let Raster::Color { pixels, .. } = &raster else {
            panic!("expected color raster");
        };
        assert_eq!(pixels.get_pixel(15, 10).0, [0, 255, 0]);
        assert_eq!(pixels.get_pixel(15, 11).0, [0, 255, 0]);
        assert_eq!(pixels.get_pixel(15, 9).0, [0, 0, 0]);
    }

    #[test]
    fn gray_rasters_get_luma_of_color() {
        let mut raster = Raster::Gray(GrayImage::new(40, 40));
        let renderer = DashedBoxRenderer::new(Rgb([255, 255, 255]), 1, 10.0);
        let drawn = renderer.draw(&mut raster, (0, 0), (30, 30));
        assert_eq!(drawn, 8);
        assert_eq!(raster.channels(), 1);
        let Raster::Gray(img) = &raster else {
            panic!("expected gray raster");
        };
        assert_eq!(img.get_pixel(5, 0).0[0], 255);
    }
}
