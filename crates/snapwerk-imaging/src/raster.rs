// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory raster with explicit channel-count and channel-order bookkeeping.

use image::{GrayImage, Luma, Rgb, RgbImage};
use snapwerk_core::ChannelOrder;

/// An 8-bit raster with either one (luma) or three (interleaved color)
/// channels.
///
/// The variant *is* the channel count: an operation that reduces or promotes
/// channels returns the other variant, so later stages branch on it. Color
/// rasters also record their sample order, which only matters when samples
/// are handed to something order-sensitive (face location, encoding).
#[derive(Debug, Clone, PartialEq)]
pub enum Raster {
    Gray(GrayImage),
    Color {
        pixels: RgbImage,
        order: ChannelOrder,
    },
}

impl Raster {
    // -- Construction ---------------------------------------------------------

    /// Wrap a color buffer whose samples are red-green-blue.
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self::Color {
            pixels,
            order: ChannelOrder::Rgb,
        }
    }

    /// Wrap a color buffer whose samples are blue-green-red.
    pub fn from_bgr(pixels: RgbImage) -> Self {
        Self::Color {
            pixels,
            order: ChannelOrder::Bgr,
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Color { pixels, .. } => pixels.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Color { pixels, .. } => pixels.height(),
        }
    }

    /// 1 for gray, 3 for color.
    pub fn channels(&self) -> u8 {
        match self {
            Self::Gray(_) => 1,
            Self::Color { .. } => 3,
        }
    }

    /// Sample order of a color raster; `None` for gray.
    pub fn order(&self) -> Option<ChannelOrder> {
        match self {
            Self::Gray(_) => None,
            Self::Color { order, .. } => Some(*order),
        }
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, Self::Gray(_))
    }

    /// Raw interleaved samples.
    pub fn samples(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Color { pixels, .. } => pixels.as_raw(),
        }
    }

    // -- Channel conversions --------------------------------------------------

    /// Single-channel luma view of the raster (copied for color input).
    pub fn luma(&self) -> GrayImage {
        match self {
            Self::Gray(img) => img.clone(),
            Self::Color { pixels, order } => {
                GrayImage::from_fn(pixels.width(), pixels.height(), |x, y| {
                    let (r, g, b) = logical_rgb(pixels.get_pixel(x, y), *order);
                    Luma([luma_bt601(r, g, b)])
                })
            }
        }
    }

    /// Reduce to one channel. A gray raster is returned as-is.
    pub fn into_gray(self) -> Self {
        match self {
            Self::Gray(_) => self,
            color => Self::Gray(color.luma()),
        }
    }

    /// The single-channel buffer, reducing color input first.
    pub fn into_gray_image(self) -> GrayImage {
        match self {
            Self::Gray(img) => img,
            color => color.luma(),
        }
    }

    /// Promote a gray raster to three channels (RGB order) by replicating
    /// luma. Color rasters keep their existing order.
    pub fn into_color(self) -> Self {
        match self {
            Self::Gray(img) => Self::from_rgb(replicate_luma(&img)),
            color => color,
        }
    }

    /// Copy of the raster with samples in red-green-blue order, whatever the
    /// current channel count or order.
    pub fn to_rgb_image(&self) -> RgbImage {
        match self {
            Self::Gray(img) => replicate_luma(img),
            Self::Color {
                pixels,
                order: ChannelOrder::Rgb,
            } => pixels.clone(),
            Self::Color {
                pixels,
                order: ChannelOrder::Bgr,
            } => swap_red_blue(pixels),
        }
    }
}

/// BT.601 luma in 14-bit fixed point, rounded to nearest.
pub fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868;
    ((weighted + 8192) >> 14) as u8
}

/// Read a pixel as logical (red, green, blue) given the buffer's order.
pub(crate) fn logical_rgb(pixel: &Rgb<u8>, order: ChannelOrder) -> (u8, u8, u8) {
    let [a, g, c] = pixel.0;
    match order {
        ChannelOrder::Rgb => (a, g, c),
        ChannelOrder::Bgr => (c, g, a),
    }
}

fn replicate_luma(img: &GrayImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

fn swap_red_blue(img: &RgbImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let [b, g, r] = img.get_pixel(x, y).0;
        Rgb([r, g, b])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights_cover_full_range() {
        assert_eq!(luma_bt601(0, 0, 0), 0);
        assert_eq!(luma_bt601(255, 255, 255), 255);
        // Green dominates, blue contributes least.
        assert!(luma_bt601(0, 255, 0) > luma_bt601(255, 0, 0));
        assert!(luma_bt601(255, 0, 0) > luma_bt601(0, 0, 255));
        assert_eq!(luma_bt601(255, 0, 0), 76);
    }

    #[test]
    fn luma_respects_channel_order() {
        let rgb = Raster::from_rgb(RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])));
        let bgr = Raster::from_bgr(RgbImage::from_pixel(2, 2, Rgb([0, 0, 255])));
        assert_eq!(rgb.luma(), bgr.luma());
    }

    #[test]
    fn into_gray_changes_channel_count() {
        let raster = Raster::from_rgb(RgbImage::from_pixel(3, 2, Rgb([10, 20, 30])));
        let gray = raster.into_gray();
        assert_eq!(gray.channels(), 1);
        assert_eq!((gray.width(), gray.height()), (3, 2));
        assert_eq!(gray.order(), None);
    }

    #[test]
    fn into_color_promotes_gray_only() {
        let gray = Raster::Gray(GrayImage::from_pixel(2, 2, Luma([77])));
        let promoted = gray.into_color();
        assert_eq!(promoted.channels(), 3);
        assert_eq!(promoted.order(), Some(ChannelOrder::Rgb));
        assert!(promoted.samples().iter().all(|&s| s == 77));

        let bgr = Raster::from_bgr(RgbImage::from_pixel(1, 1, Rgb([1, 2, 3])));
        assert_eq!(bgr.clone().into_color(), bgr);
    }

    #[test]
    fn to_rgb_image_swaps_bgr() {
        let bgr = Raster::from_bgr(RgbImage::from_pixel(1, 1, Rgb([1, 2, 3])));
        assert_eq!(bgr.to_rgb_image().get_pixel(0, 0).0, [3, 2, 1]);
        // The raster itself keeps its order.
        assert_eq!(bgr.order(), Some(ChannelOrder::Bgr));
    }
}
