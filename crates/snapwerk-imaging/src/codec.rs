// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image codec — bytes to `Raster` and back, using the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use snapwerk_core::error::{Result, SnapwerkError};
use tracing::{debug, instrument};

use crate::raster::Raster;

/// JPEG quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Decodes uploaded bytes into rasters and encodes rasters as JPEG.
#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    quality: u8,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageCodec {
    /// Create a codec encoding at `quality` (clamped to 1..=100).
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decode any format the `image` crate recognises.
    ///
    /// Luma sources (with or without alpha) become `Raster::Gray`; everything
    /// else becomes an RGB-ordered `Raster::Color`. Alpha is discarded.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn decode(&self, data: &[u8]) -> Result<Raster> {
        let img = image::load_from_memory(data)
            .map_err(|err| SnapwerkError::Decode(err.to_string()))?;
        let raster = into_raster(img);
        debug!(
            width = raster.width(),
            height = raster.height(),
            channels = raster.channels(),
            "Image decoded from bytes"
        );
        Ok(raster)
    }

    /// Encode as baseline JPEG. Gray rasters produce a single-channel JPEG;
    /// color rasters are written in RGB order regardless of their own order.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height(), channels = raster.channels()))]
    pub fn encode(&self, raster: &Raster) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
        let written = match raster {
            Raster::Gray(img) => img.write_with_encoder(encoder),
            Raster::Color { .. } => raster.to_rgb_image().write_with_encoder(encoder),
        };
        written.map_err(|err| SnapwerkError::Encode(format!("JPEG encoding failed: {err}")))?;
        debug!(bytes = buffer.len(), "JPEG encoded");
        Ok(buffer)
    }
}

fn into_raster(img: DynamicImage) -> Raster {
    match img.color() {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            Raster::Gray(img.to_luma8())
        }
        _ => Raster::from_rgb(img.to_rgb8()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gradient_rgb(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        })
    }

    #[test]
    fn round_trip_preserves_color_geometry() {
        let codec = ImageCodec::default();
        let raster = Raster::from_rgb(gradient_rgb(48, 32));
        let bytes = codec.encode(&raster).expect("encode");
        let decoded = codec.decode(&bytes).expect("decode");

        assert_eq!(decoded.width(), 48);
        assert_eq!(decoded.height(), 32);
        assert_eq!(decoded.channels(), 3);
    }

    #[test]
    fn round_trip_preserves_gray_channel_count() {
        let codec = ImageCodec::default();
        let raster = Raster::Gray(GrayImage::from_fn(20, 30, |x, _| Luma([(x * 10) as u8])));
        let bytes = codec.encode(&raster).expect("encode");
        let decoded = codec.decode(&bytes).expect("decode");

        assert_eq!((decoded.width(), decoded.height()), (20, 30));
        assert_eq!(decoded.channels(), 1);
    }

    #[test]
    fn round_trip_pixels_within_jpeg_tolerance() {
        let codec = ImageCodec::new(100);
        let raster = Raster::Gray(GrayImage::from_pixel(16, 16, Luma([120])));
        let decoded = codec.decode(&codec.encode(&raster).expect("encode")).expect("decode");
        assert!(
            decoded
                .samples()
                .iter()
                .all(|&s| (s as i32 - 120).abs() <= 3)
        );
    }

    #[test]
    fn bgr_is_encoded_as_rgb() {
        let codec = ImageCodec::new(100);
        let raster = Raster::from_bgr(RgbImage::from_pixel(16, 16, Rgb([0, 0, 250])));
        let decoded = codec.decode(&codec.encode(&raster).expect("encode")).expect("decode");
        let Raster::Color { pixels, .. } = decoded else {
            panic!("expected color raster");
        };
        let [r, _, b] = pixels.get_pixel(8, 8).0;
        assert!(r > 200 && b < 50, "got r={r} b={b}");
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let codec = ImageCodec::default();
        let result = codec.decode(b"definitely not an image");
        assert!(matches!(result, Err(SnapwerkError::Decode(_))));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(ImageCodec::new(0).quality(), 1);
        assert_eq!(ImageCodec::new(200).quality(), 100);
    }
}
