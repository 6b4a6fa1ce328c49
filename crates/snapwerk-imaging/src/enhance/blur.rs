// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 3x3 Gaussian smoothing for any 8-bit pixel type.

use image::{ImageBuffer, Pixel};
use imageproc::definitions::Image;
use imageproc::filter::filter3x3;
use imageproc::map::{ChannelMap, WithChannel};

/// Unnormalised binomial kernel; the weights sum to 16.
const KERNEL: [f32; 9] = [1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0];

/// Smooth with the `[1 2 1; 2 4 2; 1 2 1] / 16` kernel.
///
/// Works channel by channel, so gray and color buffers keep their channel
/// count. Border pixels are replicated; results round to nearest.
pub fn gaussian_blur_3x3<P>(image: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + WithChannel<f32>,
{
    let (width, height) = image.dimensions();
    let mut output: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    // Weighted sums stay exact integers in f32 (at most 255 * 16).
    let sums: Image<ChannelMap<P, f32>> = filter3x3(image, &KERNEL);
    for (sample, &sum) in output.iter_mut().zip(sums.as_raw()) {
        *sample = ((sum as u32 + 8) >> 4) as u8;
    }
    output
}
