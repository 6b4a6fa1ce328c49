// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Enhancement operations — histogram equalization (global and tiled),
// non-local-means denoising, and 3x3 Gaussian smoothing.

pub mod blur;
pub mod denoise;
pub mod histogram;

pub use blur::gaussian_blur_3x3;
pub use denoise::non_local_means;
pub use histogram::{clahe, equalize};
