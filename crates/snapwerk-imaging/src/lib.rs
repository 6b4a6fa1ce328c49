// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// snapwerk-imaging — Image processing for the Snapwerk service.
//
// Provides the raster model and JPEG codec, the enhancement operations
// (grayscale, histogram equalization, CLAHE, non-local-means denoising,
// Gaussian blur), face location with dashed-box annotation, and the
// action pipeline that strings them together.

pub mod codec;
pub mod draw;
pub mod enhance;
pub mod faces;
pub mod pipeline;
pub mod raster;

// Re-export the primary types so callers can use `snapwerk_imaging::ActionPipeline` etc.
pub use codec::ImageCodec;
pub use draw::DashedBoxRenderer;
pub use faces::{FaceLocator, UnavailableLocator, annotate_faces, locator_from_model};
pub use pipeline::{ActionPipeline, PipelineParams};
pub use raster::Raster;

#[cfg(feature = "seeta")]
pub use faces::SeetaFaceLocator;
