// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SeetaFace frontal face locator, backed by the pure-Rust `rustface` crate.
//
// # Feature Gate
//
// Only compiled with the `seeta` feature (enabled by default).
//
// # Model Setup
//
// The detector needs the SeetaFace frontal cascade `seeta_fd_frontal_v1.0.bin`,
// available from the rustface repository:
//   <https://github.com/atomashpolskiy/rustface/tree/master/model>
//
// Place it in `$XDG_DATA_HOME/snapwerk/` or point `face_model_path` at it.

use std::io::Cursor;
use std::path::Path;

use image::RgbImage;
use image::imageops::grayscale;
use rustface::ImageData;
use snapwerk_core::FaceBox;
use snapwerk_core::error::{Result, SnapwerkError};
use tracing::{debug, info, instrument};

use super::FaceLocator;

/// Smallest face side, in pixels, the cascade looks for.
const MIN_FACE_SIZE: u32 = 20;

/// Classifier score a window must reach to count as a face.
const SCORE_THRESHOLD: f64 = 2.0;

/// Scale step between image pyramid levels.
const PYRAMID_SCALE_FACTOR: f32 = 0.8;

/// Sliding-window step in pixels (both axes).
const WINDOW_STEP: u32 = 4;

/// Face locator running the SeetaFace cascade.
///
/// The model is kept as raw bytes and a fresh detector is built per call:
/// detectors carry mutable scan state, and this keeps the locator shareable
/// across request tasks without locking.
pub struct SeetaFaceLocator {
    model: Vec<u8>,
}

impl SeetaFaceLocator {
    /// Load the model file at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SnapwerkError::ModelUnavailable(format!(
                "face model not found at {}; download seeta_fd_frontal_v1.0.bin from \
                 <https://github.com/atomashpolskiy/rustface/tree/master/model>",
                path.display()
            )));
        }
        let model = std::fs::read(path)?;
        let locator = Self::from_model_bytes(model)?;
        info!("SeetaFace model loaded");
        Ok(locator)
    }

    /// Use an in-memory model. The bytes are parsed once up front so a
    /// corrupt model is reported here rather than on the first request.
    pub fn from_model_bytes(model: Vec<u8>) -> Result<Self> {
        rustface::read_model(Cursor::new(&model)).map_err(|e| {
            SnapwerkError::ModelUnavailable(format!("face model is not a SeetaFace cascade: {e}"))
        })?;
        Ok(Self { model })
    }
}

impl FaceLocator for SeetaFaceLocator {
    fn locate(&self, rgb: &RgbImage) -> Result<Vec<FaceBox>> {
        let (width, height) = rgb.dimensions();
        let model = rustface::read_model(Cursor::new(&self.model))
            .map_err(|e| SnapwerkError::FaceLocator(format!("model reload failed: {e}")))?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(MIN_FACE_SIZE);
        detector.set_score_thresh(SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(PYRAMID_SCALE_FACTOR);
        detector.set_slide_window_step(WINDOW_STEP, WINDOW_STEP);

        // The cascade works on luma only.
        let gray = grayscale(rgb);
        let mut image = ImageData::new(gray.as_raw(), width, height);
        let faces = detector.detect(&mut image);

        let boxes: Vec<FaceBox> = faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                FaceBox::clamped(
                    bbox.x() as i64,
                    bbox.y() as i64,
                    bbox.width() as i64,
                    bbox.height() as i64,
                    width,
                    height,
                )
            })
            .collect();

        debug!(found = boxes.len(), "SeetaFace detection complete");
        Ok(boxes)
    }

    fn name(&self) -> &'static str {
        "seeta"
    }
}

impl std::fmt::Debug for SeetaFaceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeetaFaceLocator")
            .field("model_bytes", &self.model.len())
            .finish()
    }
}
