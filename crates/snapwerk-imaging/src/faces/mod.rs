// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Face location and annotation.
//
// Face location is a pluggable capability behind the `FaceLocator` trait.
// The SeetaFace backend (`seeta` feature, on by default) needs a model file
// at runtime; when it is missing the service falls back to
// `UnavailableLocator`, so only requests asking for `faces` are affected.

#[cfg(feature = "seeta")]
pub mod seeta;

use std::path::Path;

use image::RgbImage;
use snapwerk_core::FaceBox;
use snapwerk_core::error::{Result, SnapwerkError};
use tracing::{debug, instrument, warn};

use crate::draw::DashedBoxRenderer;
use crate::raster::Raster;

#[cfg(feature = "seeta")]
pub use seeta::SeetaFaceLocator;

/// Something that finds faces in an RGB image.
pub trait FaceLocator: Send + Sync {
    /// Return the face regions found in `rgb`, clipped to its bounds.
    fn locate(&self, rgb: &RgbImage) -> Result<Vec<FaceBox>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Locator used when no detection backend could be loaded. Every call fails
/// with `ModelUnavailable`.
#[derive(Debug, Clone)]
pub struct UnavailableLocator {
    reason: String,
}

impl UnavailableLocator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FaceLocator for UnavailableLocator {
    fn locate(&self, _rgb: &RgbImage) -> Result<Vec<FaceBox>> {
        Err(SnapwerkError::ModelUnavailable(self.reason.clone()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Best locator this build can offer for the model at `model_path`.
///
/// Falls back to an `UnavailableLocator` carrying the reason when the model
/// cannot be loaded or the `seeta` backend is not compiled in.
pub fn locator_from_model(model_path: &Path) -> Box<dyn FaceLocator> {
    #[cfg(feature = "seeta")]
    {
        match SeetaFaceLocator::from_path(model_path) {
            Ok(locator) => Box::new(locator),
            Err(e) => {
                warn!(error = %e, "face detection disabled");
                Box::new(UnavailableLocator::new(e.to_string()))
            }
        }
    }

    #[cfg(not(feature = "seeta"))]
    {
        warn!(
            path = %model_path.display(),
            "built without the `seeta` feature; face detection disabled"
        );
        Box::new(UnavailableLocator::new(
            "this build has no face detection backend",
        ))
    }
}

/// Find faces and outline each with a dashed box.
///
/// Location always runs on an RGB-ordered copy. Drawing happens on the
/// raster itself: a gray raster is first promoted to three channels so the
/// colored outline shows, a color raster keeps its channel order. The
/// returned raster is the annotated one, never the RGB copy.
#[instrument(skip_all, fields(locator = locator.name(), width = raster.width(), height = raster.height(), channels = raster.channels()))]
pub fn annotate_faces(
    raster: Raster,
    locator: &dyn FaceLocator,
    renderer: &DashedBoxRenderer,
) -> Result<Raster> {
    let rgb = raster.to_rgb_image();
    let faces = locator.locate(&rgb)?;
    drop(rgb);

    let mut annotated = raster.into_color();
    let mut segments = 0;
    for face in &faces {
        let (top_left, bottom_right) = face.corners();
        segments += renderer.draw(&mut annotated, top_left, bottom_right);
    }

    debug!(faces = faces.len(), segments, "Faces annotated");
    Ok(annotated)
}
