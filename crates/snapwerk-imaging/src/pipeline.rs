// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Action pipeline — applies the actions selected by an `ActionList` to one
// raster, in the fixed order gray, equalize, denoise, clahe, blur, faces.
//
// Channel bookkeeping per action:
//
//   gray      3 → 1 (1 stays 1)
//   equalize  → 1 (color input is reduced to luma first)
//   denoise   → 1 (color input is reduced to luma first)
//   clahe     → 1 (color input is reduced to luma first)
//   blur      unchanged
//   faces     1 → 3 (3 stays 3, order kept)

use snapwerk_core::error::Result;
use snapwerk_core::{Action, ActionList, EnhanceConfig};
use tracing::{debug, info, instrument};

use crate::draw::DashedBoxRenderer;
use crate::enhance::{clahe, denoise, equalize, gaussian_blur_3x3, histogram};
use crate::faces::{FaceLocator, annotate_faces};
use crate::raster::Raster;

/// Tunables of the enhancement actions. The defaults are the values the
/// service runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    pub denoise_strength: f32,
    pub denoise_patch_radius: u32,
    pub denoise_search_radius: u32,
    pub clahe_clip_limit: f32,
    pub clahe_grid: u32,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            denoise_strength: denoise::DENOISE_STRENGTH,
            denoise_patch_radius: denoise::PATCH_RADIUS,
            denoise_search_radius: denoise::SEARCH_RADIUS,
            clahe_clip_limit: histogram::CLAHE_CLIP_LIMIT,
            clahe_grid: histogram::CLAHE_GRID,
        }
    }
}

impl PipelineParams {
    pub fn from_config(enhance: &EnhanceConfig) -> Self {
        Self {
            denoise_strength: enhance.denoise_strength,
            denoise_patch_radius: enhance.denoise_patch_radius,
            denoise_search_radius: enhance.denoise_search_radius,
            clahe_clip_limit: enhance.clahe_clip_limit,
            clahe_grid: enhance.clahe_grid,
        }
    }
}

/// Applies action lists to rasters.
///
/// The pipeline itself is immutable and can be shared between request
/// tasks; each `apply` call exclusively owns the raster it transforms.
pub struct ActionPipeline {
    locator: Box<dyn FaceLocator>,
    renderer: DashedBoxRenderer,
    params: PipelineParams,
}

impl ActionPipeline {
    /// Pipeline with default parameters and box style.
    pub fn new(locator: Box<dyn FaceLocator>) -> Self {
        Self {
            locator,
            renderer: DashedBoxRenderer::default(),
            params: PipelineParams::default(),
        }
    }

    pub fn with_params(mut self, params: PipelineParams) -> Self {
        self.params = params;
        self
    }

    pub fn locator_name(&self) -> &'static str {
        self.locator.name()
    }

    /// Apply every selected action in evaluation order; each sees the
    /// previous output.
    ///
    /// An empty list returns the raster untouched. A failing action aborts
    /// the whole call, so callers never see a partially processed raster.
    #[instrument(skip_all, fields(actions = %actions, width = raster.width(), height = raster.height()))]
    pub fn apply(&self, raster: Raster, actions: &ActionList) -> Result<Raster> {
        let mut raster = raster;
        for action in actions.iter() {
            raster = self.apply_one(raster, action)?;
        }
        info!(channels = raster.channels(), "Pipeline complete");
        Ok(raster)
    }

    /// Apply a single action.
    pub fn apply_one(&self, raster: Raster, action: Action) -> Result<Raster> {
        let channels_in = raster.channels();
        let out = match action {
            Action::Gray => raster.into_gray(),
            Action::Equalize => Raster::Gray(equalize(&single_channel(raster, action))),
            Action::Denoise => Raster::Gray(denoise::non_local_means(
                &single_channel(raster, action),
                self.params.denoise_strength,
                self.params.denoise_patch_radius,
                self.params.denoise_search_radius,
            )),
            Action::Clahe => Raster::Gray(clahe(
                &single_channel(raster, action),
                self.params.clahe_clip_limit,
                self.params.clahe_grid,
            )),
            Action::Blur => match raster {
                Raster::Gray(img) => Raster::Gray(gaussian_blur_3x3(&img)),
                Raster::Color { pixels, order } => Raster::Color {
                    pixels: gaussian_blur_3x3(&pixels),
                    order,
                },
            },
            Action::Faces => annotate_faces(raster, self.locator.as_ref(), &self.renderer)?,
        };
        debug!(
            %action,
            channels_in,
            channels_out = out.channels(),
            "Action applied"
        );
        Ok(out)
    }
}

/// Luma buffer for actions that only work on one channel. Color input is
/// reduced exactly as the `gray` action would.
fn single_channel(raster: Raster, action: Action) -> image::GrayImage {
    if !raster.is_gray() {
        debug!(%action, "Reducing color raster to luma before single-channel action");
    }
    raster.into_gray_image()
}

impl std::fmt::Debug for ActionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionPipeline")
            .field("locator", &self.locator.name())
            .field("renderer", &self.renderer)
            .field("params", &self.params)
            .finish()
    }
}
