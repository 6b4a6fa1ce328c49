// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Settings come from an optional JSON file (path in `SNAPWERK_CONFIG`),
// followed by individual environment overrides. Missing fields take their
// defaults, so an empty `{}` file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SnapwerkError};
use crate::types::{ActionList, DEFAULT_ACTIONS};

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV: &str = "SNAPWERK_CONFIG";

/// Environment override for [`AppConfig::port`].
pub const PORT_ENV: &str = "SNAPWERK_PORT";

/// Environment override for [`AppConfig::output_dir`].
pub const OUTPUT_DIR_ENV: &str = "SNAPWERK_OUTPUT_DIR";

/// Well-known filename of the SeetaFace frontal detection model.
pub const FACE_MODEL_FILENAME: &str = "seeta_fd_frontal_v1.0.bin";

/// Runtime settings for the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interface the HTTP server binds to.
    pub bind_address: String,
    /// HTTP port (default 5005).
    pub port: u16,
    /// Action list used when a request does not carry `actions`.
    pub default_actions: String,
    /// JPEG quality for encoded results (1-100).
    pub jpeg_quality: u8,
    /// Directory receiving retained single-image snapshots.
    pub output_dir: PathBuf,
    /// Number of newest snapshots kept after each save.
    pub snapshot_keep: usize,
    /// Upper bound on a request (headers + body) in bytes.
    pub max_request_bytes: usize,
    /// SeetaFace model file. `None` selects the default data directory.
    pub face_model_path: Option<PathBuf>,
    /// Tunables of the enhancement actions.
    pub enhance: EnhanceConfig,
}

/// Parameters of the `denoise` and `clahe` actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Non-local-means filter strength `h`.
    pub denoise_strength: f32,
    /// Patch radius (3 gives a 7x7 template).
    pub denoise_patch_radius: u32,
    /// Search radius (5 gives an 11x11 window).
    pub denoise_search_radius: u32,
    /// CLAHE clip limit, relative to a uniform histogram.
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per side.
    pub clahe_grid: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            denoise_strength: 10.0,
            denoise_patch_radius: 3,
            denoise_search_radius: 5,
            clahe_clip_limit: 2.0,
            clahe_grid: 8,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 5005,
            default_actions: DEFAULT_ACTIONS.into(),
            jpeg_quality: 95,
            output_dir: PathBuf::from("processed"),
            snapshot_keep: 5,
            max_request_bytes: 64 * 1024 * 1024,
            face_model_path: None,
            enhance: EnhanceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolve configuration from the process environment: the file named by
    /// `SNAPWERK_CONFIG` if set (defaults otherwise), then the port and output
    /// directory overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path))?,
            None => {
                debug!("no config file named; using defaults");
                Self::default()
            }
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| SnapwerkError::Config(format!("{PORT_ENV}={port}: {e}")))?;
        }
        if let Some(dir) = std::env::var_os(OUTPUT_DIR_ENV) {
            config.output_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(SnapwerkError::Config("port must be non-zero".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SnapwerkError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.snapshot_keep == 0 {
            return Err(SnapwerkError::Config(
                "snapshot_keep must be at least 1".into(),
            ));
        }

        let enhance = &self.enhance;
        if !(enhance.denoise_strength.is_finite() && enhance.denoise_strength > 0.0) {
            return Err(SnapwerkError::Config(format!(
                "enhance.denoise_strength must be positive, got {}",
                enhance.denoise_strength
            )));
        }
        if !(enhance.clahe_clip_limit.is_finite() && enhance.clahe_clip_limit > 0.0) {
            return Err(SnapwerkError::Config(format!(
                "enhance.clahe_clip_limit must be positive, got {}",
                enhance.clahe_clip_limit
            )));
        }
        if enhance.clahe_grid == 0 {
            return Err(SnapwerkError::Config("enhance.clahe_grid must be at least 1".into()));
        }
        Ok(())
    }

    /// Parsed form of [`default_actions`](Self::default_actions).
    pub fn default_action_list(&self) -> ActionList {
        ActionList::parse(&self.default_actions)
    }

    /// Model path to load, falling back to the default data directory.
    pub fn resolved_face_model_path(&self) -> PathBuf {
        self.face_model_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join(FACE_MODEL_FILENAME))
    }
}

/// `$XDG_DATA_HOME/snapwerk`, falling back to `~/.local/share/snapwerk`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("snapwerk");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("snapwerk");
    }
    PathBuf::from("snapwerk-data")
}
