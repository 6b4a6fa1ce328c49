// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded on-disk retention of single-image results.
//
// Every result of `POST /process-image` is also written to the output
// directory as `snap_<local timestamp>.jpg`; after each write only the
// `keep` newest snapshots survive. Other files in the directory are never
// touched.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use snapwerk_core::error::{Result, SnapwerkError};
use tracing::{debug, info, instrument, warn};

const SNAPSHOT_PREFIX: &str = "snap_";
const SNAPSHOT_EXTENSION: &str = ".jpg";

/// Retention cache for processed snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    keep: usize,
}

impl SnapshotStore {
    /// Store writing into `root`, keeping at most `keep` snapshots (at least 1).
    pub fn new(root: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            root: root.into(),
            keep: keep.max(1),
        }
    }

    /// Directory the snapshots are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Write `jpeg` as a new snapshot, then prune old ones.
    ///
    /// A failing prune is logged and does not fail the save.
    #[instrument(skip_all, fields(root = %self.root.display(), bytes = jpeg.len()))]
    pub fn save(&self, jpeg: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            SnapwerkError::Snapshot(format!("create {}: {e}", self.root.display()))
        })?;

        let (path, mut file) = self.create_unique()?;
        file.write_all(jpeg)
            .map_err(|e| SnapwerkError::Snapshot(format!("write {}: {e}", path.display())))?;
        drop(file);
        info!(path = %path.display(), "snapshot saved");

        if let Err(e) = self.cleanup() {
            warn!(error = %e, "snapshot cleanup failed");
        }
        Ok(path)
    }

    /// Delete all but the `keep` newest snapshots. Returns how many were
    /// removed.
    pub fn cleanup(&self) -> Result<usize> {
        let mut snapshots = self.list()?;
        if snapshots.len() <= self.keep {
            return Ok(0);
        }

        // Newest first; equal timestamps fall back to the name, which
        // encodes the save time.
        snapshots.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        let mut removed = 0;
        for (path, _) in snapshots.into_iter().skip(self.keep) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "old snapshot removed");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove snapshot"),
            }
        }
        Ok(removed)
    }

    /// Snapshot files currently in the directory, with their modification
    /// times.
    pub fn list(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SnapwerkError::Snapshot(format!(
                    "read {}: {e}",
                    self.root.display()
                )));
            }
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_snapshot_name(name) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            snapshots.push((entry.path(), modified));
        }
        Ok(snapshots)
    }

    /// Create a new timestamped snapshot file. The name is claimed with
    /// `create_new`, so concurrent saves in the same millisecond never share
    /// a file; a taken name moves on to the next `_n` suffix.
    fn create_unique(&self) -> Result<(PathBuf, File)> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!("{SNAPSHOT_PREFIX}{stamp}");

        for n in 0u32.. {
            let name = match n {
                0 => format!("{base}{SNAPSHOT_EXTENSION}"),
                n => format!("{base}_{n}{SNAPSHOT_EXTENSION}"),
            };
            let path = self.root.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(SnapwerkError::Snapshot(format!(
                        "create {}: {e}",
                        path.display()
                    )));
                }
            }
        }
        Err(SnapwerkError::Snapshot(format!(
            "no free snapshot name for {base}"
        )))
    }
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_EXTENSION)
}
