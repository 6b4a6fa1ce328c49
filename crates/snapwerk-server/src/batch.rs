// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch orchestration: decode → pipeline → encode for each upload, then zip.
//
// Uploads are processed strictly one after another. An upload that fails at
// any stage (unreadable bytes, face locator fault, encoder fault) is dropped
// with a warning and the batch carries on; only a batch with no survivors is
// an error.

use snapwerk_core::error::{Result, SnapwerkError};
use snapwerk_core::{ActionList, ProcessedItem};
use snapwerk_imaging::{ActionPipeline, ImageCodec};
use tracing::{debug, info, instrument, warn};

use crate::archive::ArchiveBuilder;

/// Stem used when an upload has no usable filename.
const FALLBACK_STEM: &str = "image";

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-side filename, possibly empty.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Runs uploads through the codec and pipeline and packages the results.
#[derive(Debug)]
pub struct BatchOrchestrator {
    pipeline: ActionPipeline,
    codec: ImageCodec,
}

impl BatchOrchestrator {
    pub fn new(pipeline: ActionPipeline, codec: ImageCodec) -> Self {
        Self { pipeline, codec }
    }

    pub fn pipeline(&self) -> &ActionPipeline {
        &self.pipeline
    }

    pub fn codec(&self) -> ImageCodec {
        self.codec
    }

    /// Decode, transform and re-encode a single image.
    pub fn process_one(&self, data: &[u8], actions: &ActionList) -> Result<Vec<u8>> {
        let raster = self.codec.decode(data)?;
        let raster = self.pipeline.apply(raster, actions)?;
        self.codec.encode(&raster)
    }

    /// Process every upload in order, dropping the ones that fail.
    ///
    /// Results are named `NNN_<stem>.jpg` after the upload's position, so
    /// names stay distinct even when clients send the same filename twice.
    /// Fails with `EmptyBatch` when nothing survives.
    #[instrument(skip_all, fields(uploads = uploads.len(), actions = %actions))]
    pub fn process_batch(&self, uploads: Vec<Upload>, actions: &ActionList) -> Result<Vec<ProcessedItem>> {
        let total = uploads.len();
        let mut items = Vec::with_capacity(total);

        for (index, upload) in uploads.into_iter().enumerate() {
            match self.process_one(&upload.bytes, actions) {
                Ok(jpeg) => {
                    let name = entry_name(index, &upload.filename);
                    debug!(index, entry = %name, bytes = jpeg.len(), "upload processed");
                    items.push(ProcessedItem::new(name, jpeg));
                }
                Err(e) => {
                    warn!(
                        index,
                        filename = %upload.filename,
                        error = %e,
                        "upload dropped from batch"
                    );
                }
            }
        }

        if items.is_empty() {
            return Err(SnapwerkError::EmptyBatch);
        }
        info!(processed = items.len(), dropped = total - items.len(), "batch complete");
        Ok(items)
    }

    /// Process the uploads and return the zip archive of the results.
    pub fn process_to_archive(&self, uploads: Vec<Upload>, actions: &ActionList) -> Result<Vec<u8>> {
        let items = self.process_batch(uploads, actions)?;
        let mut archive = ArchiveBuilder::new();
        for item in items {
            archive.push(item)?;
        }
        archive.finish()
    }
}

/// Archive entry name for the upload at `index`.
///
/// The stem is the filename's last path component without its extension,
/// with anything outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn entry_name(index: usize, filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { FALLBACK_STEM } else { &stem };
    format!("{index:03}_{stem}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use snapwerk_core::DEFAULT_ACTIONS;
    use snapwerk_imaging::{Raster, UnavailableLocator};
    use std::collections::HashSet;
    use std::io::Cursor;
    use zip::ZipArchive;

    fn orchestrator() -> BatchOrchestrator {
        let pipeline = ActionPipeline::new(Box::new(UnavailableLocator::new("no model in tests")));
        BatchOrchestrator::new(pipeline, ImageCodec::default())
    }

    fn jpeg(seed: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(24, 16, |x, y| {
            Rgb([(x as u8).wrapping_mul(seed), (y * 10) as u8, seed])
        });
        ImageCodec::default()
            .encode(&Raster::from_rgb(img))
            .expect("encode fixture")
    }

    #[test]
    fn corrupt_upload_is_dropped_from_archive() {
        let uploads = vec![
            Upload::new("first.jpg", jpeg(3)),
            Upload::new("broken.jpg", b"definitely not an image".to_vec()),
            Upload::new("second.jpg", jpeg(7)),
        ];
        let actions = ActionList::parse(DEFAULT_ACTIONS);

        let bytes = orchestrator()
            .process_to_archive(uploads, &actions)
            .expect("archive");
        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open zip");
        assert_eq!(archive.len(), 2);

        let names: HashSet<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains("000_first.jpg"));
        assert!(names.contains("002_second.jpg"));

        // Entries are JPEGs with the default (gray) output.
        let mut entry = Vec::new();
        std::io::Read::read_to_end(
            &mut archive.by_name("000_first.jpg").expect("entry"),
            &mut entry,
        )
        .expect("read");
        let decoded = ImageCodec::default().decode(&entry).expect("decode entry");
        assert_eq!(decoded.channels(), 1);
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }

    #[test]
    fn duplicate_filenames_get_distinct_entries() {
        let uploads = vec![
            Upload::new("same.jpg", jpeg(1)),
            Upload::new("same.jpg", jpeg(2)),
        ];
        let items = orchestrator()
            .process_batch(uploads, &ActionList::parse("blur"))
            .expect("batch");
        assert_eq!(items.len(), 2);
        assert_ne!(items[0].name, items[1].name);
    }

    #[test]
    fn all_corrupt_is_an_empty_batch() {
        let uploads = vec![
            Upload::new("a.jpg", vec![0u8; 10]),
            Upload::new("b.jpg", Vec::new()),
        ];
        let result = orchestrator().process_batch(uploads, &ActionList::parse("gray"));
        assert!(matches!(result, Err(SnapwerkError::EmptyBatch)));
    }

    #[test]
    fn no_uploads_is_an_empty_batch() {
        let result = orchestrator().process_to_archive(Vec::new(), &ActionList::parse("gray"));
        assert!(matches!(result, Err(SnapwerkError::EmptyBatch)));
    }

    #[test]
    fn locator_fault_drops_the_item() {
        let uploads = vec![Upload::new("face.jpg", jpeg(5))];
        let result = orchestrator().process_batch(uploads, &ActionList::parse("faces"));
        assert!(matches!(result, Err(SnapwerkError::EmptyBatch)));
    }

    #[test]
    fn color_actions_keep_three_channels() {
        let out = orchestrator()
            .process_one(&jpeg(9), &ActionList::parse("blur"))
            .expect("process");
        let decoded = ImageCodec::default().decode(&out).expect("decode");
        assert_eq!(decoded.channels(), 3);
    }

    #[test]
    fn entry_names() {
        assert_eq!(entry_name(0, "photo.jpg"), "000_photo.jpg");
        assert_eq!(entry_name(7, "scan.final.png"), "007_scan.final.jpg");
        assert_eq!(entry_name(12, "C:\\Users\\me\\IMG 01.jpeg"), "012_IMG_01.jpg");
        assert_eq!(entry_name(3, "../../etc/passwd"), "003_passwd.jpg");
        assert_eq!(entry_name(1, ""), "001_image.jpg");
        assert_eq!(entry_name(2, ".hidden"), "002_.hidden.jpg");
        assert_eq!(entry_name(1000, "x"), "1000_x.jpg");
    }
}
