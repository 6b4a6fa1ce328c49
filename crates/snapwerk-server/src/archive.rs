// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory zip packaging of processed results.

use std::io::{Cursor, Write};

use snapwerk_core::ProcessedItem;
use snapwerk_core::error::{Result, SnapwerkError};
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Append-only zip accumulator. Items are moved in and written immediately,
/// so the builder never holds more than the compressed archive.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            entries: 0,
        }
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Write `item` as a new entry named `item.name`.
    pub fn push(&mut self, item: ProcessedItem) -> Result<()> {
        let ProcessedItem { name, bytes } = item;
        self.writer
            .start_file(name.as_str(), self.options)
            .map_err(|e| SnapwerkError::Archive(format!("start entry {name}: {e}")))?;
        self.writer
            .write_all(&bytes)
            .map_err(|e| SnapwerkError::Archive(format!("write entry {name}: {e}")))?;
        self.entries += 1;
        debug!(entry = %name, bytes = bytes.len(), "archive entry written");
        Ok(())
    }

    /// Write the central directory and return the finished archive.
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| SnapwerkError::Archive(format!("finish archive: {e}")))?;
        Ok(cursor.into_inner())
    }
}

impl std::fmt::Debug for ArchiveBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveBuilder")
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn entries_round_trip() {
        let mut builder = ArchiveBuilder::new();
        builder
            .push(ProcessedItem::new("000_a.jpg", b"first".to_vec()))
            .expect("push");
        builder
            .push(ProcessedItem::new("001_b.jpg", vec![7u8; 4096]))
            .expect("push");
        assert_eq!(builder.len(), 2);

        let bytes = builder.finish().expect("finish");
        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open zip");
        assert_eq!(archive.len(), 2);

        let mut first = String::new();
        archive
            .by_name("000_a.jpg")
            .expect("entry")
            .read_to_string(&mut first)
            .expect("read");
        assert_eq!(first, "first");

        let mut second = Vec::new();
        archive
            .by_name("001_b.jpg")
            .expect("entry")
            .read_to_end(&mut second)
            .expect("read");
        assert_eq!(second, vec![7u8; 4096]);
    }

    #[test]
    fn empty_archive_is_still_valid() {
        let builder = ArchiveBuilder::new();
        assert!(builder.is_empty());
        let bytes = builder.finish().expect("finish");
        let archive = ZipArchive::new(Cursor::new(bytes)).expect("open zip");
        assert_eq!(archive.len(), 0);
    }
}
