// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// snapwerk-server — HTTP front end, batch orchestration, and result packaging
// for the Snapwerk image service. This crate bridges the pipeline in
// `snapwerk-imaging` to network clients: it parses multipart uploads, runs
// each image through the pipeline, and answers with a zip or a single JPEG.

pub mod archive;
pub mod batch;
pub mod http;
pub mod multipart;
pub mod server;
pub mod snapshot;

pub use archive::ArchiveBuilder;
pub use batch::{BatchOrchestrator, Upload};
pub use server::Server;
pub use snapshot::SnapshotStore;
