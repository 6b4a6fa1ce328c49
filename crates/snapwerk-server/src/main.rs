// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Snapwerk — image enhancement and face annotation over HTTP.
//
// Entry point. Initialises logging, loads configuration, picks the face
// locator backend, and serves until Ctrl-C.

use std::process::ExitCode;

use snapwerk_core::AppConfig;
use snapwerk_core::error::Result;
use snapwerk_imaging::{ActionPipeline, ImageCodec, PipelineParams, locator_from_model};
use snapwerk_server::{BatchOrchestrator, Server};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Snapwerk starting");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Snapwerk exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;

    let locator = locator_from_model(&config.resolved_face_model_path());
    let pipeline =
        ActionPipeline::new(locator).with_params(PipelineParams::from_config(&config.enhance));
    let orchestrator = BatchOrchestrator::new(pipeline, ImageCodec::new(config.jpeg_quality));

    let mut server = Server::new(&config, orchestrator)?;
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    server.stop().await
}
