// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Common utilities shared across examples.

use std::path::Path;

use framepipe::config::PipelineConfig;

/// Initializes tracing subscriber for examples.
///
/// Logs to stdout at INFO unless `RUST_LOG` asks for something else.
pub fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_thread_names(true)
        .init();
}

/// Loads the pipeline configuration from `path`, or the defaults when no
/// path was given.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, framepipe::Error> {
    match path {
        Some(path) => PipelineConfig::from_path(path),
        None => Ok(PipelineConfig::default()),
    }
}
