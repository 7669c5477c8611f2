// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for frame delivery operations.
//!
//! Only genuine failures are represented here. Back-pressure (a fully claimed
//! slot pool, a full sequence buffer) is reported through ordinary return
//! values such as `Option` or [`crate::PushOutcome`], never through [`Error`].

use crate::render::StreamId;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when building or driving the frame pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pool, sequence buffer or configuration was given unusable parameters
    /// (zero slot size, zero depth, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A checked display was attempted while no frame was ready.
    #[error("Underrun - no frame available to display")]
    Underrun,

    /// A checked load was attempted while every slot still holds an
    /// undisplayed frame.
    #[error("Overrun - no slot available to load")]
    Overrun,

    /// The render coordinator was addressed with an id that was never
    /// registered (or has been removed).
    #[error("Unknown stream: {0}")]
    UnknownStream(StreamId),

    /// Failed to parse a JSON pipeline configuration.
    #[error("Parsing configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read a configuration file.
    #[error("Reading configuration: {0}")]
    Io(#[from] std::io::Error),
}
