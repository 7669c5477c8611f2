// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Status reporting for pipeline components.
//!
//! Components never publish status through global state. Whoever builds a
//! component hands it a [`StatusReporter`], typically one shared instance
//! created at the application root.

use std::fmt;

use tracing::{info, warn};

/// A status change worth surfacing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Something completed normally (a seek, a stream becoming ready).
    Success(String),
    /// Something degraded playback (a dropped frame).
    Warning(String),
}

impl StatusEvent {
    /// The human-readable message carried by the event.
    pub fn message(&self) -> &str {
        match self {
            StatusEvent::Success(message) | StatusEvent::Warning(message) => message,
        }
    }

    /// Returns `true` for [`StatusEvent::Warning`].
    pub fn is_warning(&self) -> bool {
        matches!(self, StatusEvent::Warning(_))
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Success(message) => write!(f, "success: {message}"),
            StatusEvent::Warning(message) => write!(f, "warning: {message}"),
        }
    }
}

/// Sink for [`StatusEvent`]s.
pub trait StatusReporter: Send + Sync {
    /// Publishes one event.
    fn report(&self, event: StatusEvent);
}

/// Reporter that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report(&self, event: StatusEvent) {
        match event {
            StatusEvent::Success(message) => info!(status = "success", "{message}"),
            StatusEvent::Warning(message) => warn!(status = "warning", "{message}"),
        }
    }
}
