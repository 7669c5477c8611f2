// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Multi-stream render synchronization.
//!
//! Several independently decoding streams are presented together: the
//! [`RenderCoordinator`] acts as a barrier and only schedules a refresh tick
//! once every registered stream has a frame ready, then runs each stream's
//! draw callback on that single tick.
//!
//! # Key Types
//!
//! - [`RenderCoordinator`]: The barrier itself
//! - [`PlaybackStream`]: What the barrier needs to know about a stream
//! - [`RefreshScheduler`]: The display refresh clock the barrier schedules on
//! - [`StreamId`]: Identity of a registered stream

pub mod coordinator;
pub mod scheduler;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use coordinator::RenderCoordinator;
pub use scheduler::{ManualScheduler, RefreshScheduler, Tick};

/// Identity of a stream registered with a [`RenderCoordinator`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Generates a new random stream id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for StreamId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A decoding stream as seen by the render barrier.
///
/// Implementations are shared with the coordinator through `Arc`, so all
/// methods take `&self`; use interior mutability for seeking.
pub trait PlaybackStream: Send + Sync {
    /// Total number of frames in the stream.
    fn length(&self) -> u64;

    /// Number of decoded frames ready to be displayed.
    fn can_play(&self) -> usize;

    /// Repositions the stream so that `frame` is the next one decoded.
    fn go_to_frame(&self, frame: u64);
}
