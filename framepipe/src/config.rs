// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Pipeline configuration.
//!
//! A [`PipelineConfig`] describes how much frame memory a stream may hold and
//! how the render barrier treats streams that are about to finish. It can be
//! built in code or loaded from a JSON document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default payload size of one slot: a 1080p RGBA frame.
pub const DEFAULT_SLOT_SIZE: usize = 1920 * 1080 * 4;

/// Default number of slots per stream.
pub const DEFAULT_DEPTH: usize = 8;

/// Default distance from the end of a stream at which the render barrier
/// stops waiting for it.
pub const DEFAULT_EOS_MARGIN: u64 = 5;

/// Default number of frames kept buffered by [`crate::StreamBuffer::trim`].
pub const DEFAULT_LOOK_AHEAD: usize = 2;

/// Frame pipeline configuration.
///
/// Missing fields fall back to their defaults when deserialized.
///
/// # Examples
///
/// ```
/// use framepipe::config::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(r#"{"slot_size": 1024, "depth": 4}"#).unwrap();
/// assert_eq!(config.depth, 4);
/// assert_eq!(config.eos_margin, 5);
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Payload bytes per slot; must hold one decoded frame.
    pub slot_size: usize,
    /// Number of slots, and therefore the maximum number of frames buffered
    /// ahead of the consumer.
    pub depth: usize,
    /// A stream whose requested frame is within this many frames of its
    /// length no longer holds back the render barrier.
    pub eos_margin: u64,
    /// Frames retained when trimming the look-ahead after a seek.
    pub look_ahead: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slot_size: DEFAULT_SLOT_SIZE,
            depth: DEFAULT_DEPTH,
            eos_margin: DEFAULT_EOS_MARGIN,
            look_ahead: DEFAULT_LOOK_AHEAD,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - [`Error::InvalidConfiguration`] if a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Checks that every value can be used to build a stream.
    pub fn validate(&self) -> Result<()> {
        if self.slot_size == 0 {
            return Err(Error::InvalidConfiguration(
                "slot size must be positive".to_string(),
            ));
        }
        if self.depth == 0 {
            return Err(Error::InvalidConfiguration(
                "depth must be positive".to_string(),
            ));
        }
        if self.look_ahead > self.depth {
            return Err(Error::InvalidConfiguration(format!(
                "look-ahead {} cannot exceed depth {}",
                self.look_ahead, self.depth
            )));
        }
        Ok(())
    }
}
