// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # framepipe - video frame delivery
//!
//! Hands decoded video frames from a producer (decode path) to a consumer
//! (display path) without copying, and presents several streams in lockstep.
//!
//! ## Overview
//!
//! ### Key Concepts
//!
//! - **Slot**: A fixed-size memory region guarded by an atomic claim word ([`FrameSlotPool`])
//! - **Claim**: Exclusive ownership of one slot, movable across threads ([`SlotClaim`])
//! - **Sequence**: Circular load/display cursors over a fixed set of slots ([`FrameSequence`])
//! - **Stream**: Pool plus sequence for one video ([`StreamBuffer`])
//! - **Barrier**: One refresh tick once every stream has a frame ready ([`RenderCoordinator`])
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ RenderCoordinator│  (one per presentation surface)
//! └────────┬─────────┘
//!          │ can_play / go_to_frame
//!          ├─► StreamBuffer ──► FrameSequence<slot>
//!          │                └─► FrameSlotPool ──► SlotClaim
//!          │
//!          └─► StreamBuffer ──► ...
//! ```
//!
//! ## Examples
//!
//! ### Decoding and presenting one stream
//!
//! ```
//! use framepipe::{PushOutcome, StreamBuffer, config::PipelineConfig};
//!
//! # fn main() -> Result<(), framepipe::Error> {
//! let config = PipelineConfig { slot_size: 16, depth: 4, ..Default::default() };
//! let stream = StreamBuffer::new(&config, 300)?;
//!
//! // Producer: decode until the buffer pushes back.
//! let mut frame = stream.next_frame();
//! while stream.push_frame(frame, &[0u8; 16]) == PushOutcome::Queued {
//!     frame += 1;
//! }
//! assert_eq!(stream.buffered(), 4);
//!
//! // Consumer: present one frame, which frees its slot.
//! let shown = stream.present(|view| view.frame_number);
//! assert_eq!(shown, Some(0));
//! # Ok(())
//! # }
//! ```
//!
//! ### Presenting streams in lockstep
//!
//! ```
//! use std::sync::Arc;
//! use framepipe::{ManualScheduler, RenderCoordinator, StreamBuffer, StreamId};
//! use framepipe::config::PipelineConfig;
//!
//! # fn main() -> Result<(), framepipe::Error> {
//! let config = PipelineConfig { slot_size: 16, depth: 4, ..Default::default() };
//! let mut coordinator = RenderCoordinator::new(ManualScheduler::default());
//!
//! let left = Arc::new(StreamBuffer::new(&config, 300)?);
//! let right = Arc::new(StreamBuffer::new(&config, 300)?);
//! let (left_id, right_id) = (StreamId::new(), StreamId::new());
//! coordinator.add_stream(left_id, left.clone());
//! coordinator.add_stream(right_id, right.clone());
//!
//! left.push_frame(0, &[0; 16]);
//! right.push_frame(0, &[0; 16]);
//!
//! let stream = left.clone();
//! coordinator.notify_ready(left_id, move || {
//!     stream.present(|_view| ());
//! })?;
//! let stream = right.clone();
//! coordinator.notify_ready(right_id, move || {
//!     stream.present(|_view| ());
//! })?;
//!
//! let tick = coordinator.scheduler_mut().next_due().expect("both streams ready");
//! assert_eq!(coordinator.on_refresh(tick), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - [`FrameSlotPool`] is `Send + Sync`; claims are lock-free
//! - [`SlotClaim`] is `Send` and carries slot ownership from producer to consumer
//! - [`StreamBuffer`] is `Send + Sync` and may be shared between a decode and a render thread
//! - [`FrameSequence`] and [`RenderCoordinator`] are single-threaded (`&mut self`)
//!
//! ## Back-pressure
//!
//! A fully claimed pool or a full sequence is not an error. It is reported as
//! `None` from [`FrameSlotPool::claim_slot`] or as [`PushOutcome::Full`] /
//! [`PushOutcome::Dropped`], and the caller decides whether to retry or drop.

mod error;
mod sequence;
mod slot;
mod stream;

pub mod config;
pub mod render;
pub mod status;

pub use error::{Error, Result};
pub use render::{
    ManualScheduler, PlaybackStream, RefreshScheduler, RenderCoordinator, StreamId, Tick,
    coordinator::DrawCallback,
};
pub use sequence::{DisplayState, FrameSequence};
pub use slot::{
    claim::SlotClaim,
    pool::{CONTROL_HEADER_SIZE, FrameSlotPool},
};
pub use stream::{FrameView, PushOutcome, StreamBuffer};
