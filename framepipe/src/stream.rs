// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Per-stream frame delivery.
//!
//! A [`StreamBuffer`] connects a [`FrameSlotPool`] and a [`FrameSequence`]
//! of the same depth:
//!
//! ```text
//!  decoder ──push_frame──► claim slot ──► copy ──► load ─┐
//!                                                        │ FrameSequence
//!  renderer ◄──present──── release slot ◄── done ◄── display ◄┘
//! ```
//!
//! The buffer also implements [`PlaybackStream`], so it can be registered
//! directly with a [`crate::RenderCoordinator`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::{
    FrameSequence, FrameSlotPool, PlaybackStream, Result, SlotClaim,
    config::PipelineConfig,
    status::{StatusEvent, StatusReporter, TracingReporter},
};

/// Result of offering a decoded frame to a [`StreamBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame was copied into a slot and queued for display.
    Queued,
    /// The sequence is full; the producer should retry after the consumer
    /// presents a frame.
    Full,
    /// No slot could be claimed; the frame was dropped.
    Dropped,
}

/// Zero-copy view of a frame being presented.
///
/// Borrowed from the slot it was decoded into; valid only inside the
/// [`StreamBuffer::present`] callback.
#[derive(Debug)]
pub struct FrameView<'a> {
    /// Position of the frame within its stream.
    pub frame_number: u64,
    /// Decoded frame bytes.
    pub payload: &'a [u8],
}

struct QueuedFrame {
    frame_number: u64,
    len: usize,
    claim: SlotClaim,
}

struct StreamState {
    sequence: FrameSequence<Option<QueuedFrame>>,
    /// Frame the producer should decode next.
    next_frame: u64,
    /// Bumped by every seek so that a presentation started before it does
    /// not advance the rewound cursors.
    epoch: u64,
}

impl StreamState {
    /// Frame number the consumer will see next, if one is buffered.
    ///
    /// A frame being presented right now is already taken out of its slot
    /// and is skipped.
    fn front_frame(&self) -> Option<u64> {
        let in_flight = u64::from(self.sequence.is_active());
        if self.sequence.available_display() as u64 <= in_flight {
            return None;
        }
        let slot = self.sequence.slot_of(self.sequence.display_cursor() + in_flight);
        self.sequence.elements()[slot]
            .as_ref()
            .map(|queued| queued.frame_number)
    }

    fn release_all(&mut self) {
        for element in self.sequence.elements_mut() {
            element.take();
        }
    }
}

/// Finishes the display started by [`StreamBuffer::present`], also when the
/// render closure unwinds.
struct DisplayGuard<'a> {
    stream: &'a StreamBuffer,
    epoch: u64,
}

impl Drop for DisplayGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.stream.lock_state();
        if state.epoch == self.epoch {
            state.sequence.done_display();
        } else {
            debug!("Stream was seeked during presentation");
        }
    }
}

/// Frame buffer for one video stream.
///
/// Safe to share between a decode thread and a render thread through `Arc`;
/// the sequence bookkeeping is guarded by a mutex while frame memory is
/// handed over through slot claims.
///
/// # Examples
///
/// ```
/// use framepipe::{PushOutcome, StreamBuffer, config::PipelineConfig};
///
/// # fn main() -> Result<(), framepipe::Error> {
/// let config = PipelineConfig { slot_size: 4, depth: 2, ..Default::default() };
/// let stream = StreamBuffer::new(&config, 100)?;
///
/// assert_eq!(stream.push_frame(0, &[1, 2, 3, 4]), PushOutcome::Queued);
/// let shown = stream.present(|frame| (frame.frame_number, frame.payload.to_vec()));
/// assert_eq!(shown, Some((0, vec![1, 2, 3, 4])));
/// # Ok(())
/// # }
/// ```
pub struct StreamBuffer {
    pool: FrameSlotPool,
    state: Mutex<StreamState>,
    length: u64,
    look_ahead: usize,
    reporter: Arc<dyn StatusReporter>,
}

impl StreamBuffer {
    /// Creates a buffer for a stream of `length` frames, reporting status
    /// through `tracing`.
    pub fn new(config: &PipelineConfig, length: u64) -> Result<Self> {
        Self::with_reporter(config, length, Arc::new(TracingReporter))
    }

    /// Creates a buffer that publishes status events to `reporter`.
    pub fn with_reporter(
        config: &PipelineConfig,
        length: u64,
        reporter: Arc<dyn StatusReporter>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = FrameSlotPool::new(config.slot_size, config.depth)?;
        let sequence = FrameSequence::with_depth(config.depth, || None)?;
        Ok(Self {
            pool,
            state: Mutex::new(StreamState {
                sequence,
                next_frame: 0,
                epoch: 0,
            }),
            length,
            look_ahead: config.look_ahead,
            reporter,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, StreamState> {
        // Cursor state stays consistent even if a render callback panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The slot pool backing this stream.
    pub fn pool(&self) -> &FrameSlotPool {
        &self.pool
    }

    /// Frame the producer should decode next.
    pub fn next_frame(&self) -> u64 {
        self.lock_state().next_frame
    }

    /// Frames decoded and waiting to be presented.
    pub fn buffered(&self) -> usize {
        self.lock_state().sequence.available_display()
    }

    /// Slots the producer may still fill.
    pub fn available_load(&self) -> usize {
        self.lock_state().sequence.available_load()
    }

    /// Returns `true` while a frame is being presented.
    pub fn is_active(&self) -> bool {
        self.lock_state().sequence.is_active()
    }

    /// Claims a free slot for the producer to decode into.
    ///
    /// The sequence lock is not taken, so the render thread keeps presenting
    /// while the frame is written. Returns `None` when every slot is in use.
    pub fn claim(&self) -> Option<SlotClaim> {
        self.pool.claim_slot()
    }

    /// Queues a frame that was decoded into `claim`, exposing its first `len`
    /// bytes to the consumer.
    ///
    /// The claim must come from [`Self::claim`]. A claim issued by another
    /// pool is released and the frame dropped. When the sequence is full the
    /// claim is released as well and [`PushOutcome::Full`] is returned.
    pub fn queue(&self, frame_number: u64, claim: SlotClaim, len: usize) -> PushOutcome {
        if !self.pool.issued(&claim) {
            self.reporter.report(StatusEvent::Warning(format!(
                "Dropped frame {frame_number}, slot {} belongs to another stream",
                claim.index()
            )));
            return PushOutcome::Dropped;
        }
        let slot_size = self.pool.slot_size();
        if len > slot_size {
            warn!("Frame {frame_number} is {len} bytes, truncating to slot size {slot_size}");
        }

        let mut state = self.lock_state();
        if state.sequence.available_load() == 0 {
            trace!("Stream full, frame {frame_number} not queued");
            return PushOutcome::Full;
        }
        *state.sequence.load() = Some(QueuedFrame {
            frame_number,
            len: len.min(slot_size),
            claim,
        });
        state.next_frame = frame_number + 1;
        trace!("Queued frame {frame_number}");
        PushOutcome::Queued
    }

    /// Copies a decoded frame into a free slot and queues it.
    ///
    /// Bytes beyond the slot size are discarded. Neither a full sequence nor
    /// an exhausted pool is an error; see [`PushOutcome`]. Decoders that can
    /// write in place should use [`Self::claim`] and [`Self::queue`] instead.
    pub fn push_frame(&self, frame_number: u64, bytes: &[u8]) -> PushOutcome {
        if self.available_load() == 0 {
            trace!("Stream full, frame {frame_number} not queued");
            return PushOutcome::Full;
        }

        let Some(mut claim) = self.claim() else {
            self.reporter.report(StatusEvent::Warning(format!(
                "Dropped frame {frame_number}, no free slot"
            )));
            return PushOutcome::Dropped;
        };

        let payload = claim.payload_mut();
        let len = bytes.len().min(payload.len());
        payload[..len].copy_from_slice(&bytes[..len]);
        self.queue(frame_number, claim, bytes.len())
    }

    /// Presents the next buffered frame.
    ///
    /// Runs `render` on the frame, then finishes the display and returns the
    /// frame's slot to the pool. The stream is not locked while `render`
    /// runs: the closure may query or feed the same stream, and
    /// [`Self::is_active`] reports `true` until it returns.
    ///
    /// Returns `None` without calling `render` when no frame is buffered or
    /// another presentation is still in progress.
    pub fn present<R>(&self, render: impl FnOnce(FrameView<'_>) -> R) -> Option<R> {
        let (queued, epoch) = {
            let mut state = self.lock_state();
            if state.sequence.available_display() == 0 || state.sequence.is_active() {
                return None;
            }
            let slot = state.sequence.next_display_slot();
            state.sequence.display();
            (state.sequence.elements_mut()[slot].take(), state.epoch)
        };
        let finish = DisplayGuard {
            stream: self,
            epoch,
        };

        let output = queued.as_ref().map(|queued| {
            render(FrameView {
                frame_number: queued.frame_number,
                payload: &queued.claim.payload()[..queued.len],
            })
        });

        drop(finish);
        if let Some(queued) = queued {
            trace!("Presented frame {}", queued.frame_number);
            self.pool.release_slot(queued.claim);
        }
        output
    }

    /// Discards all buffered frames and restarts decoding at `frame`.
    pub fn seek(&self, frame: u64) {
        let mut state = self.lock_state();
        state.sequence.reset();
        state.release_all();
        state.next_frame = frame;
        state.epoch += 1;
        debug!("Seeked to frame {frame}");
        self.reporter
            .report(StatusEvent::Success(format!("Seeked to frame {frame}")));
    }

    /// Caps the look-ahead to the configured amount, releasing the slots of
    /// discarded frames, and returns how many frames were discarded.
    ///
    /// Decoding resumes at the first discarded frame.
    pub fn trim(&self) -> usize {
        let mut state = self.lock_state();
        let before = state.sequence.load_cursor();
        // A frame being presented is not look-ahead.
        let count = self.look_ahead.max(1) + usize::from(state.sequence.is_active());
        let resume = state
            .sequence
            .trim(count)
            .as_ref()
            .map(|queued| queued.frame_number);
        let after = state.sequence.load_cursor();

        for index in after..before {
            let slot = state.sequence.slot_of(index);
            state.sequence.elements_mut()[slot].take();
        }
        if let Some(frame) = resume
            && after < before
        {
            state.next_frame = frame;
        }

        let discarded = (before - after) as usize;
        if discarded > 0 {
            debug!("Trimmed {discarded} frames, resuming at {}", state.next_frame);
        }
        discarded
    }
}

impl PlaybackStream for StreamBuffer {
    fn length(&self) -> u64 {
        self.length
    }

    fn can_play(&self) -> usize {
        self.buffered()
    }

    /// Seeks unless `frame` is already the next one to be presented.
    fn go_to_frame(&self, frame: u64) {
        {
            let state = self.lock_state();
            let positioned = match state.front_frame() {
                Some(front) => front == frame,
                None => state.next_frame == frame,
            };
            if positioned {
                return;
            }
        }
        self.seek(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingReporter(Mutex<Vec<StatusEvent>>);

    impl StatusReporter for RecordingReporter {
        fn report(&self, event: StatusEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn config(depth: usize) -> PipelineConfig {
        PipelineConfig {
            slot_size: 8,
            depth,
            eos_margin: 5,
            look_ahead: depth.min(2),
        }
    }

    #[test]
    fn frames_are_presented_in_order_and_slots_recycled() {
        let stream = StreamBuffer::new(&config(3), 100).unwrap();
        for frame in 0..3u64 {
            assert_eq!(stream.push_frame(frame, &[frame as u8; 8]), PushOutcome::Queued);
        }
        assert_eq!(stream.push_frame(3, &[3; 8]), PushOutcome::Full);
        assert_eq!(stream.pool().claimed_count(), 3);

        let first = stream.present(|frame| (frame.frame_number, frame.payload[0]));
        assert_eq!(first, Some((0, 0)));
        assert_eq!(stream.pool().claimed_count(), 2);
        assert!(!stream.is_active());

        assert_eq!(stream.push_frame(3, &[3; 8]), PushOutcome::Queued);
        let rest: Vec<u64> = std::iter::from_fn(|| stream.present(|frame| frame.frame_number))
            .collect();
        assert_eq!(rest, vec![1, 2, 3]);
        assert_eq!(stream.pool().claimed_count(), 0);
    }

    #[test]
    fn exhausted_pool_drops_frame_and_reports_it() {
        let reporter = Arc::new(RecordingReporter::default());
        let stream = StreamBuffer::with_reporter(&config(1), 100, reporter.clone()).unwrap();
        let _held = stream.pool().claim_slot().unwrap();

        assert_eq!(stream.push_frame(0, &[0; 8]), PushOutcome::Dropped);
        assert_eq!(stream.buffered(), 0);
        let events = reporter.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_warning());
    }

    #[test]
    fn decoder_writes_directly_into_claimed_slot() {
        let stream = StreamBuffer::new(&config(2), 100).unwrap();
        let mut claim = stream.claim().unwrap();
        claim.payload_mut()[..3].copy_from_slice(&[7, 8, 9]);
        let address = claim.payload().as_ptr();

        assert_eq!(stream.queue(0, claim, 3), PushOutcome::Queued);
        assert_eq!(stream.next_frame(), 1);
        let shown = stream.present(|frame| (frame.payload.as_ptr(), frame.payload.to_vec()));
        assert_eq!(shown, Some((address, vec![7, 8, 9])));
        assert_eq!(stream.pool().claimed_count(), 0);
    }

    #[test]
    fn claims_from_another_pool_are_refused() {
        let reporter = Arc::new(RecordingReporter::default());
        let stream = StreamBuffer::with_reporter(&config(2), 100, reporter.clone()).unwrap();
        let other = FrameSlotPool::new(8, 1).unwrap();

        let claim = other.claim_slot().unwrap();
        assert_eq!(stream.queue(0, claim, 8), PushOutcome::Dropped);
        assert_eq!(other.claimed_count(), 0);
        assert_eq!(stream.buffered(), 0);
        assert!(reporter.0.lock().unwrap()[0].is_warning());
    }

    #[test]
    fn render_closure_can_query_its_own_stream() {
        let stream = StreamBuffer::new(&config(2), 100).unwrap();
        stream.push_frame(0, &[0; 8]);

        let seen = stream.present(|_| {
            let nested = stream.present(|frame| frame.frame_number);
            (stream.is_active(), stream.buffered(), stream.next_frame(), nested)
        });
        assert_eq!(seen, Some((true, 1, 1, None)));
        assert!(!stream.is_active());
        assert_eq!(stream.buffered(), 0);
    }

    #[test]
    fn producer_may_queue_during_presentation() {
        let stream = StreamBuffer::new(&config(2), 100).unwrap();
        stream.push_frame(0, &[0; 8]);

        let pushed = stream.present(|_| stream.push_frame(1, &[1; 8]));
        assert_eq!(pushed, Some(PushOutcome::Queued));
        assert_eq!(stream.present(|frame| frame.payload[0]), Some(1));
        assert_eq!(stream.pool().claimed_count(), 0);
    }

    #[test]
    fn seek_during_presentation_keeps_new_position() {
        let stream = StreamBuffer::new(&config(3), 100).unwrap();
        stream.push_frame(0, &[0; 8]);
        stream.push_frame(1, &[0; 8]);

        stream.present(|_| stream.seek(7));
        assert!(!stream.is_active());
        assert_eq!(stream.buffered(), 0);
        assert_eq!(stream.next_frame(), 7);
        assert_eq!(stream.pool().claimed_count(), 0);

        stream.push_frame(7, &[0; 8]);
        assert_eq!(stream.present(|frame| frame.frame_number), Some(7));
    }

    #[test]
    fn trim_during_presentation_keeps_the_presented_frame() {
        let mut config = config(4);
        config.look_ahead = 1;
        let stream = StreamBuffer::new(&config, 100).unwrap();
        for frame in 0..3 {
            stream.push_frame(frame, &[0; 8]);
        }

        let discarded = stream.present(|_| stream.trim());
        assert_eq!(discarded, Some(2));
        assert_eq!(stream.next_frame(), 1);
        assert_eq!(stream.buffered(), 0);
        assert_eq!(stream.pool().claimed_count(), 0);
    }

    #[test]
    fn panicking_render_finishes_the_display() {
        let stream = StreamBuffer::new(&config(2), 100).unwrap();
        stream.push_frame(0, &[0; 8]);
        stream.push_frame(1, &[0; 8]);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            stream.present(|_| -> u64 { panic!("render failed") })
        }));
        assert!(result.is_err());
        assert!(!stream.is_active());
        assert_eq!(stream.buffered(), 1);
        assert_eq!(stream.pool().claimed_count(), 1);
        assert_eq!(stream.present(|frame| frame.frame_number), Some(1));
    }

    #[test]
    fn short_frames_expose_only_written_bytes() {
        let stream = StreamBuffer::new(&config(2), 100).unwrap();
        stream.push_frame(0, &[9, 9]);
        assert_eq!(stream.present(|frame| frame.payload.len()), Some(2));
        assert_eq!(stream.present(|frame| frame.payload.len()), None);
    }

    #[test]
    fn seek_releases_everything() {
        let stream = StreamBuffer::new(&config(4), 100).unwrap();
        for frame in 0..4 {
            stream.push_frame(frame, &[0; 8]);
        }
        stream.seek(40);
        assert_eq!(stream.buffered(), 0);
        assert_eq!(stream.pool().claimed_count(), 0);
        assert_eq!(stream.next_frame(), 40);
    }

    #[test]
    fn trim_resumes_at_first_discarded_frame() {
        let stream = StreamBuffer::new(&config(6), 100).unwrap();
        for frame in 10..15 {
            stream.push_frame(frame, &[0; 8]);
        }
        assert_eq!(stream.trim(), 4);
        assert_eq!(stream.buffered(), 1);
        assert_eq!(stream.pool().claimed_count(), 1);
        assert_eq!(stream.next_frame(), 11);
        assert_eq!(stream.present(|frame| frame.frame_number), Some(10));
    }

    #[test]
    fn go_to_current_frame_keeps_buffer() {
        let stream = StreamBuffer::new(&config(4), 100).unwrap();
        stream.push_frame(5, &[0; 8]);
        stream.push_frame(6, &[0; 8]);

        stream.go_to_frame(5);
        assert_eq!(stream.can_play(), 2);

        stream.go_to_frame(20);
        assert_eq!(stream.can_play(), 0);
        assert_eq!(stream.next_frame(), 20);
    }
}
