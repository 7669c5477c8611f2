// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-depth circular sequencing of frame slots.
//!
//! [`FrameSequence`] orders a bounded, reusable set of elements between one
//! producer and one consumer. It tracks two monotonic cursors: how many frames
//! have ever been loaded and how many have ever been displayed. The element
//! for absolute index `i` lives at `i % depth`.
//!
//! ```text
//!            display_cursor          load_cursor
//!                  │                      │
//!   ... shown ...  ▼  ready to display    ▼  free to load ...
//!                  └── available_display ─┘
//! ```
//!
//! The unchecked [`FrameSequence::load`] and [`FrameSequence::display`] trust
//! the caller to have polled [`FrameSequence::available_load`] and
//! [`FrameSequence::available_display`] first. The `try_*` variants perform
//! that check and fail with [`Error::Underrun`] or [`Error::Overrun`].

use tracing::{trace, warn};

use crate::{Error, Result};

/// Whether the consumer currently holds a displayed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// No display in flight.
    Idle,
    /// An element was returned by `display` and `done_display` has not been
    /// called yet.
    Displaying,
    /// Like [`DisplayState::Displaying`], but an overrunning `load` has
    /// already moved the display cursor past the element being shown.
    Overtaken,
}

/// Circular frame sequence over `depth` elements.
///
/// # Examples
///
/// ```
/// use framepipe::FrameSequence;
///
/// let mut sequence = FrameSequence::new(vec![0u64; 4]).unwrap();
/// for frame in 10..14 {
///     *sequence.load() = frame;
/// }
/// assert_eq!(sequence.available_load(), 0);
///
/// assert_eq!(*sequence.display(), 10);
/// sequence.done_display();
/// assert_eq!(sequence.available_load(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FrameSequence<T> {
    elements: Vec<T>,
    load_cursor: u64,
    display_cursor: u64,
    state: DisplayState,
}

impl<T> FrameSequence<T> {
    /// Creates a sequence over the given elements; depth is `elements.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `elements` is empty.
    pub fn new(elements: Vec<T>) -> Result<Self> {
        if elements.is_empty() {
            return Err(Error::InvalidConfiguration(
                "sequence depth must be positive".to_string(),
            ));
        }
        Ok(Self {
            elements,
            load_cursor: 0,
            display_cursor: 0,
            state: DisplayState::Idle,
        })
    }

    /// Creates a sequence of `depth` elements built by `make`.
    pub fn with_depth(depth: usize, make: impl FnMut() -> T) -> Result<Self> {
        Self::new(std::iter::repeat_with(make).take(depth).collect())
    }

    /// Number of element slots.
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// Absolute count of frames ever loaded.
    pub fn load_cursor(&self) -> u64 {
        self.load_cursor
    }

    /// Absolute count of frames ever displayed.
    pub fn display_cursor(&self) -> u64 {
        self.display_cursor
    }

    /// Current display state.
    pub fn state(&self) -> DisplayState {
        self.state
    }

    /// Returns `true` while the element handed out by [`Self::display`] is
    /// still being read.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            DisplayState::Displaying | DisplayState::Overtaken
        )
    }

    /// All elements in physical slot order.
    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    /// Mutable access to all elements in physical slot order.
    pub fn elements_mut(&mut self) -> &mut [T] {
        &mut self.elements
    }

    /// Frames loaded but not yet displayed.
    pub fn available_display(&self) -> usize {
        self.load_cursor.saturating_sub(self.display_cursor) as usize
    }

    /// Slots the producer may still fill without lapping the consumer.
    pub fn available_load(&self) -> usize {
        self.depth().saturating_sub(self.available_display())
    }

    /// Physical slot holding absolute index `index`.
    pub fn slot_of(&self, index: u64) -> usize {
        (index % self.elements.len() as u64) as usize
    }

    /// Physical slot the next [`Self::load`] will fill.
    pub fn next_load_slot(&self) -> usize {
        self.slot_of(self.load_cursor)
    }

    /// Physical slot the next [`Self::display`] will return.
    pub fn next_display_slot(&self) -> usize {
        self.slot_of(self.display_cursor)
    }

    /// Returns the next element to display and marks it active.
    ///
    /// Does not check [`Self::available_display`]; on underrun the returned
    /// element holds stale content.
    pub fn display(&mut self) -> &T {
        if self.available_display() == 0 {
            warn!(
                "Displaying frame {} before it was loaded",
                self.display_cursor
            );
        }
        self.state = DisplayState::Displaying;
        let slot = self.next_display_slot();
        &self.elements[slot]
    }

    /// Like [`Self::display`], but fails instead of returning a stale element.
    pub fn try_display(&mut self) -> Result<&T> {
        if self.available_display() == 0 {
            return Err(Error::Underrun);
        }
        Ok(self.display())
    }

    /// Finishes the display started by [`Self::display`] and advances the
    /// display cursor.
    ///
    /// The cursor never overtakes the load cursor; a call with nothing loaded
    /// only clears the active flag. If a load already pushed the cursor past
    /// the displayed element, it is not advanced a second time.
    pub fn done_display(&mut self) {
        let overtaken = self.state == DisplayState::Overtaken;
        self.state = DisplayState::Idle;
        if overtaken {
            trace!("Displayed frame was overwritten during display");
        } else if self.display_cursor < self.load_cursor {
            self.display_cursor += 1;
        } else {
            warn!(
                "Finished display of frame {} that was never loaded",
                self.display_cursor
            );
        }
    }

    /// Returns the next element to fill and advances the load cursor.
    ///
    /// Does not check [`Self::available_load`]; when the caller ignores it,
    /// the load wraps around and overwrites the oldest undisplayed element,
    /// and the display cursor is dragged along so that the sequence never
    /// holds more than `depth` frames. An element that is being displayed
    /// counts as consumed by that drag; the following [`Self::done_display`]
    /// leaves the cursor where it is.
    pub fn load(&mut self) -> &mut T {
        if self.available_load() == 0 {
            warn!(
                "Loading frame {} over undisplayed frame {}",
                self.load_cursor, self.display_cursor
            );
            self.display_cursor += 1;
            if self.state == DisplayState::Displaying {
                self.state = DisplayState::Overtaken;
            }
        }
        let slot = self.next_load_slot();
        self.load_cursor += 1;
        trace!("Loading slot {slot}");
        &mut self.elements[slot]
    }

    /// Like [`Self::load`], but fails instead of overwriting an undisplayed element.
    pub fn try_load(&mut self) -> Result<&mut T> {
        if self.available_load() == 0 {
            return Err(Error::Overrun);
        }
        Ok(self.load())
    }

    /// Rewinds both cursors to zero, invalidating all buffered frames.
    ///
    /// Element contents are left untouched.
    pub fn reset(&mut self) {
        self.load_cursor = 0;
        self.display_cursor = 0;
        self.state = DisplayState::Idle;
    }

    /// Discards look-ahead so that at most `count - 1` loaded frames remain
    /// ahead of the consumer, and returns the element that will be loaded
    /// next.
    ///
    /// The load cursor only ever moves backwards here; when fewer frames are
    /// buffered than `count - 1`, nothing changes. A `count` of zero is
    /// treated as one and discards every buffered frame.
    ///
    /// The returned element is the slot the next [`Self::load`] will hand
    /// out, so its storage can be reused or inspected before it is
    /// overwritten.
    pub fn trim(&mut self, count: usize) -> &mut T {
        let keep = count.saturating_sub(1) as u64;
        let target = self.display_cursor + keep;
        if target < self.load_cursor {
            trace!("Trimming load cursor from {} to {target}", self.load_cursor);
            self.load_cursor = target;
        }
        let slot = self.next_load_slot();
        &mut self.elements[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(depth: usize) -> FrameSequence<u64> {
        FrameSequence::new(vec![0; depth]).unwrap()
    }

    #[test]
    fn empty_sequence_is_rejected() {
        assert!(matches!(
            FrameSequence::<u8>::new(Vec::new()),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn full_load_then_single_display() {
        let mut seq = sequence(4);
        for _ in 0..4 {
            seq.load();
        }
        assert_eq!(seq.load_cursor(), 4);
        assert_eq!(seq.available_display(), 4);
        assert_eq!(seq.available_load(), 0);

        seq.display();
        assert!(seq.is_active());
        seq.done_display();
        assert!(!seq.is_active());
        assert_eq!(seq.available_load(), 1);
    }

    #[test]
    fn elements_come_out_in_load_order_across_wraparound() {
        let mut seq = sequence(3);
        let mut shown = Vec::new();
        for frame in 0..10u64 {
            *seq.try_load().unwrap() = frame;
            if seq.available_load() == 0 || frame == 9 {
                while seq.available_display() > 0 {
                    shown.push(*seq.display());
                    seq.done_display();
                }
            }
        }
        assert_eq!(shown, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn availability_stays_within_depth() {
        let mut seq = sequence(5);
        // Deterministic interleaving of producer and consumer steps.
        for step in 0..200u32 {
            if step % 3 != 0 && seq.available_load() > 0 {
                seq.load();
            } else if seq.available_display() > 0 {
                seq.display();
                seq.done_display();
            }
            assert!(seq.available_display() <= seq.depth());
            assert_eq!(seq.available_display() + seq.available_load(), seq.depth());
        }
    }

    #[test]
    fn unchecked_load_wraps_onto_slot_zero() {
        let mut seq = sequence(4);
        for frame in 1..=4 {
            *seq.load() = frame;
        }
        *seq.load() = 5;
        assert_eq!(seq.elements()[0], 5);
        assert_eq!(seq.available_display(), 4);
    }

    #[test]
    fn overrun_during_display_does_not_skip_next_frame() {
        let mut seq = sequence(2);
        *seq.load() = 0;
        *seq.load() = 1;
        assert_eq!(*seq.display(), 0);

        *seq.load() = 2;
        assert_eq!(seq.state(), DisplayState::Overtaken);
        assert!(seq.is_active());
        seq.done_display();
        assert_eq!(seq.display_cursor(), 1);
        assert!(!seq.is_active());

        let mut shown = Vec::new();
        while seq.available_display() > 0 {
            shown.push(*seq.display());
            seq.done_display();
        }
        assert_eq!(shown, vec![1, 2]);
    }

    #[test]
    fn checked_access_rejects_contract_violations() {
        let mut seq = sequence(1);
        assert!(matches!(seq.try_display(), Err(Error::Underrun)));
        seq.try_load().unwrap();
        assert!(matches!(seq.try_load(), Err(Error::Overrun)));
    }

    #[test]
    fn done_display_never_passes_load_cursor() {
        let mut seq = sequence(2);
        seq.display();
        seq.done_display();
        assert_eq!(seq.display_cursor(), 0);
        assert_eq!(seq.available_load(), 2);
    }

    #[test]
    fn reset_restores_empty_state() {
        let mut seq = sequence(4);
        for _ in 0..3 {
            seq.load();
        }
        seq.display();
        seq.reset();
        assert_eq!(seq.available_display(), 0);
        assert_eq!(seq.available_load(), 4);
        assert!(!seq.is_active());
    }

    #[test]
    fn trim_keeps_count_minus_one_frames() {
        let mut seq = sequence(6);
        for frame in 0..5 {
            *seq.load() = frame;
        }
        seq.display();
        seq.done_display();

        // Frames 1..=4 buffered; keep 1 and hand back the slot of frame 2.
        let next = *seq.trim(2);
        assert_eq!(next, 2);
        assert_eq!(seq.available_display(), 1);
        assert_eq!(seq.available_load(), 5);
    }

    #[test]
    fn trim_never_advances_load_cursor() {
        let mut seq = sequence(4);
        seq.load();
        seq.trim(4);
        assert_eq!(seq.load_cursor(), 1);
        seq.trim(0);
        assert_eq!(seq.available_display(), 0);
    }
}
