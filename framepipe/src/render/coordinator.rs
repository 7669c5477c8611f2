// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Render barrier across registered streams.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{PlaybackStream, RefreshScheduler, StreamId, Tick};
use crate::{Error, Result, config::DEFAULT_EOS_MARGIN};

/// Draw callback stored for a stream until the next refresh tick.
pub type DrawCallback = Box<dyn FnOnce() + Send>;

struct StreamEntry {
    id: StreamId,
    stream: Arc<dyn PlaybackStream>,
    callback: Option<DrawCallback>,
    requested_frame: u64,
}

/// Software barrier that presents all registered streams on one refresh tick.
///
/// Each stream announces that it wants to draw by calling
/// [`Self::notify_ready`] with a callback. Once every stream has a callback
/// stored and at least one decoded frame available, a single tick is
/// scheduled on the [`RefreshScheduler`]. When the host delivers that tick to
/// [`Self::on_refresh`], every stored callback runs once, in registration
/// order, and is consumed.
///
/// A stream whose requested frame is within `eos_margin` frames of its length
/// is treated as finished: it is seeked to `length - eos_margin`, its callback
/// is dropped, and it no longer holds the barrier back.
///
/// Unreadiness is never an error. A stream that stops calling
/// [`Self::notify_ready`] simply stalls the barrier.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
/// use framepipe::{ManualScheduler, PlaybackStream, RenderCoordinator, StreamId};
///
/// struct Ready;
/// impl PlaybackStream for Ready {
///     fn length(&self) -> u64 { 1000 }
///     fn can_play(&self) -> usize { 1 }
///     fn go_to_frame(&self, _frame: u64) {}
/// }
///
/// # fn main() -> Result<(), framepipe::Error> {
/// let mut coordinator = RenderCoordinator::new(ManualScheduler::default());
/// let id = StreamId::new();
/// coordinator.add_stream(id, Arc::new(Ready));
///
/// let draws = Arc::new(AtomicUsize::new(0));
/// let counter = draws.clone();
/// coordinator.notify_ready(id, move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// })?;
///
/// let tick = coordinator.scheduler_mut().next_due().unwrap();
/// assert_eq!(coordinator.on_refresh(tick), 1);
/// assert_eq!(draws.load(Ordering::SeqCst), 1);
/// # Ok(())
/// # }
/// ```
pub struct RenderCoordinator<S> {
    scheduler: S,
    streams: Vec<StreamEntry>,
    eos_margin: u64,
    generation: u64,
    pending: Option<Tick>,
}

impl<S: RefreshScheduler> RenderCoordinator<S> {
    /// Creates a coordinator with the default end-of-stream margin.
    pub fn new(scheduler: S) -> Self {
        Self::with_eos_margin(scheduler, DEFAULT_EOS_MARGIN)
    }

    /// Creates a coordinator that releases streams `eos_margin` frames before
    /// their end.
    pub fn with_eos_margin(scheduler: S, eos_margin: u64) -> Self {
        Self {
            scheduler,
            streams: Vec::new(),
            eos_margin,
            generation: 0,
            pending: None,
        }
    }

    /// The refresh scheduler ticks are placed on.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Mutable access to the refresh scheduler, e.g. to pull due ticks.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Number of registered streams.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Returns `true` while a scheduled tick has not fired yet.
    pub fn tick_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Registers a stream with no callback and a requested frame of 0.
    ///
    /// Registering an id again replaces its stream and resets its state but
    /// keeps its position in the draw order.
    pub fn add_stream(&mut self, id: StreamId, stream: Arc<dyn PlaybackStream>) {
        let entry = StreamEntry {
            id,
            stream,
            callback: None,
            requested_frame: 0,
        };
        match self.streams.iter_mut().find(|entry| entry.id == id) {
            Some(existing) => {
                debug!("Replacing stream {id}");
                *existing = entry;
            }
            None => {
                debug!("Registered stream {id}");
                self.streams.push(entry);
            }
        }
    }

    /// Unregisters a stream, dropping its stored callback.
    pub fn remove_stream(&mut self, id: StreamId) -> Result<()> {
        let position = self.position(id)?;
        self.streams.remove(position);
        debug!("Removed stream {id}");
        Ok(())
    }

    /// Records the frame the caller wants next from a stream.
    ///
    /// This only feeds the end-of-stream check; it schedules nothing.
    pub fn set_frame_request(&mut self, id: StreamId, frame: u64) -> Result<()> {
        let position = self.position(id)?;
        self.streams[position].requested_frame = frame;
        Ok(())
    }

    /// Frame last requested for a stream.
    pub fn requested_frame(&self, id: StreamId) -> Result<u64> {
        Ok(self.streams[self.position(id)?].requested_frame)
    }

    /// Stores a stream's draw callback and re-evaluates the barrier.
    ///
    /// A previously stored callback that has not run yet is replaced.
    pub fn notify_ready<F>(&mut self, id: StreamId, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let position = self.position(id)?;
        self.streams[position].callback = Some(Box::new(callback));
        self.evaluate();
        Ok(())
    }

    /// Delivers a refresh tick.
    ///
    /// Runs every stored callback once in registration order and returns how
    /// many ran. Ticks that are not the currently pending one (cancelled or
    /// from an older generation) are ignored and return 0.
    pub fn on_refresh(&mut self, tick: Tick) -> usize {
        if self.pending != Some(tick) {
            debug!("Ignoring stale refresh tick {}", tick.generation());
            return 0;
        }
        self.pending = None;

        let mut drawn = 0;
        for entry in &mut self.streams {
            if let Some(callback) = entry.callback.take() {
                callback();
                drawn += 1;
            }
        }
        trace!("Refresh tick {} drew {drawn} streams", tick.generation());
        drawn
    }

    /// Pauses the barrier.
    ///
    /// Cancels the pending tick, invalidates any tick already handed to the
    /// host and clears every stored callback. Registrations are kept; the
    /// barrier resumes once streams call [`Self::notify_ready`] again.
    pub fn stop(&mut self) {
        if let Some(tick) = self.pending.take() {
            self.scheduler.cancel(tick);
        }
        self.generation += 1;
        for entry in &mut self.streams {
            entry.callback = None;
        }
        debug!("Render coordinator stopped at generation {}", self.generation);
    }

    fn position(&self, id: StreamId) -> Result<usize> {
        self.streams
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(Error::UnknownStream(id))
    }

    /// Schedules a tick if every stream is ready or finished.
    fn evaluate(&mut self) {
        for entry in &mut self.streams {
            let length = entry.stream.length();
            if entry.requested_frame.saturating_add(self.eos_margin) >= length {
                let last = length.saturating_sub(self.eos_margin);
                trace!("Stream {} near its end, seeking to {last}", entry.id);
                entry.stream.go_to_frame(last);
                entry.callback = None;
                continue;
            }
            if entry.callback.is_none() || entry.stream.can_play() == 0 {
                trace!("Barrier waiting on stream {}", entry.id);
                return;
            }
        }

        if self.pending.is_some() {
            return;
        }
        self.generation += 1;
        let tick = Tick::new(self.generation);
        self.pending = Some(tick);
        self.scheduler.schedule(tick);
        debug!("Scheduled refresh tick {}", self.generation);
    }
}
