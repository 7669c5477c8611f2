// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Display refresh scheduling.

use std::collections::VecDeque;

/// A scheduled refresh tick.
///
/// Every tick scheduled by a [`crate::RenderCoordinator`] carries a fresh
/// generation number. Ticks from an older generation are ignored when they
/// fire, so a tick that was already in flight when the coordinator was
/// stopped cannot run stale callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tick {
    generation: u64,
}

impl Tick {
    pub(crate) fn new(generation: u64) -> Self {
        Self { generation }
    }

    /// Generation this tick was scheduled in.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The display's refresh clock.
///
/// The host implements this on top of whatever drives its presentation
/// (vsync callback, timer, event loop) and calls
/// [`crate::RenderCoordinator::on_refresh`] with the tick once it is due.
pub trait RefreshScheduler {
    /// Requests that `tick` be delivered on the next refresh.
    fn schedule(&mut self, tick: Tick);

    /// Withdraws a previously scheduled tick. Cancelling a tick that already
    /// fired must be harmless.
    fn cancel(&mut self, tick: Tick);
}

/// A scheduler whose ticks are pulled by the host loop.
///
/// # Examples
///
/// ```
/// use framepipe::{ManualScheduler, RenderCoordinator};
///
/// let mut coordinator = RenderCoordinator::new(ManualScheduler::default());
/// // ... register streams, notify readiness ...
/// while let Some(tick) = coordinator.scheduler_mut().next_due() {
///     coordinator.on_refresh(tick);
/// }
/// ```
#[derive(Debug, Default)]
pub struct ManualScheduler {
    queued: VecDeque<Tick>,
}

impl ManualScheduler {
    /// Pops the oldest scheduled tick.
    pub fn next_due(&mut self) -> Option<Tick> {
        self.queued.pop_front()
    }

    /// Number of ticks waiting to be delivered.
    pub fn queued(&self) -> usize {
        self.queued.len()
    }
}

impl RefreshScheduler for ManualScheduler {
    fn schedule(&mut self, tick: Tick) {
        self.queued.push_back(tick);
    }

    fn cancel(&mut self, tick: Tick) {
        self.queued.retain(|queued| *queued != tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_removes_only_matching_tick() {
        let mut scheduler = ManualScheduler::default();
        scheduler.schedule(Tick::new(1));
        scheduler.schedule(Tick::new(2));
        scheduler.cancel(Tick::new(1));
        scheduler.cancel(Tick::new(7));
        assert_eq!(scheduler.queued(), 1);
        assert_eq!(scheduler.next_due(), Some(Tick::new(2)));
        assert_eq!(scheduler.next_due(), None);
    }
}
