// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Slot pool implementation.

use std::{
    cell::UnsafeCell,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use tracing::{debug, trace, warn};

use super::claim::SlotClaim;
use crate::{Error, Result};

/// Size in bytes of the control header preceding each slot's payload.
///
/// The header holds the slot's claim word.
pub const CONTROL_HEADER_SIZE: usize = std::mem::size_of::<AtomicU32>();

pub(crate) const SLOT_FREE: u32 = 0;
pub(crate) const SLOT_CLAIMED: u32 = 1;

/// One region of the pool: claim word plus payload.
pub(crate) struct Slot {
    pub(crate) claim: AtomicU32,
    pub(crate) payload: UnsafeCell<Box<[u8]>>,
}

/// Shared state behind a [`FrameSlotPool`].
///
/// Kept separate from the pool handle so that claims can outlive the handle
/// they were taken from.
pub(crate) struct PoolContext {
    pub(crate) slot_size: usize,
    pub(crate) slots: Box<[Slot]>,
}

// Safety: a slot's payload is only ever touched through a `SlotClaim`, and a
// claim only exists for a slot whose claim word it swapped from free to
// claimed. The atomic swap guarantees at most one claim per slot at a time.
unsafe impl Sync for PoolContext {}

/// A fixed set of equally sized frame slots with lock-free claiming.
///
/// The pool is cheaply cloneable and `Send + Sync`; clones share the same
/// slots. Producers call [`Self::claim_slot`] to gain exclusive access to a
/// free slot, write a decoded frame into it and hand the [`SlotClaim`] to the
/// consumer, which releases it once the frame has been presented.
///
/// # Examples
///
/// ```
/// use framepipe::FrameSlotPool;
///
/// # fn main() -> Result<(), framepipe::Error> {
/// let pool = FrameSlotPool::new(1024, 2)?;
///
/// let mut first = pool.claim_slot().expect("slot 0 is free");
/// first.payload_mut().fill(0xFF);
/// let _second = pool.claim_slot().expect("slot 1 is free");
///
/// // Every slot is claimed: back-pressure, not an error.
/// assert!(pool.claim_slot().is_none());
///
/// pool.release_slot(first);
/// assert_eq!(pool.claim_slot().map(|claim| claim.index()), Some(0));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FrameSlotPool {
    context: Arc<PoolContext>,
}

impl FrameSlotPool {
    /// Allocates `depth` slots of `slot_size` payload bytes, all free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `slot_size` or `depth` is zero.
    pub fn new(slot_size: usize, depth: usize) -> Result<Self> {
        if slot_size == 0 {
            return Err(Error::InvalidConfiguration(
                "slot size must be positive".to_string(),
            ));
        }
        if depth == 0 {
            return Err(Error::InvalidConfiguration(
                "pool depth must be positive".to_string(),
            ));
        }

        let slots = (0..depth)
            .map(|_| Slot {
                claim: AtomicU32::new(SLOT_FREE),
                payload: UnsafeCell::new(vec![0u8; slot_size].into_boxed_slice()),
            })
            .collect();
        debug!("Allocated frame slot pool: {depth} slots of {slot_size} bytes");

        Ok(Self {
            context: Arc::new(PoolContext { slot_size, slots }),
        })
    }

    /// Claims the first free slot in index order.
    ///
    /// Returns `None` when every slot is already claimed. This is a
    /// back-pressure signal: the caller should drop the frame or retry later.
    pub fn claim_slot(&self) -> Option<SlotClaim> {
        for (index, slot) in self.context.slots.iter().enumerate() {
            if slot.claim.swap(SLOT_CLAIMED, Ordering::AcqRel) == SLOT_FREE {
                trace!("Claimed frame slot {index}");
                return Some(SlotClaim::new(self.context.clone(), index));
            }
        }

        warn!(
            "No free frame slot available, all {} slots claimed",
            self.depth()
        );
        None
    }

    /// Returns a claimed slot to the pool.
    ///
    /// Equivalent to [`SlotClaim::release`]. Releasing never fails; a slot
    /// whose claim word is already free stays free.
    pub fn release_slot(&self, claim: SlotClaim) {
        if !self.issued(&claim) {
            debug!(
                "Releasing slot {} through a pool that did not issue it",
                claim.index()
            );
        }
        claim.release();
    }

    /// Returns `true` if `claim` was handed out by this pool.
    pub(crate) fn issued(&self, claim: &SlotClaim) -> bool {
        Arc::ptr_eq(&self.context, claim.context())
    }

    /// Payload bytes per slot.
    pub fn slot_size(&self) -> usize {
        self.context.slot_size
    }

    /// Number of slots in the pool.
    pub fn depth(&self) -> usize {
        self.context.slots.len()
    }

    /// Bytes occupied by one slot including its control header.
    pub fn region_size(&self) -> usize {
        self.context.slot_size + CONTROL_HEADER_SIZE
    }

    /// Number of slots currently claimed.
    ///
    /// This is a snapshot; concurrent claims and releases may change it
    /// immediately afterwards.
    pub fn claimed_count(&self) -> usize {
        self.context
            .slots
            .iter()
            .filter(|slot| slot.claim.load(Ordering::Acquire) == SLOT_CLAIMED)
            .count()
    }

    /// Returns `true` if the slot at `index` is claimed. Out-of-range indices
    /// are reported as not claimed.
    pub fn is_claimed(&self, index: usize) -> bool {
        self.context
            .slots
            .get(index)
            .is_some_and(|slot| slot.claim.load(Ordering::Acquire) == SLOT_CLAIMED)
    }
}

impl std::fmt::Debug for FrameSlotPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlotPool")
            .field("slot_size", &self.slot_size())
            .field("depth", &self.depth())
            .field("claimed", &self.claimed_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn zero_sized_pools_are_rejected() {
        assert!(matches!(
            FrameSlotPool::new(0, 4),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            FrameSlotPool::new(1024, 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn region_includes_claim_word() {
        let pool = FrameSlotPool::new(1024, 3).unwrap();
        assert_eq!(pool.region_size(), 1024 + 4);
        assert_eq!(pool.depth(), 3);
        assert_eq!(pool.claimed_count(), 0);
    }

    #[traced_test]
    #[test]
    fn exhausted_pool_reports_no_slot() {
        let pool = FrameSlotPool::new(1024, 3).unwrap();
        let claims: Vec<_> = (0..3).map(|_| pool.claim_slot().unwrap()).collect();
        assert_eq!(
            claims.iter().map(SlotClaim::index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        assert!(pool.claim_slot().is_none());
        assert!(logs_contain("No free frame slot available"));
    }

    #[test]
    fn released_slot_is_the_next_one_claimed() {
        let pool = FrameSlotPool::new(16, 3).unwrap();
        let s0 = pool.claim_slot().unwrap();
        let s1 = pool.claim_slot().unwrap();
        let s2 = pool.claim_slot().unwrap();

        pool.release_slot(s1);
        assert!(!pool.is_claimed(1));

        let again = pool.claim_slot().unwrap();
        assert_eq!(again.index(), 1);
        assert!(pool.claim_slot().is_none());

        drop((s0, s2, again));
        assert_eq!(pool.claimed_count(), 0);
    }

    #[test]
    fn payload_survives_handoff_between_threads() {
        let pool = FrameSlotPool::new(8, 1).unwrap();
        let mut claim = pool.claim_slot().unwrap();
        claim.payload_mut().copy_from_slice(&[7; 8]);

        let seen = std::thread::spawn(move || {
            let sum: u32 = claim.payload().iter().map(|&b| b as u32).sum();
            claim.release();
            sum
        })
        .join()
        .unwrap();

        assert_eq!(seen, 56);
        assert!(!pool.is_claimed(0));
    }

    #[test]
    fn racing_claims_on_single_slot_have_one_winner() {
        for _ in 0..64 {
            let pool = FrameSlotPool::new(4, 1).unwrap();
            let barrier = Barrier::new(2);

            let results: Vec<Option<SlotClaim>> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        scope.spawn(|| {
                            barrier.wait();
                            pool.claim_slot()
                        })
                    })
                    .collect();
                // Join everything before any claim is dropped.
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap())
                    .collect()
            });

            assert_eq!(results.iter().filter(|claim| claim.is_some()).count(), 1);
        }
    }
}
