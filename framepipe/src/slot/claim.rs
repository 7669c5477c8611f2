// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! RAII slot claim for exclusive zero-copy frame access.

use std::sync::{Arc, atomic::Ordering};

use tracing::trace;

use super::pool::{PoolContext, SLOT_FREE};

/// Exclusive access to one slot of a [`crate::FrameSlotPool`].
///
/// A claim is the only way to reach a slot's payload. It can be moved to
/// another thread, which is how a decoded frame travels from producer to
/// consumer without being copied. The slot returns to the pool when the
/// claim is released or dropped.
///
/// # Safety Guarantees
///
/// - At most one claim exists per slot at any time
/// - Releasing twice is impossible (release consumes the claim)
/// - Abandoned claims (early return, panic) are released on drop
///
/// # Examples
///
/// ```
/// # use framepipe::FrameSlotPool;
/// # fn main() -> Result<(), framepipe::Error> {
/// let pool = FrameSlotPool::new(4, 1)?;
/// let mut claim = pool.claim_slot().unwrap();
/// claim.payload_mut().copy_from_slice(&[1, 2, 3, 4]);
///
/// let consumer = std::thread::spawn(move || {
///     assert_eq!(claim.payload(), &[1, 2, 3, 4]);
///     // dropped here, slot returns to the pool
/// });
/// consumer.join().unwrap();
/// assert!(!pool.is_claimed(0));
/// # Ok(())
/// # }
/// ```
pub struct SlotClaim {
    context: Arc<PoolContext>,
    index: usize,
    /// Set once the claim word has been cleared, to prevent a second store on drop.
    released: bool,
}

impl SlotClaim {
    /// Creates a claim for a slot whose claim word was just swapped to claimed.
    pub(crate) fn new(context: Arc<PoolContext>, index: usize) -> Self {
        Self {
            context,
            index,
            released: false,
        }
    }

    pub(crate) fn context(&self) -> &Arc<PoolContext> {
        &self.context
    }

    /// Index of the claimed slot within its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Read access to the slot's payload.
    pub fn payload(&self) -> &[u8] {
        // SAFETY
        // This claim swapped the slot's claim word from free to claimed and has
        // not cleared it yet, so no other claim for this slot exists.
        unsafe { &*self.context.slots[self.index].payload.get() }
    }

    /// Write access to the slot's payload.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        // SAFETY
        // See `payload`; `&mut self` additionally rules out aliasing through
        // this claim.
        unsafe { &mut *self.context.slots[self.index].payload.get() }
    }

    /// Returns the slot to its pool.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.context.slots[self.index]
            .claim
            .store(SLOT_FREE, Ordering::Release);
        trace!("Released frame slot {}", self.index);
    }
}

impl std::fmt::Debug for SlotClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotClaim")
            .field("index", &self.index)
            .field("size", &self.context.slot_size)
            .finish()
    }
}

impl Drop for SlotClaim {
    /// Releases the slot if the claim was abandoned without an explicit release.
    fn drop(&mut self) {
        self.release_inner();
    }
}
