// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-size frame memory shared between a producer and a consumer.
//!
//! A pool owns a fixed number of equally sized slots. Each slot carries a
//! single atomic claim word; a holder gains exclusive access to the slot's
//! payload by swapping that word from free to claimed.
//!
//! # Key Types
//!
//! - [`FrameSlotPool`]: Owns the slots and hands out claims
//! - [`SlotClaim`]: Exclusive access to one slot, released on drop

pub mod claim;
pub mod pool;
