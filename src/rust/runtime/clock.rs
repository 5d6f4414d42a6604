// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    scheduler::{
        Yielder,
        YielderHandle,
    },
    Fail,
    SharedObject,
};
use ::core::cmp::Reverse;
use ::std::{
    collections::BinaryHeap,
    ops::{
        Deref,
        DerefMut,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

struct ClockQueueEntry {
    expiry: u64,
    waiter: YielderHandle,
}

/// Virtual clock counting scheduler ticks. Holds one or more events for future wake up; the runtime drives it forward
/// one tick per scheduling quantum.
pub struct TickClock {
    now: u64,
    // Use a reverse to get a min heap.
    heap: BinaryHeap<Reverse<ClockQueueEntry>>,
}

#[derive(Clone)]
pub struct SharedTickClock(SharedObject<TickClock>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedTickClock {
    pub fn new(now: u64) -> Self {
        Self(SharedObject::<TickClock>::new(TickClock {
            now,
            heap: BinaryHeap::new(),
        }))
    }

    /// Moves time forward, waking every waiter whose expiry has been reached.
    pub fn advance_clock(&mut self, now: u64) {
        debug_assert!(self.now <= now);

        while let Some(Reverse(entry)) = self.heap.peek() {
            if now < entry.expiry {
                break;
            }
            let mut entry: ClockQueueEntry = self
                .heap
                .pop()
                .expect("should have an entry because we were able to peek")
                .0;
            entry.waiter.wake_with(Ok(()));
        }
        self.now = now;
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Registers a wake-up call for `waiter` at `expiry` without suspending the caller.
    pub fn schedule_wake(&mut self, expiry: u64, waiter: YielderHandle) {
        self.heap.push(Reverse(ClockQueueEntry { expiry, waiter }));
    }

    /// Suspends the calling coroutine for `delay` ticks.
    pub async fn wait(self, delay: u64, yielder: &Yielder) -> Result<(), Fail> {
        let now: u64 = self.now;
        self.wait_until(now + delay, yielder).await
    }

    /// Suspends the calling coroutine until the clock reaches `expiry`.
    pub async fn wait_until(mut self, expiry: u64, yielder: &Yielder) -> Result<(), Fail> {
        self.schedule_wake(expiry, yielder.get_handle());
        yielder.yield_until_wake().await
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for SharedTickClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Deref for SharedTickClock {
    type Target = TickClock;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SharedTickClock {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

impl PartialEq for ClockQueueEntry {
    fn eq(&self, other: &ClockQueueEntry) -> bool {
        // This is technically not correct. However for the usage in this module we only need to compare entries by
        // expiration.
        self.expiry == other.expiry
    }
}

impl Eq for ClockQueueEntry {}

impl PartialOrd for ClockQueueEntry {
    fn partial_cmp(&self, other: &ClockQueueEntry) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClockQueueEntry {
    fn cmp(&self, other: &ClockQueueEntry) -> core::cmp::Ordering {
        self.expiry.cmp(&other.expiry)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
