// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    clock::SharedTickClock,
    fail::Fail,
    scheduler::{
        Yielder,
        YielderHandle,
    },
    SharedObject,
};
use ::std::{
    collections::VecDeque,
    ops::{
        Deref,
        DerefMut,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// State of the semaphore. Binary: a release while already available is tolerated as a no-op.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LockState {
    Available,
    Held,
}

/// A coroutine parked inside [acquire](SharedBinarySemaphore::acquire). Ownership of the semaphore is handed off
/// directly to the first parked waiter on release, so a waiter woken by the clock instead can tell the two wake
/// sources apart through the `granted` flag.
struct Waiter {
    wait_id: u64,
    handle: YielderHandle,
    granted: SharedObject<bool>,
}

/// Binary semaphore for serializing access to a single shared resource. Supports a bounded wait on acquisition: a
/// waiter parks on its yielder and is woken either by a release or by the clock once the timeout expires. Waiting
/// never busy-spins a scheduling quantum.
pub struct BinarySemaphore {
    state: LockState,
    clock: SharedTickClock,
    waiters: VecDeque<Waiter>,
    next_wait_id: u64,
}

#[derive(Clone)]
pub struct SharedBinarySemaphore(SharedObject<BinarySemaphore>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedBinarySemaphore {
    /// Creates a new semaphore in the Available state.
    pub fn new(clock: SharedTickClock) -> Self {
        Self(SharedObject::<BinarySemaphore>::new(BinarySemaphore {
            state: LockState::Available,
            clock,
            waiters: VecDeque::new(),
            next_wait_id: 0,
        }))
    }

    /// Acquires the semaphore, waiting at most `timeout` ticks. Returns true once the semaphore is held by the caller
    /// and false if the timeout expired first, in which case the semaphore state is left unchanged. Non-reentrant: a
    /// caller that already holds the semaphore must not call this again before releasing.
    pub async fn acquire(&mut self, timeout: u64) -> Result<bool, Fail> {
        if self.try_acquire() {
            return Ok(true);
        }

        let deadline: u64 = self.clock.now() + timeout;
        loop {
            // Park on a fresh yielder so a stale wake-up call from an earlier wait cannot leak into this one.
            let yielder: Yielder = Yielder::new();
            let granted: SharedObject<bool> = SharedObject::new(false);
            let wait_id: u64 = self.next_wait_id;
            self.next_wait_id += 1;
            self.waiters.push_back(Waiter {
                wait_id,
                handle: yielder.get_handle(),
                granted: granted.clone(),
            });
            self.clock.clone().schedule_wake(deadline, yielder.get_handle());

            yielder.yield_until_wake().await?;

            if *granted {
                // A releaser handed ownership to us; our queue entry is already gone.
                trace!("acquire(): granted by handoff (wait_id={:?})", wait_id);
                return Ok(true);
            }
            self.remove_waiter(wait_id);
            if self.try_acquire() {
                return Ok(true);
            }
            if self.clock.now() >= deadline {
                trace!("acquire(): wait expired (wait_id={:?})", wait_id);
                return Ok(false);
            }
            // Spurious wake: keep waiting out the remainder of the timeout window.
        }
    }

    /// Tries to acquire the semaphore without waiting. Returns true if successful.
    pub fn try_acquire(&mut self) -> bool {
        match self.state {
            LockState::Available => {
                self.state = LockState::Held;
                true
            },
            LockState::Held => false,
        }
    }

    /// Releases the semaphore. If a waiter is parked, ownership is handed off directly to the first one and the
    /// semaphore stays Held on its behalf; otherwise the semaphore becomes Available. Releasing an Available
    /// semaphore is a logic error in the caller but is tolerated as a no-op.
    pub fn release(&mut self) {
        match self.state {
            LockState::Held => {
                if let Some(mut waiter) = self.waiters.pop_front() {
                    trace!("release(): handing off to waiter (wait_id={:?})", waiter.wait_id);
                    *waiter.granted = true;
                    waiter.handle.wake_with(Ok(()));
                } else {
                    self.state = LockState::Available;
                }
            },
            LockState::Available => warn!("release(): semaphore is not held"),
        }
    }

    /// Checks whether the semaphore is currently available.
    pub fn is_available(&self) -> bool {
        self.state == LockState::Available
    }

    /// Drops the queue entry of a waiter that is no longer parked.
    fn remove_waiter(&mut self, wait_id: u64) {
        self.waiters.retain(|waiter| waiter.wait_id != wait_id);
    }
}

/// Installs a semaphore into `slot` unless one has already been created. The semaphore guards the serial console, so
/// it is created exactly once at startup, before any worker runs; re-running the creation step leaves the existing
/// semaphore untouched.
pub fn create_serial_lock(slot: &mut Option<SharedBinarySemaphore>, clock: &SharedTickClock) -> SharedBinarySemaphore {
    match slot {
        Some(existing) => {
            debug!("create_serial_lock(): semaphore already created");
            existing.clone()
        },
        None => {
            let semaphore: SharedBinarySemaphore = SharedBinarySemaphore::new(clock.clone());
            *slot = Some(semaphore.clone());
            semaphore
        },
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedBinarySemaphore {
    type Target = BinarySemaphore;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SharedBinarySemaphore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::{
        create_serial_lock,
        SharedBinarySemaphore,
    };
    use crate::runtime::clock::SharedTickClock;
    use ::anyhow::Result;

    #[test]
    fn test_semaphore_acquire_release() -> Result<()> {
        let clock: SharedTickClock = SharedTickClock::new(0);
        let mut semaphore: SharedBinarySemaphore = SharedBinarySemaphore::new(clock);

        crate::ensure_eq!(semaphore.is_available(), true);
        crate::ensure_eq!(semaphore.try_acquire(), true);
        crate::ensure_eq!(semaphore.is_available(), false);
        semaphore.release();
        crate::ensure_eq!(semaphore.is_available(), true);

        Ok(())
    }

    #[test]
    fn test_semaphore_acquire_acquire_release() -> Result<()> {
        let clock: SharedTickClock = SharedTickClock::new(0);
        let mut semaphore: SharedBinarySemaphore = SharedBinarySemaphore::new(clock);

        crate::ensure_eq!(semaphore.try_acquire(), true);
        crate::ensure_eq!(semaphore.try_acquire(), false);
        semaphore.release();
        crate::ensure_eq!(semaphore.is_available(), true);

        Ok(())
    }

    /// Releasing a semaphore that is not held must leave its state untouched.
    #[test]
    fn test_semaphore_release_without_acquire_is_a_no_op() -> Result<()> {
        let clock: SharedTickClock = SharedTickClock::new(0);
        let mut semaphore: SharedBinarySemaphore = SharedBinarySemaphore::new(clock);

        semaphore.release();
        crate::ensure_eq!(semaphore.is_available(), true);
        crate::ensure_eq!(semaphore.try_acquire(), true);

        Ok(())
    }

    /// Running the creation step twice must leave the state of the originally created semaphore unchanged.
    #[test]
    fn test_create_serial_lock_is_idempotent() -> Result<()> {
        let clock: SharedTickClock = SharedTickClock::new(0);
        let mut slot: Option<SharedBinarySemaphore> = None;

        let mut first: SharedBinarySemaphore = create_serial_lock(&mut slot, &clock);
        crate::ensure_eq!(first.try_acquire(), true);

        let second: SharedBinarySemaphore = create_serial_lock(&mut slot, &clock);
        crate::ensure_eq!(second.is_available(), false);
        crate::ensure_eq!(first.is_available(), false);

        Ok(())
    }
}
