// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod clock;
pub mod fail;
pub mod logging;
pub mod scheduler;
pub mod semaphore;

pub use self::fail::Fail;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    clock::SharedTickClock,
    scheduler::{
        Scheduler,
        Task,
        TaskId,
        WorkerTask,
        Yielder,
    },
};
use ::futures::future::FusedFuture;
use ::std::{
    ops::{
        Deref,
        DerefMut,
    },
    pin::Pin,
    rc::Rc,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// The runtime wires the task scheduler and the virtual clock together and drives both from a single execution
/// context. After worker registration, the initial context does nothing but run the poll-and-advance loop.
pub struct Runtime {
    /// Scheduler
    scheduler: Scheduler,
    /// Shared clock for periodic holds and bounded lock waits.
    clock: SharedTickClock,
}

/// The SharedObject wraps an object that will be shared across coroutines.
pub struct SharedObject<T>(Rc<T>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Runtime {
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler::default(),
            clock: SharedTickClock::new(0),
        }
    }

    /// Returns a handle to the shared clock.
    pub fn get_clock(&self) -> SharedTickClock {
        self.clock.clone()
    }

    /// Gets the current time according to our internal clock.
    pub fn get_now(&self) -> u64 {
        self.clock.now()
    }

    /// Registers a worker with the scheduler. The coroutine factory takes a yielder and returns the worker's
    /// perpetual loop, which becomes a coroutine dispatched by priority.
    pub fn insert_worker<F>(
        &mut self,
        name: &str,
        priority: u8,
        stack_budget: usize,
        coroutine_factory: F,
    ) -> Result<TaskId, Fail>
    where
        F: FnOnce(Yielder) -> Pin<Box<dyn FusedFuture<Output = Result<(), Fail>>>>,
    {
        if stack_budget == 0 {
            let cause: String = format!("invalid stack budget (name={:?})", name);
            error!("insert_worker(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }

        let yielder: Yielder = Yielder::new();
        let coroutine: Pin<Box<dyn FusedFuture<Output = Result<(), Fail>>>> = coroutine_factory(yielder);
        let task: WorkerTask = WorkerTask::new(name.to_string(), priority, stack_budget, coroutine);
        match self.scheduler.insert_task(task) {
            Some(task_id) => Ok(task_id),
            None => {
                let cause: String = format!("cannot schedule worker (name={:?})", name);
                error!("insert_worker(): {}", cause);
                Err(Fail::new(libc::EAGAIN, &cause))
            },
        }
    }

    /// Runs one scheduling quantum and moves the clock forward one tick. Worker loops are perpetual, so a completed
    /// task is a fatal condition and surfaces as an error.
    pub fn poll_and_advance_clock(&mut self) -> Result<(), Fail> {
        if let Some(task) = self.scheduler.poll_quantum() {
            let cause: String = format!("worker task terminated (name={:?})", task.get_name());
            error!("poll_and_advance_clock(): {}", cause);
            return Err(Fail::new(libc::ECANCELED, &cause));
        }
        let now: u64 = self.clock.now() + 1;
        self.clock.advance_clock(now);
        Ok(())
    }

    /// Drives the runtime for a fixed number of ticks. Used by tests to step deterministically through schedules.
    pub fn run_for(&mut self, ticks: u64) -> Result<(), Fail> {
        for _ in 0..ticks {
            self.poll_and_advance_clock()?;
        }
        Ok(())
    }

    /// Runs the scheduling loop forever. Only a fatal condition makes this function return.
    pub fn run(&mut self) -> Result<(), Fail> {
        loop {
            self.poll_and_advance_clock()?;
        }
    }

    /// Number of registered workers.
    pub fn num_workers(&self) -> usize {
        self.scheduler.num_tasks()
    }
}

impl<T> SharedObject<T> {
    pub fn new(object: T) -> Self {
        Self(Rc::new(object))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Dereferences a shared object for use.
impl<T> Deref for SharedObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

/// Dereferences a mutable reference to a shared object for use. This breaks Rust's ownership model because it allows
/// more than one mutable dereference of a shared object at a time. The runtime requires this because multiple
/// coroutines hold references to shared objects at the same time; however, the runtime also ensures that only one
/// coroutine runs at a time. Due to this design, Rust's static borrow checker is not able to ensure memory safety and
/// we have chosen not to use the dynamic borrow checker. Instead, shared objects should be used judiciously across
/// coroutines with the understanding that the shared object may change whenever the coroutine yields.
impl<T> DerefMut for SharedObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        let ptr: *mut T = Rc::as_ptr(&self.0) as *mut T;
        unsafe { &mut *ptr }
    }
}

impl<T> Clone for SharedObject<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
