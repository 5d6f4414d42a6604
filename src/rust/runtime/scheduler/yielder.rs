// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{
        Context,
        Poll,
        Waker,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Yield is a future that lets the currently running coroutine cooperatively yield because it cannot make progress.
/// Coroutines are expected to use the standalone async functions on [Yielder] to create yield points.
struct Yield {
    /// How many more quanta should we yield for? If none, then we yield until a wake signal.
    remaining_quanta: Option<usize>,
    /// Shared reference used to wake the yielded coroutine with either an Ok to indicate there is work to be done or
    /// an error to stop the coroutine.
    yielder_handle: YielderHandle,
}

/// Yield Handle
///
/// This is used to uniquely identify a yielded coroutine. Anything holding the handle may wake the yielded coroutine.
#[derive(Clone)]
pub struct YielderHandle {
    result_handle: Rc<RefCell<Option<Result<(), Fail>>>>,
    waker_handle: Rc<RefCell<Option<Waker>>>,
}

/// Yielder lets a single coroutine yield to the scheduler. The yield handle can be used to wake the coroutine.
pub struct Yielder {
    yielder_handle: YielderHandle,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl YielderHandle {
    pub fn new() -> Self {
        Self {
            result_handle: Rc::new(RefCell::new(None)),
            waker_handle: Rc::new(RefCell::new(None)),
        }
    }

    /// Wake this yielded coroutine: Ok indicates there is work to be done and Fail indicates the coroutine should exit
    /// with an error.
    pub fn wake_with(&mut self, result: Result<(), Fail>) {
        if let Some(old_result) = self.result_handle.borrow_mut().replace(result) {
            debug!(
                "wake_with(): already scheduled, overwriting result (old={:?})",
                old_result
            );
        } else if let Some(waker) = self.waker_handle.borrow_mut().take() {
            waker.wake();
        }
    }

    /// Get the result this coroutine should be woken with.
    pub fn get_result(&mut self) -> Option<Result<(), Fail>> {
        self.result_handle.borrow_mut().take()
    }

    /// Set the waker for this Yielder.
    pub fn set_waker(&mut self, waker: Waker) {
        *self.waker_handle.borrow_mut() = Some(waker);
    }
}

impl Yielder {
    /// Create a new Yielder object for a specific coroutine to yield.
    pub fn new() -> Self {
        Self {
            yielder_handle: YielderHandle::new(),
        }
    }

    /// Return a handle to this Yielder for waking the yielded coroutine.
    pub fn get_handle(&self) -> YielderHandle {
        self.yielder_handle.clone()
    }

    /// Create a Yield future that yields for just one quantum.
    pub async fn yield_once(&self) -> Result<(), Fail> {
        Yield::new(Some(1), self.yielder_handle.clone()).await
    }

    /// Create a Yield future that yields until woken with a signal.
    pub async fn yield_until_wake(&self) -> Result<(), Fail> {
        Yield::new(None, self.yielder_handle.clone()).await
    }
}

impl Yield {
    fn new(remaining_quanta: Option<usize>, yielder_handle: YielderHandle) -> Self {
        Self {
            remaining_quanta,
            yielder_handle,
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for YielderHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Yielder {
    fn default() -> Self {
        Self::new()
    }
}

impl Future for Yield {
    type Output = Result<(), Fail>;

    /// Suspends the coroutine until the wake budget is consumed or a wake signal arrives.
    fn poll(self: Pin<&mut Self>, context: &mut Context) -> Poll<Self::Output> {
        let self_: &mut Self = self.get_mut();

        // First check if we have been woken to do some work.
        if let Some(result) = self_.yielder_handle.get_result() {
            return Poll::Ready(result);
        }

        // Stash the waker so a wake signal can reschedule us.
        self_.yielder_handle.set_waker(context.waker().clone());

        // If we are waiting for a fixed number of quanta, burn one down and reschedule ourselves when it is spent.
        if let Some(quanta) = self_.remaining_quanta.as_mut() {
            *quanta -= 1;
            if *quanta == 0 {
                self_.yielder_handle.wake_with(Ok(()));
            } else {
                context.waker().wake_by_ref();
            }
        }

        Poll::Pending
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
