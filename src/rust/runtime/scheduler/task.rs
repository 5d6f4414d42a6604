// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::futures::future::FusedFuture;
use ::std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{
        Context,
        Poll,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Externally visible task identifier.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug)]
pub struct TaskId(pub u64);

/// Task runs a single coroutine and carries the registration record the scheduler dispatches on: an identity label, a
/// static priority and a fixed stack budget. Thus, it implements Future but never directly returns anything.
pub trait Task: FusedFuture<Output = ()> + Unpin {
    fn get_name(&self) -> String;
    fn get_id(&self) -> TaskId;
    fn set_id(&mut self, id: TaskId);
    fn get_priority(&self) -> u8;
    fn get_stack_budget(&self) -> usize;
}

/// A worker task wraps a perpetual worker coroutine. The coroutine is expected to run forever; if it ever finishes,
/// the completion is recorded so the runtime can treat it as a fatal condition.
pub struct WorkerTask {
    /// Identity label, used for dispatch tracing and fatality reports.
    name: String,
    /// Task identifier.
    task_id: Option<TaskId>,
    /// Static priority, higher is more urgent.
    priority: u8,
    /// Fixed stack budget, accounted at registration time.
    stack_budget: usize,
    /// Underlying coroutine to run.
    coroutine: Pin<Box<dyn FusedFuture<Output = Result<(), Fail>>>>,
    /// Set once the coroutine finishes. A finished worker coroutine is a defect.
    result: Option<Result<(), Fail>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl WorkerTask {
    /// Instantiates a new worker task.
    pub fn new(
        name: String,
        priority: u8,
        stack_budget: usize,
        coroutine: Pin<Box<dyn FusedFuture<Output = Result<(), Fail>>>>,
    ) -> Self {
        Self {
            name,
            task_id: None,
            priority,
            stack_budget,
            coroutine,
            result: None,
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TaskId> for u64 {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Task for WorkerTask {
    fn get_name(&self) -> String {
        self.name.clone()
    }

    fn get_id(&self) -> TaskId {
        self.task_id.expect("should have this set immediately")
    }

    fn set_id(&mut self, id: TaskId) {
        self.task_id = Some(id);
    }

    fn get_priority(&self) -> u8 {
        self.priority
    }

    fn get_stack_budget(&self) -> usize {
        self.stack_budget
    }
}

/// The Future trait for worker tasks.
impl Future for WorkerTask {
    type Output = ();

    /// Polls the coroutine.
    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<()> {
        let self_: &mut Self = self.get_mut();
        if self_.result.is_some() {
            return Poll::Ready(());
        }
        let result: Result<(), Fail> = match Future::poll(self_.coroutine.as_mut(), ctx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(r) => r,
        };
        match &result {
            Ok(()) => error!("poll(): worker {:?} returned from its loop", self_.name),
            Err(e) => error!("poll(): worker {:?} failed: {:?}", self_.name, e),
        }
        self_.result = Some(result);
        Poll::Ready(())
    }
}

impl FusedFuture for WorkerTask {
    fn is_terminated(&self) -> bool {
        self.result.is_some()
    }
}
