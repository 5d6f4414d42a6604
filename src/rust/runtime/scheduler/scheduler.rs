// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Implementation of our single-threaded, priority-based task scheduler.
//!
//! Tasks live in a slab and carry a notification flag that doubles as their waker. Each quantum the scheduler
//! dispatches the highest-priority notified task; notified tasks of equal priority are served round-robin.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::scheduler::{
    Task,
    TaskId,
};
use ::futures::task::{
    waker,
    ArcWake,
};
use ::slab::Slab;
use ::std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
    task::{
        Context,
        Poll,
        Waker,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Maximum number of tasks that can be registered with one scheduler.
const MAX_TASKS: usize = 64;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Notification flag shared between a task's waker and the scheduler. A set flag marks the task runnable.
struct TaskNotifier {
    notified: AtomicBool,
}

/// Bookkeeping for a single registered task.
struct TaskEntry {
    task: Box<dyn Task>,
    notifier: Arc<TaskNotifier>,
}

/// Task Scheduler
pub struct Scheduler {
    /// Stores all the tasks that are held by the scheduler.
    tasks: Slab<TaskEntry>,
    /// Source of external task ids.
    next_task_id: u64,
    /// Slot of the last dispatched task. Round-robin rotation starts right after it.
    last_dispatched: usize,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl TaskNotifier {
    fn new() -> Self {
        // Tasks start out notified so they get dispatched at least once.
        Self {
            notified: AtomicBool::new(true),
        }
    }

    fn is_notified(&self) -> bool {
        self.notified.load(Ordering::SeqCst)
    }

    fn take_notified(&self) -> bool {
        self.notified.swap(false, Ordering::SeqCst)
    }
}

impl Scheduler {
    /// Insert a new task into our scheduler returning an identifier corresponding to it.
    pub fn insert_task<T: Task + 'static>(&mut self, task: T) -> Option<TaskId> {
        if self.tasks.len() >= MAX_TASKS {
            warn!("insert_task(): too many tasks (name={:?})", task.get_name());
            return None;
        }

        let task_name: String = task.get_name();
        let slot: usize = self.tasks.insert(TaskEntry {
            task: Box::new(task),
            notifier: Arc::new(TaskNotifier::new()),
        });
        let task_id: TaskId = TaskId(self.next_task_id);
        self.next_task_id += 1;

        let entry: &mut TaskEntry = self.tasks.get_mut(slot).expect("just allocated!");
        entry.task.set_id(task_id);

        trace!(
            "insert_task(): name={:?}, id={:?}, priority={:?}, stack_budget={:?}, slot={:?}",
            task_name,
            task_id,
            entry.task.get_priority(),
            entry.task.get_stack_budget(),
            slot
        );
        Some(task_id)
    }

    /// Runs one scheduling quantum: dispatches the highest-priority notified task, if any, and polls it once. A task
    /// that completes is unregistered and handed back to the caller; worker tasks are perpetual, so the caller treats
    /// a returned task as a fatal condition.
    pub fn poll_quantum(&mut self) -> Option<Box<dyn Task>> {
        let slot: usize = self.next_ready_slot()?;
        self.last_dispatched = slot;

        let poll_result: Poll<()> = {
            let entry: &mut TaskEntry = self.tasks.get_mut(slot).expect("slot comes from iteration");
            entry.notifier.take_notified();
            let task_waker: Waker = waker(entry.notifier.clone());
            let mut context: Context = Context::from_waker(&task_waker);
            Future::poll(Pin::new(&mut entry.task), &mut context)
        };

        match poll_result {
            Poll::Ready(()) => {
                let entry: TaskEntry = self.tasks.remove(slot);
                trace!(
                    "poll_quantum(): task completed: name={:?}, id={:?}",
                    entry.task.get_name(),
                    entry.task.get_id()
                );
                Some(entry.task)
            },
            Poll::Pending => None,
        }
    }

    /// Picks the slot to dispatch next: the highest-priority notified task, rotating among equals so that none of them
    /// monopolizes its priority band.
    fn next_ready_slot(&self) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        for (slot, entry) in self.tasks.iter() {
            if !entry.notifier.is_notified() {
                continue;
            }
            let priority: u8 = entry.task.get_priority();
            best = match best {
                None => Some((slot, priority)),
                Some((best_slot, best_priority)) => {
                    if priority > best_priority
                        || (priority == best_priority && self.rotation_rank(slot) < self.rotation_rank(best_slot))
                    {
                        Some((slot, priority))
                    } else {
                        Some((best_slot, best_priority))
                    }
                },
            };
        }
        best.map(|(slot, _)| slot)
    }

    /// Rank of a slot in round-robin order: slots after the last dispatched one come first.
    fn rotation_rank(&self, slot: usize) -> (bool, usize) {
        (slot <= self.last_dispatched, slot)
    }

    /// Checks whether any task is currently notified.
    pub fn has_ready_tasks(&self) -> bool {
        self.tasks.iter().any(|(_, entry)| entry.notifier.is_notified())
    }

    /// Number of registered tasks.
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl ArcWake for TaskNotifier {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.notified.store(true, Ordering::SeqCst);
    }
}

impl Default for Scheduler {
    /// Creates a scheduler with no registered tasks.
    fn default() -> Self {
        Self {
            tasks: Slab::new(),
            next_task_id: 0,
            // Rotation starts from slot zero on the first dispatch.
            last_dispatched: usize::MAX,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
