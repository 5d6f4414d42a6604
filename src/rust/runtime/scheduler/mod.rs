// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod scheduler;
mod task;
mod yielder;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    scheduler::Scheduler,
    task::{
        Task,
        TaskId,
        WorkerTask,
    },
    yielder::{
        Yielder,
        YielderHandle,
    },
};
