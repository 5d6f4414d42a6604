// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    blink::{
        console::SharedConsole,
        line::SharedOutputLine,
    },
    runtime::{
        clock::SharedTickClock,
        fail::Fail,
        scheduler::Yielder,
        semaphore::SharedBinarySemaphore,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Per-worker policy values, fixed at registration time.
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    /// Identity label used in status records and dispatch tracing.
    pub identity: String,
    /// Numeric label of the output line this worker drives.
    pub line_label: u8,
    /// Static priority, higher is more urgent.
    pub priority: u8,
    /// Fixed stack budget, accounted at registration time.
    pub stack_budget: usize,
    /// Ticks the output line stays active while holding the serial lock.
    pub active_hold: u64,
    /// Ticks the worker keeps holding the serial lock after writing its status record.
    pub idle_hold: u64,
    /// Bounded wait for acquiring the serial lock, in ticks.
    pub acquire_timeout: u64,
}

/// A periodic worker. Two of these are instantiated at startup, differing only in their settings; each runs a
/// perpetual cycle that contends for the serial lock, blinks its output line and emits one status record per
/// completed cycle.
pub struct Worker {
    settings: WorkerSettings,
    line: SharedOutputLine,
    console: SharedConsole,
    lock: SharedBinarySemaphore,
    clock: SharedTickClock,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Worker {
    /// Instantiates a new worker over its injected dependencies.
    pub fn new(
        settings: WorkerSettings,
        line: SharedOutputLine,
        console: SharedConsole,
        lock: SharedBinarySemaphore,
        clock: SharedTickClock,
    ) -> Self {
        Self {
            settings,
            line,
            console,
            lock,
            clock,
        }
    }

    /// The perpetual worker loop. Each cycle attempts to acquire the serial lock within the bounded wait; on success
    /// the worker blinks its line, writes its status record and releases the lock, and on a wait expiry it forfeits
    /// the cycle entirely. The loop never exits under normal operation; an error return is an unrecoverable fault.
    pub async fn run(mut self, yielder: Yielder) -> Result<(), Fail> {
        loop {
            if self.lock.acquire(self.settings.acquire_timeout).await? {
                self.line.set_active();
                self.clock.clone().wait(self.settings.active_hold, &yielder).await?;
                self.line.set_inactive();
                if let Err(e) = self.console.write_status(&self.settings.identity) {
                    self.console.write_fault(&self.settings.identity, &e);
                    return Err(e);
                }
                self.clock.clone().wait(self.settings.idle_hold, &yielder).await?;
                self.lock.release();
            } else {
                trace!("run(): wait expired, skipping cycle (identity={:?})", self.settings.identity);
            }

            // Give way for one quantum so this worker does not monopolize its priority band.
            yielder.yield_once().await?;
        }
    }
}
