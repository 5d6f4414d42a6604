// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    SharedObject,
};
use ::std::{
    io,
    io::Write,
    ops::{
        Deref,
        DerefMut,
    },
    thread,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// The console is the single serializable output channel of the demonstration. It is owned collectively: access is
/// serialized by the serial lock, not by the console itself, and it must only be written while holding that lock.
pub struct Console {
    /// Underlying byte sink.
    sink: Box<dyn Write>,
    /// Set once the channel is connected and ready for use.
    connected: bool,
}

#[derive(Clone)]
pub struct SharedConsole(SharedObject<Console>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedConsole {
    /// Creates a console over an arbitrary sink. The console starts out disconnected; see [connect](Self::connect).
    pub fn new(sink: Box<dyn Write>) -> Self {
        Self(SharedObject::<Console>::new(Console {
            sink,
            connected: false,
        }))
    }

    /// Creates a console over the standard output of the process, already connected.
    pub fn stdout() -> Self {
        let mut console: Self = Self::new(Box::new(io::stdout()));
        console.connect();
        console
    }

    /// Marks the channel as connected.
    pub fn connect(&mut self) {
        self.connected = true;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Blocks until the console is connected. Nothing useful can happen without the console, so startup waits here
    /// rather than proceeding; there is no retry or back-off policy.
    pub fn wait_ready(&self) {
        while !self.is_connected() {
            thread::yield_now();
        }
    }

    /// Writes one status record for a completed cycle. The record is emitted as a single line and is never
    /// interleaved with records of other workers because callers hold the serial lock.
    pub fn write_status(&mut self, identity: &str) -> Result<(), Fail> {
        if !self.connected {
            let cause: String = format!("console is not connected (identity={:?})", identity);
            error!("write_status(): {}", cause);
            return Err(Fail::new(libc::ENOTCONN, &cause));
        }
        writeln!(self.sink, "{} has completed a cycle", identity)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Reports an unrecoverable worker fault through the console, best effort. The fault is always logged; if the
    /// sink itself is unusable there is nothing further to do.
    pub fn write_fault(&mut self, identity: &str, fault: &Fail) {
        error!("write_fault(): identity={:?}, fault={:?}", identity, fault);
        if self.connected {
            let _ = writeln!(self.sink, "{} has failed: {}", identity, fault);
            let _ = self.sink.flush();
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedConsole {
    type Target = Console;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SharedConsole {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::SharedConsole;
    use crate::runtime::SharedObject;
    use ::anyhow::Result;
    use ::std::io;

    /// A sink that retains everything written to it, observable through a shared handle.
    #[derive(Clone)]
    struct CaptureSink(SharedObject<Vec<u8>>);

    impl io::Write for CaptureSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            use std::ops::DerefMut;
            self.0.deref_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_writes_one_status_record_per_cycle() -> Result<()> {
        let buffer: SharedObject<Vec<u8>> = SharedObject::new(Vec::new());
        let mut console: SharedConsole = SharedConsole::new(Box::new(CaptureSink(buffer.clone())));
        console.connect();

        console.write_status("green")?;

        let output: String = String::from_utf8(buffer.to_vec())?;
        crate::ensure_eq!(output, "green has completed a cycle\n".to_string());

        Ok(())
    }

    #[test]
    fn test_console_rejects_writes_before_connection() -> Result<()> {
        let buffer: SharedObject<Vec<u8>> = SharedObject::new(Vec::new());
        let mut console: SharedConsole = SharedConsole::new(Box::new(CaptureSink(buffer.clone())));

        crate::ensure_eq!(console.is_connected(), false);
        crate::ensure_eq!(console.write_status("green").is_err(), true);
        crate::ensure_eq!(buffer.is_empty(), true);

        Ok(())
    }
}
