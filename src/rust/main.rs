// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::blinkos::{
    blink::{
        line::SharedOutputLine,
        worker::Worker,
    },
    runtime::{
        logging,
        semaphore::{
            create_serial_lock,
            SharedBinarySemaphore,
        },
        Runtime,
    },
    Config,
    SharedConsole,
};
use ::clap::{
    Arg,
    ArgMatches,
    Command,
};
use ::futures::FutureExt;
use ::std::{
    thread,
    time::Duration,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Wall-clock pacing of the demonstration: how long one scheduler tick lasts in real time.
const DEFAULT_TICK_PACING_MS: u64 = 1;

//======================================================================================================================
// Program Arguments
//======================================================================================================================

/// Program Arguments
#[derive(Debug)]
pub struct ProgramArguments {
    /// Path to an optional configuration file.
    config_path: Option<String>,
    /// Wall-clock duration of one scheduler tick, in milliseconds.
    tick_pacing: Duration,
}

impl ProgramArguments {
    /// Parses the program arguments from the command line interface.
    pub fn new() -> Result<Self> {
        let matches: ArgMatches = Command::new("blinkos")
            .about("Preemptive multitasking demonstration: two periodic workers share one console")
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("FILE")
                    .help("Sets configuration file"),
            )
            .arg(
                Arg::new("pacing")
                    .long("pacing")
                    .value_parser(clap::value_parser!(u64))
                    .required(false)
                    .value_name("MILLISECONDS")
                    .help("Sets wall-clock duration of one scheduler tick"),
            )
            .get_matches();

        let mut args: ProgramArguments = ProgramArguments {
            config_path: None,
            tick_pacing: Duration::from_millis(DEFAULT_TICK_PACING_MS),
        };

        if let Some(config_path) = matches.get_one::<String>("config") {
            args.config_path = Some(config_path.to_string());
        }

        if let Some(pacing) = matches.get_one::<u64>("pacing") {
            args.tick_pacing = Duration::from_millis(*pacing);
        }

        Ok(args)
    }

    pub fn get_config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    pub fn get_tick_pacing(&self) -> Duration {
        self.tick_pacing
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn main() -> Result<()> {
    logging::initialize();

    let args: ProgramArguments = ProgramArguments::new()?;
    let config: Config = match args.get_config_path() {
        Some(config_path) => Config::new(config_path)?,
        None => Config::default(),
    };

    // Bring up the console first and wait for it; nothing useful can happen without it.
    let console: SharedConsole = SharedConsole::stdout();
    console.wait_ready();

    let mut runtime: Runtime = Runtime::new();

    // The serial lock is created exactly once, before any worker runs.
    let mut lock_slot: Option<SharedBinarySemaphore> = None;
    let lock: SharedBinarySemaphore = create_serial_lock(&mut lock_slot, &runtime.get_clock());

    for settings in config.workers()? {
        let identity: String = settings.identity.clone();
        let priority: u8 = settings.priority;
        let stack_budget: usize = settings.stack_budget;
        let line: SharedOutputLine = SharedOutputLine::new(settings.line_label);
        let worker: Worker = Worker::new(settings, line, console.clone(), lock.clone(), runtime.get_clock());
        runtime.insert_worker(&identity, priority, stack_budget, |yielder| {
            Box::pin(worker.run(yielder).fuse())
        })?;
    }

    // From here on the initial context only drives the scheduler; it performs no further useful work. The loop runs
    // forever unless a worker terminates, which is fatal.
    let tick_pacing: Duration = args.get_tick_pacing();
    if tick_pacing.is_zero() {
        runtime.run()?;
    }
    loop {
        runtime.poll_and_advance_clock()?;
        thread::sleep(tick_pacing);
    }
}
