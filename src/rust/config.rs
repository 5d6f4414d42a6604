// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    blink::worker::WorkerSettings,
    runtime::fail::Fail,
};
use ::std::fs;
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Demonstration options. All of them are optional; defaults below apply when a key or the whole file is absent.
mod blink_config {
    pub const SECTION_NAME: &str = "blinkos";
    // Ticks the output line stays active while holding the serial lock.
    pub const ACTIVE_HOLD: &str = "active_hold";
    // Ticks a worker keeps holding the serial lock after writing its status record.
    pub const IDLE_HOLD: &str = "idle_hold";
    // Bounded wait for acquiring the serial lock, in scheduler ticks.
    pub const ACQUIRE_TIMEOUT: &str = "acquire_timeout";
    // Fixed stack budget accounted per worker.
    pub const STACK_BUDGET: &str = "stack_budget";
    // Per-worker overrides, keyed by identity.
    pub const WORKERS: &str = "workers";
    pub const PRIORITY: &str = "priority";
    pub const LINE: &str = "line";
}

/// Default policy values, recognized at startup.
const DEFAULT_ACTIVE_HOLD: u64 = 1000;
const DEFAULT_IDLE_HOLD: u64 = 1000;
const DEFAULT_ACQUIRE_TIMEOUT: u64 = 5;
const DEFAULT_STACK_BUDGET: usize = 128;

/// The two workers of the demonstration: identity, static priority and output line label.
const DEFAULT_WORKERS: [(&str, u8, u8); 2] = [("green", 2, 13), ("red", 1, 12)];

//======================================================================================================================
// Structures
//======================================================================================================================

/// Demonstration configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let config_s: String = fs::read_to_string(config_path)?;
        Self::from_yaml(&config_s)
    }

    /// Parses a configuration document.
    pub fn from_yaml(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("malformed configuration: {:?}", e);
                error!("from_yaml(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        let config_obj: &Yaml = match &config[..] {
            &[ref c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "wrong number of config objects")),
        };

        Ok(Self(config_obj.clone()))
    }

    /// Builds the settings of every worker of the demonstration, applying per-worker overrides from the
    /// configuration on top of the defaults.
    pub fn workers(&self) -> Result<Vec<WorkerSettings>, Fail> {
        let active_hold: u64 = self.active_hold()?;
        let idle_hold: u64 = self.idle_hold()?;
        let acquire_timeout: u64 = self.acquire_timeout()?;
        let stack_budget: usize = self.stack_budget()?;

        let mut workers: Vec<WorkerSettings> = Vec::with_capacity(DEFAULT_WORKERS.len());
        for (identity, default_priority, default_line) in DEFAULT_WORKERS {
            let overrides: &Yaml = &self.get_blink_config()[blink_config::WORKERS][identity];
            let priority: u8 = Self::get_int_option(overrides, blink_config::PRIORITY)?
                .map(|value| Self::narrow::<u8>(value, blink_config::PRIORITY))
                .transpose()?
                .unwrap_or(default_priority);
            let line_label: u8 = Self::get_int_option(overrides, blink_config::LINE)?
                .map(|value| Self::narrow::<u8>(value, blink_config::LINE))
                .transpose()?
                .unwrap_or(default_line);
            workers.push(WorkerSettings {
                identity: identity.to_string(),
                line_label,
                priority,
                stack_budget,
                active_hold,
                idle_hold,
                acquire_timeout,
            });
        }
        Ok(workers)
    }

    pub fn active_hold(&self) -> Result<u64, Fail> {
        self.get_tick_count(blink_config::ACTIVE_HOLD, DEFAULT_ACTIVE_HOLD)
    }

    pub fn idle_hold(&self) -> Result<u64, Fail> {
        self.get_tick_count(blink_config::IDLE_HOLD, DEFAULT_IDLE_HOLD)
    }

    pub fn acquire_timeout(&self) -> Result<u64, Fail> {
        self.get_tick_count(blink_config::ACQUIRE_TIMEOUT, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn stack_budget(&self) -> Result<usize, Fail> {
        match Self::get_int_option(self.get_blink_config(), blink_config::STACK_BUDGET)? {
            Some(value) if value > 0 => Ok(value as usize),
            Some(_) => Err(Fail::new(libc::EINVAL, "stack budget must be positive")),
            None => Ok(DEFAULT_STACK_BUDGET),
        }
    }

    fn get_blink_config(&self) -> &Yaml {
        &self.0[blink_config::SECTION_NAME]
    }

    fn get_tick_count(&self, key: &str, default: u64) -> Result<u64, Fail> {
        match Self::get_int_option(self.get_blink_config(), key)? {
            Some(value) if value >= 0 => Ok(value as u64),
            Some(_) => {
                let cause: String = format!("tick count cannot be negative (key={:?})", key);
                error!("get_tick_count(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
            None => Ok(default),
        }
    }

    /// Looks up an optional integer `key` in `section`. An absent key is not an error; a present key of the wrong
    /// type is.
    fn get_int_option(section: &Yaml, key: &str) -> Result<Option<i64>, Fail> {
        match &section[key] {
            Yaml::BadValue => Ok(None),
            Yaml::Integer(value) => Ok(Some(*value)),
            _ => {
                let cause: String = format!("configuration key is not an integer (key={:?})", key);
                error!("get_int_option(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }

    fn narrow<T: TryFrom<i64>>(value: i64, key: &str) -> Result<T, Fail> {
        T::try_from(value).map_err(|_| {
            let cause: String = format!("configuration value is out of range (key={:?})", key);
            error!("narrow(): {}", cause);
            Fail::new(libc::EINVAL, &cause)
        })
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Config {
    /// A configuration carrying only the built-in defaults.
    fn default() -> Self {
        Self(Yaml::Null)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
