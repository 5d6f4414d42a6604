// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod blink;
pub mod config;
pub mod runtime;

pub use crate::{
    blink::{
        console::SharedConsole,
        line::SharedOutputLine,
        worker::Worker,
    },
    config::Config,
    runtime::{
        semaphore::SharedBinarySemaphore,
        Runtime,
    },
};

//======================================================================================================================
// Macros
//======================================================================================================================

/// Ensures that two expressions are equal, bailing out of the calling test otherwise.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => {{
        let left = &$left;
        let right = &$right;
        if left != right {
            anyhow::bail!(
                "ensure_eq!({}, {}) failed: {:?} != {:?}",
                stringify!($left),
                stringify!($right),
                left,
                right
            );
        }
    }};
}

/// Ensures that two expressions are not equal, bailing out of the calling test otherwise.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr) => {{
        let left = &$left;
        let right = &$right;
        if left == right {
            anyhow::bail!(
                "ensure_neq!({}, {}) failed: {:?} == {:?}",
                stringify!($left),
                stringify!($right),
                left,
                right
            );
        }
    }};
}
