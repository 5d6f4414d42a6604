// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::SharedObject;
use ::std::ops::{
    Deref,
    DerefMut,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// State of an output line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LineState {
    Inactive,
    Active,
}

/// A logical boolean output line. Each worker drives exactly one of these; no read-back is required by workers, but
/// the state is observable for logging and tests.
pub struct OutputLine {
    /// Numeric label identifying the line.
    label: u8,
    state: LineState,
}

#[derive(Clone)]
pub struct SharedOutputLine(SharedObject<OutputLine>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedOutputLine {
    /// Creates a new output line in the inactive state.
    pub fn new(label: u8) -> Self {
        Self(SharedObject::<OutputLine>::new(OutputLine {
            label,
            state: LineState::Inactive,
        }))
    }

    pub fn set_active(&mut self) {
        debug!("set_active(): line={:?}", self.label);
        self.state = LineState::Active;
    }

    pub fn set_inactive(&mut self) {
        debug!("set_inactive(): line={:?}", self.label);
        self.state = LineState::Inactive;
    }

    pub fn is_active(&self) -> bool {
        self.state == LineState::Active
    }

    pub fn get_label(&self) -> u8 {
        self.label
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedOutputLine {
    type Target = OutputLine;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SharedOutputLine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
