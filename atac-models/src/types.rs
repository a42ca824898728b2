// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;

/// Linear index of a core in the mesh (row-major).
pub type CoreId = usize;

/// Linear index of a cluster in the cluster mesh (row-major).
pub type ClusterId = usize;

// Simulation errors

#[macro_export]
/// Build a [SimError] from a message that supports `to_string`
macro_rules! sim_error {
    ($msg:expr) => {
        Err($crate::types::SimError($msg.to_string()))
    };
}

/// The `SimError` is what should be returned in the case of an error
///
/// Every error raised by the models represents either an unusable
/// configuration or a corrupted packet, so the simulation should stop.
#[derive(Debug, PartialEq)]
pub struct SimError(pub String);

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl Error for SimError {}

/// The SimResult is the return type for most simulation functions
pub type SimResult = Result<(), SimError>;
