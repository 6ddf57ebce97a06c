// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! This module implements the evaluation host boundary for clocked test
//! harnesses: the [`Dut`] and [`EvaluationHost`] traits every model binds to,
//! and [`VerilatorHost`], which binds them to a Verilator model loaded from a
//! shared library.
//!
//! The library must be built from the Verilated top module together with the
//! FFI wrappers produced by [`shim::generate_shim`].

use std::fmt;

use camino::Utf8PathBuf;
use snafu::Snafu;

mod host;
pub mod seed;
pub mod shim;

pub use host::{HarnessModel, VerilatorHost, VerilatorHostOptions};

/// Verilator-defined types for C FFI.
pub mod types {
    /// From the Verilator documentation: "Data representing 'bit' of 1-8 packed
    /// bits."
    pub type CData = u8;
}

/// <https://www.digikey.com/en/maker/blogs/2024/verilog-ports-part-7-of-our-verilog-journey>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
        .fmt(f)
    }
}

/// Names of the single-bit ports the driver touches on the top module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessPorts {
    pub clock: String,
    pub reset: String,
    pub success: String,
}

impl Default for HarnessPorts {
    fn default() -> Self {
        Self {
            clock: "clock".into(),
            reset: "reset".into(),
            success: "io_success".into(),
        }
    }
}

impl HarnessPorts {
    /// The ports alongside their direction, in the order the shim emits them.
    pub fn signature(&self) -> [(&str, PortDirection); 3] {
        [
            (self.clock.as_str(), PortDirection::Input),
            (self.reset.as_str(), PortDirection::Input),
            (self.success.as_str(), PortDirection::Output),
        ]
    }
}

/// Initial value policy for registers that are not explicitly reset, as
/// understood by `Verilated::randReset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RandomReset {
    Zeros = 0,
    Ones = 1,
    #[default]
    Randomized = 2,
}

impl RandomReset {
    /// The policy id passed across FFI.
    pub fn policy_id(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for RandomReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandomReset::Zeros => "zeros",
            RandomReset::Ones => "ones",
            RandomReset::Randomized => "randomized",
        }
        .fmt(f)
    }
}

impl std::str::FromStr for RandomReset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zeros" | "0" => Ok(RandomReset::Zeros),
            "ones" | "1" => Ok(RandomReset::Ones),
            "randomized" | "2" => Ok(RandomReset::Randomized),
            other => Err(format!(
                "unknown random reset policy `{other}` (expected zeros, ones, or randomized)"
            )),
        }
    }
}

/// A device under test: an instantiated, exclusively-owned hardware model.
///
/// The model is released when dropped.
pub trait Dut {
    /// Drives the clock input.
    fn set_clock(&mut self, value: bool);

    /// Drives the reset input.
    fn set_reset(&mut self, value: bool);

    /// Reads the success output as of the last [`Dut::eval`].
    fn success(&self) -> bool;

    /// Equivalent to the Verilator `eval` method.
    fn eval(&mut self);

    /// Publishes the current cycle count as simulated time.
    fn set_time(&mut self, _cycle: u64) {}
}

/// The environment a [`Dut`] is evaluated in.
pub trait EvaluationHost {
    type Model<'host>: Dut
    where
        Self: 'host;

    /// Seeds the pseudo-random generators the model consumes.
    fn seed_random(&mut self, seed: u32);

    /// Chooses how registers without an explicit reset are initialized.
    fn set_random_reset(&mut self, policy: RandomReset);

    /// Hands process-level arguments (e.g. `+plusargs`) to the host. The
    /// first argument is the program name.
    fn command_args(&mut self, arguments: &[String]) -> Result<(), HostError>;

    /// Constructs a fresh model.
    fn instantiate(&mut self) -> Result<Self::Model<'_>, HostError>;
}

/// Evaluation host setup error.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HostError {
    #[snafu(display("Failed to load model library {path}"))]
    LoadLibrary {
        path: Utf8PathBuf,
        source: libloading::Error,
    },
    #[snafu(display(
        "Symbol {symbol} not found in model library: was it built with the shim for top module {top_module}?"
    ))]
    MissingSymbol {
        top_module: String,
        symbol: String,
        source: libloading::Error,
    },
    #[snafu(display(
        "Host argument {argument:?} contains an interior nul byte"
    ))]
    InvalidArgument {
        argument: String,
        source: std::ffi::NulError,
    },
}
