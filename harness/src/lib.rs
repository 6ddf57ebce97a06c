// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The harness driver for clocked test harnesses.
//!
//! A [`Driver`] seeds its [`EvaluationHost`](awl_verilator::EvaluationHost),
//! constructs one model, holds reset for [`RESET_CYCLES`] clock periods, and
//! then clocks the model until it raises its success output or the cycle
//! budget in [`HarnessOptions`] runs out. The resulting [`Outcome`] maps to a
//! process exit status: 0 on success, 2 on timeout.
//!
//! ```no_run
//! use awl_harness::{Driver, HarnessOptions};
//! use awl_verilator::{HarnessPorts, VerilatorHost, VerilatorHostOptions};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let host = VerilatorHost::open(
//!     "obj_dir/libVTestHarness_dyn.so".into(),
//!     "TestHarness",
//!     &HarnessPorts::default(),
//!     VerilatorHostOptions::default(),
//! )?;
//! let report = Driver::new(host, HarnessOptions::default()).run()?;
//! std::process::exit(report.outcome.exit_status().into());
//! # }
//! ```

mod context;
mod driver;
mod options;
pub mod stub;

pub use context::RunContext;
pub use driver::{
    Driver, HarnessError, Outcome, RESET_CYCLES, Report, clock_period,
    reset_sequence, simulate,
};
pub use options::{
    ConfigError, DEFAULT_MAX_CYCLES, DEFAULT_RANDOM_SEED, HarnessOptions,
};
