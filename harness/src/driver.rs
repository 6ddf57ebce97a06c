// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The simulation control loop: seeding, the reset sequence, the clocked main
//! loop, and the mapping from outcome to exit status.

use std::{
    fmt,
    io::{self, Write},
    process::ExitCode,
};

use awl_verilator::{Dut, EvaluationHost, HostError};
use snafu::{ResultExt, Snafu};

use crate::{HarnessOptions, RunContext};

/// Clock periods reset is held for. This must cover the deepest pipelined
/// reset in the harness so that every flip-flop captures reset at least once;
/// a model with a deeper reset chain needs a larger bound.
pub const RESET_CYCLES: u64 = 10;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The model asserted success within the cycle budget.
    Passed,
    /// The cycle budget ran out first.
    TimedOut,
}

impl Outcome {
    /// The process exit status for this outcome.
    pub fn exit_status(self) -> u8 {
        match self {
            Outcome::Passed => 0,
            Outcome::TimedOut => 2,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => "passed",
            Outcome::TimedOut => "timed out",
        }
        .fmt(f)
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.exit_status())
    }
}

/// The result of [`Driver::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub outcome: Outcome,
    pub context: RunContext,
}

impl Report {
    /// Post-reset clock periods driven before the run ended.
    pub fn cycles(&self) -> u64 {
        self.context.elapsed()
    }

    pub fn exit_code(&self) -> ExitCode {
        self.outcome.into()
    }
}

/// Harness run error. None of these are simulation outcomes: they happen
/// while setting up the host.
#[derive(Debug, Snafu)]
pub enum HarnessError {
    #[snafu(display("Failed to pass host arguments to the evaluation host"))]
    HostArguments { source: HostError },
    #[snafu(display("Failed to instantiate the device under test"))]
    Instantiate { source: HostError },
}

/// Drives one clock period: clock low, evaluate, clock high, evaluate. The
/// period is then counted and published as the model's time.
pub fn clock_period<D: Dut + ?Sized>(dut: &mut D, context: &mut RunContext) {
    dut.set_clock(false);
    dut.eval();
    dut.set_clock(true);
    dut.eval();
    context.advance();
    dut.set_time(context.timestamp());
}

/// Holds reset for [`RESET_CYCLES`] clock periods, then releases it. Runs once
/// per model.
pub fn reset_sequence<D: Dut + ?Sized>(dut: &mut D, context: &mut RunContext) {
    debug_assert!(!context.reset_done(), "reset sequence already ran");
    for _ in 0..RESET_CYCLES {
        dut.set_reset(true);
        clock_period(dut, context);
    }
    dut.set_reset(false);
    context.release_reset();
}

/// Clocks the model with reset deasserted until it asserts success or
/// `max_cycles` post-reset periods have passed.
///
/// Exhausting the budget is checked first, so a model that first asserts
/// success on period `max_cycles` still times out.
pub fn simulate<D: Dut + ?Sized>(
    dut: &mut D,
    context: &mut RunContext,
    max_cycles: u64,
) -> Outcome {
    debug_assert!(context.reset_done(), "simulating before reset");
    while !dut.success() && context.elapsed() < max_cycles {
        clock_period(dut, context);
    }

    if context.elapsed() == max_cycles {
        Outcome::TimedOut
    } else {
        Outcome::Passed
    }
}

/// Runs a single harness simulation against models from an
/// [`EvaluationHost`], writing diagnostics to `W`.
pub struct Driver<H, W = io::Stderr> {
    host: H,
    options: HarnessOptions,
    context: RunContext,
    diagnostics: W,
}

impl<H: EvaluationHost> Driver<H> {
    /// A driver that writes diagnostics to standard error.
    pub fn new(host: H, options: HarnessOptions) -> Self {
        Self::with_diagnostics(host, options, io::stderr())
    }
}

impl<H: EvaluationHost, W: Write> Driver<H, W> {
    pub fn with_diagnostics(
        host: H,
        options: HarnessOptions,
        diagnostics: W,
    ) -> Self {
        Self {
            context: RunContext::new(options.verbose),
            host,
            options,
            diagnostics,
        }
    }

    /// Seeds the host, constructs the model, resets it, and simulates it to
    /// completion. The model is released before this returns on every path.
    ///
    /// Failing to write a diagnostic does not change the outcome; the failure
    /// is logged instead.
    pub fn run(mut self) -> Result<Report, HarnessError> {
        let seed = self.options.random_seed;
        if self.context.verbose() {
            let written =
                writeln!(self.diagnostics, "using random seed {seed}");
            warn_unwritten(written);
        }
        if self.options.log {
            log::info!("Seeding evaluation host with {}", seed);
        }
        self.host.seed_random(seed);
        self.host.set_random_reset(self.options.random_reset);
        self.host
            .command_args(&self.options.host_arguments)
            .context(HostArgumentsSnafu)?;

        let outcome = {
            let mut dut = self.host.instantiate().context(InstantiateSnafu)?;

            if self.options.log {
                log::info!("Holding reset for {} cycles", RESET_CYCLES);
            }
            reset_sequence(&mut dut, &mut self.context);

            if self.options.log {
                log::info!(
                    "Reset released, simulating for up to {} cycles",
                    self.options.max_cycles
                );
            }
            let outcome =
                simulate(&mut dut, &mut self.context, self.options.max_cycles);

            warn_unwritten(report_outcome(
                &mut self.diagnostics,
                outcome,
                seed,
                self.context.elapsed(),
                self.context.verbose(),
            ));

            outcome
        };

        if self.options.log {
            log::info!(
                "Run {} after {} cycles ({} including reset)",
                outcome,
                self.context.elapsed(),
                self.context.timestamp()
            );
        }

        Ok(Report {
            outcome,
            context: self.context,
        })
    }
}

fn warn_unwritten(result: io::Result<()>) {
    if let Err(error) = result {
        log::warn!("Failed to write to the diagnostics stream: {}", error);
    }
}

fn report_outcome<W: Write>(
    diagnostics: &mut W,
    outcome: Outcome,
    seed: u32,
    cycles: u64,
    verbose: bool,
) -> io::Result<()> {
    match outcome {
        Outcome::TimedOut => writeln!(
            diagnostics,
            "*** FAILED *** via trace_count (timeout, seed {seed}) after {cycles} cycles"
        ),
        Outcome::Passed if verbose => writeln!(
            diagnostics,
            "*** PASSED *** Completed after {cycles} cycles"
        ),
        Outcome::Passed => Ok(()),
    }
}
