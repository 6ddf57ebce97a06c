// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    env,
    io::{self, Write},
    panic::{self, AssertUnwindSafe},
};

use awl_harness::{
    Driver, HarnessOptions, Outcome, RESET_CYCLES, Report,
    stub::{Probe, Script, ScriptedHost},
};
use awl_verilator::RandomReset;
use snafu::{ResultExt, Whatever};

fn run_script(
    script: Script,
    options: HarnessOptions,
) -> Result<(Report, Probe, String), Whatever> {
    if env::var("RUST_LOG").is_ok() {
        let _ = env_logger::try_init();
    }

    let host = ScriptedHost::new(script);
    let probe = host.probe();
    let mut diagnostics = vec![];
    let report = Driver::with_diagnostics(host, options, &mut diagnostics)
        .run()
        .whatever_context("Harness run failed")?;
    let diagnostics = String::from_utf8(diagnostics)
        .whatever_context("Diagnostics were not UTF-8")?;
    Ok((report, probe, diagnostics))
}

fn with_budget(max_cycles: u64) -> HarnessOptions {
    HarnessOptions {
        max_cycles,
        ..HarnessOptions::default_logging()
    }
}

#[test]
fn never_succeeding_model_times_out_after_the_budget() -> Result<(), Whatever> {
    let (report, probe, diagnostics) =
        run_script(Script::never_succeeds(), with_budget(1000))?;
    let state = probe.snapshot();

    assert_eq!(report.outcome, Outcome::TimedOut);
    assert_eq!(report.outcome.exit_status(), 2);
    assert_eq!(report.cycles(), 1000);
    assert_eq!(state.rising_edges, RESET_CYCLES + 1000);
    assert_eq!(state.reset_edges, RESET_CYCLES);
    assert_eq!(state.evaluations, 2 * (RESET_CYCLES + 1000));
    assert_eq!(
        diagnostics,
        "*** FAILED *** via trace_count (timeout, seed 3) after 1000 cycles\n"
    );

    Ok(())
}

#[test]
fn success_on_first_period_after_reset() -> Result<(), Whatever> {
    let (report, probe, diagnostics) =
        run_script(Script::succeeds_at(1), with_budget(1000))?;

    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(report.outcome.exit_status(), 0);
    assert_eq!(report.cycles(), 1);
    assert_eq!(probe.snapshot().rising_edges, RESET_CYCLES + 1);
    assert!(diagnostics.is_empty());

    Ok(())
}

#[test]
fn quiet_pass_exits_zero_without_diagnostics() -> Result<(), Whatever> {
    let (report, _, diagnostics) =
        run_script(Script::succeeds_at(40), HarnessOptions::default())?;

    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(report.outcome.exit_status(), 0);
    assert_eq!(report.cycles(), 40);
    assert_eq!(diagnostics, "");

    Ok(())
}

#[test]
fn verbose_pass_reports_seed_and_cycles() -> Result<(), Whatever> {
    let options = HarnessOptions {
        random_seed: 17,
        verbose: true,
        ..HarnessOptions::default()
    };
    let (report, _, diagnostics) =
        run_script(Script::succeeds_at(25), options)?;

    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(
        diagnostics,
        "using random seed 17\n*** PASSED *** Completed after 25 cycles\n"
    );

    Ok(())
}

#[test]
fn verbose_timeout_reports_seed_then_failure() -> Result<(), Whatever> {
    let options = HarnessOptions {
        max_cycles: 8,
        verbose: true,
        ..HarnessOptions::default()
    };
    let (_, _, diagnostics) =
        run_script(Script::never_succeeds(), options)?;

    assert_eq!(
        diagnostics,
        "using random seed 3\n*** FAILED *** via trace_count (timeout, seed 3) after 8 cycles\n"
    );

    Ok(())
}

// Timeout is tested before success, so success that first appears on the
// last budgeted period does not count.
#[test]
fn success_on_the_last_budgeted_period_times_out() -> Result<(), Whatever> {
    let (report, probe, _) =
        run_script(Script::succeeds_at(5), with_budget(5))?;

    assert_eq!(report.outcome, Outcome::TimedOut);
    assert_eq!(report.outcome.exit_status(), 2);
    assert_eq!(report.cycles(), 5);
    assert_eq!(probe.snapshot().rising_edges, RESET_CYCLES + 5);

    Ok(())
}

#[test]
fn success_one_period_before_the_budget_passes() -> Result<(), Whatever> {
    let (report, _, _) = run_script(Script::succeeds_at(4), with_budget(5))?;

    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(report.cycles(), 4);

    Ok(())
}

#[test]
fn zero_budget_times_out_without_clocking() -> Result<(), Whatever> {
    let (report, probe, _) =
        run_script(Script::succeeds_at(1), with_budget(0))?;

    assert_eq!(report.outcome, Outcome::TimedOut);
    assert_eq!(report.cycles(), 0);
    assert_eq!(probe.snapshot().rising_edges, RESET_CYCLES);

    Ok(())
}

#[test]
fn reset_periods_advance_time_but_not_the_budget() -> Result<(), Whatever> {
    let (report, probe, _) =
        run_script(Script::succeeds_at(7), with_budget(100))?;

    assert!(report.context.reset_done());
    assert_eq!(report.context.elapsed(), 7);
    assert_eq!(report.context.timestamp(), RESET_CYCLES + 7);
    assert_eq!(probe.snapshot().last_time, RESET_CYCLES + 7);

    Ok(())
}

#[test]
fn host_is_configured_before_instantiation() -> Result<(), Whatever> {
    let options = HarnessOptions {
        random_seed: 99,
        random_reset: RandomReset::Ones,
        host_arguments: vec!["awl".into(), "+verbose".into()],
        ..HarnessOptions::default()
    };
    let (_, probe, _) = run_script(Script::succeeds_at(1), options)?;
    let state = probe.snapshot();

    assert_eq!(state.seed, Some(99));
    assert_eq!(state.random_reset, Some(RandomReset::Ones));
    assert_eq!(state.host_arguments, ["awl", "+verbose"]);
    assert_eq!(state.instantiations, 1);

    Ok(())
}

#[test]
fn same_seed_same_run() -> Result<(), Whatever> {
    for seed in [0, 3, 12345, u32::MAX] {
        let options = HarnessOptions {
            random_seed: seed,
            max_cycles: 500,
            ..HarnessOptions::default()
        };
        let (first, first_probe, first_diagnostics) =
            run_script(Script::succeeds_randomly(1000), options.clone())?;
        let (second, second_probe, second_diagnostics) =
            run_script(Script::succeeds_randomly(1000), options)?;

        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.cycles(), second.cycles());
        assert_eq!(first_diagnostics, second_diagnostics);
        assert_eq!(first_probe.snapshot(), second_probe.snapshot());
    }

    Ok(())
}

#[test]
fn seed_changes_the_scripted_success_cycle() -> Result<(), Whatever> {
    let mut success_cycles = vec![];
    for seed in 0..16 {
        let options = HarnessOptions {
            random_seed: seed,
            ..HarnessOptions::default()
        };
        let (report, probe, _) =
            run_script(Script::succeeds_randomly(100_000), options)?;
        assert_eq!(Some(report.cycles()), probe.snapshot().success_at);
        success_cycles.push(report.cycles());
    }

    success_cycles.sort_unstable();
    success_cycles.dedup();
    assert!(success_cycles.len() > 1);

    Ok(())
}

macro_rules! reset_depth_test {
    ($name:ident, $depth:expr, $covered:expr) => {
        #[test]
        fn $name() -> Result<(), Whatever> {
            let options = HarnessOptions {
                random_reset: RandomReset::Ones,
                ..HarnessOptions::default()
            };
            let (_, probe, _) = run_script(
                Script::succeeds_at(1).with_reset_depth($depth),
                options,
            )?;
            let state = probe.snapshot();

            assert_eq!(state.reset_covered, Some($covered));
            assert_eq!(
                state.registers_at_release.iter().all(|register| *register == 0),
                $covered
            );

            Ok(())
        }
    };
}

reset_depth_test!(reset_reaches_depth_1, 1, true);
reset_depth_test!(reset_reaches_depth_2, 2, true);
reset_depth_test!(reset_reaches_depth_3, 3, true);
reset_depth_test!(reset_reaches_depth_4, 4, true);
reset_depth_test!(reset_reaches_depth_5, 5, true);
reset_depth_test!(reset_reaches_depth_6, 6, true);
reset_depth_test!(reset_reaches_depth_7, 7, true);
reset_depth_test!(reset_reaches_depth_8, 8, true);
reset_depth_test!(reset_reaches_depth_9, 9, true);
reset_depth_test!(reset_reaches_depth_10, 10, true);
reset_depth_test!(reset_misses_depth_11, 11, false);
reset_depth_test!(reset_misses_depth_16, 16, false);

#[test]
fn model_is_released_once_on_pass_and_timeout() -> Result<(), Whatever> {
    let (_, passed, _) = run_script(Script::succeeds_at(3), with_budget(10))?;
    let (_, timed_out, _) =
        run_script(Script::never_succeeds(), with_budget(10))?;

    assert_eq!(passed.snapshot().drops, 1);
    assert_eq!(timed_out.snapshot().drops, 1);

    Ok(())
}

#[test]
fn model_is_released_once_when_eval_panics() {
    let host = ScriptedHost::new(Script::never_succeeds().with_fault_at(4));
    let probe = host.probe();
    let mut diagnostics = vec![];

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Driver::with_diagnostics(host, with_budget(100), &mut diagnostics)
            .run()
    }));
    let state = probe.snapshot();

    assert!(result.is_err());
    assert_eq!(state.instantiations, 1);
    assert_eq!(state.drops, 1);
    assert_eq!(state.rising_edges, RESET_CYCLES + 4);
    assert!(diagnostics.is_empty());
}

/// A diagnostics stream whose reader has gone away.
struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

#[test]
fn unwritable_diagnostics_keep_the_timeout() -> Result<(), Whatever> {
    let host = ScriptedHost::new(Script::never_succeeds());
    let report = Driver::with_diagnostics(host, with_budget(5), ClosedPipe)
        .run()
        .whatever_context("Harness run failed")?;

    assert_eq!(report.outcome, Outcome::TimedOut);
    assert_eq!(report.outcome.exit_status(), 2);
    assert_eq!(report.cycles(), 5);

    Ok(())
}

#[test]
fn unwritable_diagnostics_keep_the_verbose_pass() -> Result<(), Whatever> {
    let host = ScriptedHost::new(Script::succeeds_at(2));
    let observed = host.probe();
    let options = HarnessOptions {
        verbose: true,
        ..HarnessOptions::default()
    };
    let report = Driver::with_diagnostics(host, options, ClosedPipe)
        .run()
        .whatever_context("Harness run failed")?;

    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(report.outcome.exit_status(), 0);
    assert_eq!(report.cycles(), 2);
    assert_eq!(observed.snapshot().drops, 1);

    Ok(())
}
