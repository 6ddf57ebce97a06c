// Copyright (C) 2024 Ethan Uppal.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3 of the License only.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{env, process::ExitCode};

use argh::FromArgs;
use awl_harness::{Driver, HarnessOptions, Report};
use awl_verilator::{
    HarnessPorts, RandomReset, VerilatorHost, VerilatorHostOptions, shim,
};
use camino::Utf8PathBuf;
use log::LevelFilter;
use owo_colors::OwoColorize;
use snafu::{ResultExt, Whatever};

/// Exit status for runs that never reached the simulation, kept apart from
/// the pass (0) and timeout (2) statuses.
const SETUP_FAILURE_EXIT_STATUS: u8 = 3;

const DEFAULT_TOP_MODULE: &str = "TestHarness";

/// Drive Verilator test harnesses
#[derive(FromArgs)]
struct AwlCommand {
    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Run(RunSubcommand),
    Shim(ShimSubcommand),
}

/// reset and clock a test harness until it succeeds or times out
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunSubcommand {
    /// shared library containing the Verilated model and its shim
    #[argh(option, short = 'l')]
    library: Utf8PathBuf,

    /// name of the Verilated top module
    #[argh(option, default = "DEFAULT_TOP_MODULE.to_string()")]
    top: String,

    /// read options from the [harness] table of this TOML file
    #[argh(option, short = 'c')]
    config: Option<Utf8PathBuf>,

    /// seed for randomized reset values (default 3)
    #[argh(option, short = 's')]
    seed: Option<u32>,

    /// clock periods after reset before timing out (default 100000)
    #[argh(option, short = 'm')]
    max_cycles: Option<u64>,

    /// report the seed and successful runs on stderr
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// only report timeouts, even if the config file enables verbose output
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// initial value of registers without reset: zeros, ones, or randomized
    #[argh(option)]
    random_reset: Option<RandomReset>,

    /// name of the clock port
    #[argh(option)]
    clock: Option<String>,

    /// name of the reset port
    #[argh(option)]
    reset: Option<String>,

    /// name of the success port
    #[argh(option)]
    success: Option<String>,

    /// log harness progress
    #[argh(switch)]
    log: bool,

    /// arguments forwarded to the model, such as +plusargs
    #[argh(positional)]
    host_arguments: Vec<String>,
}

/// write the C++ FFI wrappers a model library must be built with
#[derive(FromArgs)]
#[argh(subcommand, name = "shim")]
struct ShimSubcommand {
    /// name of the Verilated top module
    #[argh(option, default = "DEFAULT_TOP_MODULE.to_string()")]
    top: String,

    /// directory to write the wrappers into
    #[argh(option, short = 'o', default = "Utf8PathBuf::from(\".\")")]
    output_directory: Utf8PathBuf,

    /// name of the clock port
    #[argh(option)]
    clock: Option<String>,

    /// name of the reset port
    #[argh(option)]
    reset: Option<String>,

    /// name of the success port
    #[argh(option)]
    success: Option<String>,
}

fn harness_ports(
    clock: Option<String>,
    reset: Option<String>,
    success: Option<String>,
) -> HarnessPorts {
    let defaults = HarnessPorts::default();
    HarnessPorts {
        clock: clock.unwrap_or(defaults.clock),
        reset: reset.unwrap_or(defaults.reset),
        success: success.unwrap_or(defaults.success),
    }
}

fn load_options(command: &RunSubcommand) -> Result<HarnessOptions, Whatever> {
    let mut options = match &command.config {
        Some(path) => HarnessOptions::load(path).whatever_context(format!(
            "Failed to load harness config {}",
            path
        ))?,
        None => HarnessOptions::default(),
    };

    if let Some(seed) = command.seed {
        options.random_seed = seed;
    }
    if let Some(max_cycles) = command.max_cycles {
        options.max_cycles = max_cycles;
    }
    if let Some(random_reset) = command.random_reset {
        options.random_reset = random_reset;
    }
    options.verbose = (options.verbose || command.verbose) && !command.quiet;
    options.log |= command.log;
    if !command.host_arguments.is_empty() {
        options.host_arguments = command.host_arguments.clone();
    }

    // the host expects a full argv
    let program = env::args().next().unwrap_or_else(|| "awl".into());
    options.host_arguments.insert(0, program);

    Ok(options)
}

fn run(command: RunSubcommand) -> Result<Report, Whatever> {
    let options = load_options(&command)?;
    if options.log && env::var("RUST_LOG").is_err() {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Info)
            .init();
    }

    let ports = harness_ports(command.clock, command.reset, command.success);
    let host = VerilatorHost::open(
        &command.library,
        &command.top,
        &ports,
        VerilatorHostOptions { log: options.log },
    )
    .whatever_context(format!(
        "Failed to open model library {}",
        command.library
    ))?;

    Driver::new(host, options)
        .run()
        .whatever_context("Failed to run the test harness")
}

fn write_shim(command: ShimSubcommand) -> Result<(), Whatever> {
    let ports = harness_ports(command.clock, command.reset, command.success);
    let shim_path =
        shim::write_shim(&command.output_directory, &command.top, &ports)
            .whatever_context(format!("Failed to write shim for {}", command.top))?;

    println!(
        "{} {} ({})",
        "   Generated".bold().green(),
        shim_path,
        command.top
    );

    Ok(())
}

fn setup_failure(error: Whatever) -> ExitCode {
    eprintln!("{} {}", "error:".bold().red(), snafu::Report::from_error(error));
    ExitCode::from(SETUP_FAILURE_EXIT_STATUS)
}

fn main() -> ExitCode {
    let command: AwlCommand = argh::from_env();

    if env::var("RUST_LOG").is_ok() {
        env_logger::init();
    }

    match command.subcommand {
        Subcommand::Run(run_subcommand) => match run(run_subcommand) {
            Ok(report) => report.exit_code(),
            Err(error) => setup_failure(error),
        },
        Subcommand::Shim(shim_subcommand) => match write_shim(shim_subcommand) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => setup_failure(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_run(arguments: &[&str]) -> RunSubcommand {
        let command = AwlCommand::from_args(&["awl"], arguments)
            .expect("arguments should parse");
        match command.subcommand {
            Subcommand::Run(run_subcommand) => run_subcommand,
            Subcommand::Shim(_) => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let command = parse_run(&[
            "run",
            "-l",
            "obj_dir/libVTestHarness_dyn.so",
            "--seed",
            "7",
            "--max-cycles",
            "250",
            "--random-reset",
            "zeros",
            "-v",
            "+trace",
        ]);
        let options = load_options(&command).expect("no config file");

        assert_eq!(command.top, DEFAULT_TOP_MODULE);
        assert_eq!(options.random_seed, 7);
        assert_eq!(options.max_cycles, 250);
        assert_eq!(options.random_reset, RandomReset::Zeros);
        assert!(options.verbose);
        assert_eq!(&options.host_arguments[1..], ["+trace"]);
    }

    #[test]
    fn quiet_wins_over_verbose() {
        let command = parse_run(&["run", "-l", "model.so", "-v", "--quiet"]);
        let options = load_options(&command).expect("no config file");

        assert!(!options.verbose);
    }

    #[test]
    fn quiet_overrides_a_verbose_config() {
        let directory = Utf8PathBuf::from("artifacts/quiet-config");
        std::fs::create_dir_all(&directory).expect("create config directory");
        let config = directory.join("awl.toml");
        std::fs::write(&config, "[harness]\nverbose = true\n")
            .expect("write config");

        let verbose =
            parse_run(&["run", "-l", "model.so", "-c", config.as_str()]);
        assert!(load_options(&verbose).expect("valid config").verbose);

        let quiet =
            parse_run(&["run", "-l", "model.so", "-c", config.as_str(), "-q"]);
        assert!(!load_options(&quiet).expect("valid config").verbose);
    }

    #[test]
    fn negative_seeds_are_rejected() {
        let result = AwlCommand::from_args(
            &["awl"],
            &["run", "-l", "model.so", "-s", "-1"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn unset_flags_keep_harness_defaults() {
        let command = parse_run(&["run", "--library", "model.so"]);
        let options = load_options(&command).expect("no config file");

        assert_eq!(options.random_seed, 3);
        assert_eq!(options.max_cycles, 100_000);
        assert!(!options.verbose);
        assert_eq!(options.host_arguments.len(), 1);
        assert_eq!(
            harness_ports(command.clock, command.reset, command.success),
            HarnessPorts::default()
        );
    }
}
