// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    ffi::{self, CString},
    marker::PhantomData,
};

use camino::Utf8Path;
use libloading::Library;
use snafu::ResultExt;

use crate::{
    Dut, EvaluationHost, HarnessPorts, HostError, InvalidArgumentSnafu,
    LoadLibrarySnafu, MissingSymbolSnafu, RandomReset, seed, shim,
    types::CData,
};

/// Optional configuration for opening a [`VerilatorHost`]. Usually, you can
/// just use [`VerilatorHostOptions::default()`].
#[derive(Debug, Clone, Default)]
pub struct VerilatorHostOptions {
    /// Whether to use the log crate.
    pub log: bool,
}

impl VerilatorHostOptions {
    /// The same as the [`Default`] implementation except that the log crate is
    /// used.
    pub fn default_logging() -> Self {
        Self { log: true }
    }
}

#[derive(Clone, Copy)]
struct ModelApi {
    new_main: extern "C" fn() -> *mut ffi::c_void,
    delete_main: extern "C" fn(*mut ffi::c_void),
    eval_main: extern "C" fn(*mut ffi::c_void),
    pin_clock: extern "C" fn(*mut ffi::c_void, CData),
    pin_reset: extern "C" fn(*mut ffi::c_void, CData),
    read_success: extern "C" fn(*mut ffi::c_void) -> CData,
    set_time: extern "C" fn(u64),
}

/// Evaluation host for a Verilated test harness loaded from a shared library.
pub struct VerilatorHost {
    top: String,
    api: ModelApi,
    rand_reset: extern "C" fn(ffi::c_int),
    command_args: extern "C" fn(ffi::c_int, *const *const ffi::c_char),
    options: VerilatorHostOptions,
    _library: Library,
}

impl VerilatorHost {
    /// Loads the library at `library_path`, which must contain the Verilated
    /// top module `top` and the wrappers from [`shim::generate_shim`] for the
    /// same `top` and `ports`.
    pub fn open(
        library_path: &Utf8Path,
        top: &str,
        ports: &HarnessPorts,
        options: VerilatorHostOptions,
    ) -> Result<Self, HostError> {
        if options.log {
            log::info!("Opening the model library {}", library_path);
        }
        let library = unsafe { Library::new(library_path) }.context(
            LoadLibrarySnafu {
                path: library_path.to_path_buf(),
            },
        )?;

        macro_rules! load {
            ($symbol:expr) => {{
                let symbol: String = $symbol;
                *unsafe { library.get(symbol.as_bytes()) }.context(
                    MissingSymbolSnafu {
                        top_module: top.to_string(),
                        symbol: symbol.clone(),
                    },
                )?
            }};
        }

        let api = ModelApi {
            new_main: load!(shim::constructor_symbol(top)),
            delete_main: load!(shim::destructor_symbol(top)),
            eval_main: load!(shim::eval_symbol(top)),
            pin_clock: load!(shim::pin_symbol(top, &ports.clock)),
            pin_reset: load!(shim::pin_symbol(top, &ports.reset)),
            read_success: load!(shim::read_symbol(top, &ports.success)),
            set_time: load!(shim::SET_TIME_SYMBOL.to_string()),
        };
        let rand_reset = load!(shim::RAND_RESET_SYMBOL.to_string());
        let command_args = load!(shim::COMMAND_ARGS_SYMBOL.to_string());

        if options.log {
            log::info!("Loaded model API for top module {}", top);
        }

        Ok(Self {
            top: top.to_string(),
            api,
            rand_reset,
            command_args,
            options,
            _library: library,
        })
    }

    /// The name of the Verilated top module.
    pub fn top(&self) -> &str {
        &self.top
    }
}

impl EvaluationHost for VerilatorHost {
    type Model<'host> = HarnessModel<'host>;

    fn seed_random(&mut self, seed: u32) {
        if self.options.log {
            log::info!("Seeding libc generators with {}", seed);
        }
        seed::seed_libc_generators(seed);
    }

    fn set_random_reset(&mut self, policy: RandomReset) {
        if self.options.log {
            log::info!("Setting random reset policy to {}", policy);
        }
        (self.rand_reset)(policy.policy_id());
    }

    fn command_args(&mut self, arguments: &[String]) -> Result<(), HostError> {
        let arguments = arguments
            .iter()
            .map(|argument| {
                CString::new(argument.as_str()).context(InvalidArgumentSnafu {
                    argument: argument.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let argv = arguments
            .iter()
            .map(|argument| argument.as_ptr())
            .collect::<Vec<_>>();

        // Verilated::commandArgs copies what it keeps, so `arguments` only
        // has to outlive the call.
        (self.command_args)(argv.len() as ffi::c_int, argv.as_ptr());
        Ok(())
    }

    fn instantiate(&mut self) -> Result<HarnessModel<'_>, HostError> {
        if self.options.log {
            log::info!("Constructing V{}", self.top);
        }
        let main = (self.api.new_main)();

        Ok(HarnessModel {
            main,
            api: self.api,
            clock: 0,
            reset: 0,
            _library: PhantomData,
        })
    }
}

/// A Verilated test harness constructed by [`VerilatorHost::instantiate`].
/// The underlying model is deleted when this is dropped.
pub struct HarnessModel<'host> {
    main: *mut ffi::c_void,
    api: ModelApi,
    clock: CData,
    reset: CData,
    _library: PhantomData<&'host Library>,
}

impl Dut for HarnessModel<'_> {
    fn set_clock(&mut self, value: bool) {
        self.clock = value.into();
    }

    fn set_reset(&mut self, value: bool) {
        self.reset = value.into();
    }

    fn success(&self) -> bool {
        (self.api.read_success)(self.main) != 0
    }

    fn eval(&mut self) {
        (self.api.pin_clock)(self.main, self.clock);
        (self.api.pin_reset)(self.main, self.reset);
        (self.api.eval_main)(self.main);
    }

    fn set_time(&mut self, cycle: u64) {
        (self.api.set_time)(cycle);
    }
}

impl Drop for HarnessModel<'_> {
    fn drop(&mut self) {
        (self.api.delete_main)(self.main);
    }
}
