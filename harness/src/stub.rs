// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! A scriptable evaluation host for exercising the driver without Verilator.
//!
//! [`ScriptedDut`] models a test harness with a pipelined reset: reset
//! advances one stage per rising clock edge, and the register behind stage
//! `i` is cleared once reset reaches it. Success is asserted from a chosen
//! post-reset period onward. Everything it observes is recorded in a shared
//! [`Probe`].

use std::{cell::RefCell, rc::Rc};

use awl_verilator::{Dut, EvaluationHost, HostError, RandomReset};
use rand::{Rng, SeedableRng, rngs::SmallRng, rngs::StdRng};

/// When a [`ScriptedDut`] asserts success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessScript {
    Never,
    /// From the given post-reset period (1-based) onward.
    AtCycle(u64),
    /// From a post-reset period drawn from the seeded host generator, in
    /// `1..=within`.
    Random { within: u64 },
}

/// Behavior of the models a [`ScriptedHost`] constructs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub success: SuccessScript,
    /// Length of the reset pipeline, i.e. how many rising edges with reset
    /// asserted it takes for every register to be reset.
    pub reset_depth: usize,
    /// Panics in `eval` on the rising edge of this post-reset period.
    pub fault_at: Option<u64>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            success: SuccessScript::Never,
            reset_depth: 1,
            fault_at: None,
        }
    }
}

impl Script {
    pub fn never_succeeds() -> Self {
        Self::default()
    }

    pub fn succeeds_at(cycle: u64) -> Self {
        Self {
            success: SuccessScript::AtCycle(cycle),
            ..Default::default()
        }
    }

    pub fn succeeds_randomly(within: u64) -> Self {
        Self {
            success: SuccessScript::Random { within },
            ..Default::default()
        }
    }

    pub fn with_reset_depth(self, reset_depth: usize) -> Self {
        Self {
            reset_depth,
            ..self
        }
    }

    pub fn with_fault_at(self, cycle: u64) -> Self {
        Self {
            fault_at: Some(cycle),
            ..self
        }
    }
}

/// Everything a [`ScriptedHost`] and its models have observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeState {
    pub seed: Option<u32>,
    pub random_reset: Option<RandomReset>,
    pub host_arguments: Vec<String>,
    pub instantiations: usize,
    pub drops: usize,
    pub evaluations: u64,
    pub rising_edges: u64,
    /// Rising edges seen with reset asserted.
    pub reset_edges: u64,
    /// Whether every register had been reset when reset was deasserted.
    pub reset_covered: Option<bool>,
    pub registers_at_release: Vec<u8>,
    /// The post-reset period the model was scripted to succeed on.
    pub success_at: Option<u64>,
    /// The last time published with [`Dut::set_time`].
    pub last_time: u64,
}

/// Shared handle onto a [`ProbeState`].
#[derive(Debug, Clone, Default)]
pub struct Probe(Rc<RefCell<ProbeState>>);

impl Probe {
    pub fn snapshot(&self) -> ProbeState {
        self.0.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut ProbeState)) {
        f(&mut self.0.borrow_mut());
    }
}

/// An [`EvaluationHost`] whose models follow a [`Script`].
pub struct ScriptedHost {
    script: Script,
    probe: Probe,
    random_reset: RandomReset,
    general: StdRng,
    legacy: SmallRng,
}

impl ScriptedHost {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            probe: Probe::default(),
            random_reset: RandomReset::default(),
            general: StdRng::seed_from_u64(0),
            legacy: SmallRng::seed_from_u64(0),
        }
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl EvaluationHost for ScriptedHost {
    type Model<'host> = ScriptedDut;

    fn seed_random(&mut self, seed: u32) {
        self.general = StdRng::seed_from_u64(seed.into());
        self.legacy = SmallRng::seed_from_u64(seed.into());
        self.probe.update(|state| state.seed = Some(seed));
    }

    fn set_random_reset(&mut self, policy: RandomReset) {
        self.random_reset = policy;
        self.probe.update(|state| state.random_reset = Some(policy));
    }

    fn command_args(&mut self, arguments: &[String]) -> Result<(), HostError> {
        self.probe
            .update(|state| state.host_arguments = arguments.to_vec());
        Ok(())
    }

    fn instantiate(&mut self) -> Result<ScriptedDut, HostError> {
        let success_at = match self.script.success {
            SuccessScript::Never => None,
            SuccessScript::AtCycle(cycle) => Some(cycle),
            SuccessScript::Random { within } => {
                Some(self.general.random_range(1..=within.max(1)))
            }
        };

        let depth = self.script.reset_depth;
        let registers = (0..depth)
            .map(|_| match self.random_reset {
                RandomReset::Zeros => 0,
                RandomReset::Ones => u8::MAX,
                RandomReset::Randomized => self.legacy.random(),
            })
            .collect();

        self.probe.update(|state| {
            state.instantiations += 1;
            state.success_at = success_at;
        });

        Ok(ScriptedDut {
            clock: false,
            reset: false,
            last_clock: false,
            pipeline: vec![false; depth],
            covered: vec![false; depth],
            registers,
            post_reset_periods: 0,
            success_at,
            fault_at: self.script.fault_at,
            probe: self.probe.clone(),
        })
    }
}

/// A model constructed by [`ScriptedHost`].
pub struct ScriptedDut {
    clock: bool,
    reset: bool,
    last_clock: bool,
    pipeline: Vec<bool>,
    covered: Vec<bool>,
    registers: Vec<u8>,
    post_reset_periods: u64,
    success_at: Option<u64>,
    fault_at: Option<u64>,
    probe: Probe,
}

impl ScriptedDut {
    fn rising_edge(&mut self) {
        // reset moves one stage down the pipeline per edge
        self.pipeline.rotate_right(1);
        if let Some(first) = self.pipeline.first_mut() {
            *first = self.reset;
        }
        for ((covered, register), stage) in self
            .covered
            .iter_mut()
            .zip(&mut self.registers)
            .zip(&self.pipeline)
        {
            if *stage {
                *covered = true;
                *register = 0;
            }
        }

        let reset = self.reset;
        if !reset {
            self.post_reset_periods += 1;
        }
        self.probe.update(|state| {
            state.rising_edges += 1;
            if reset {
                state.reset_edges += 1;
            }
        });

        if !reset && self.fault_at == Some(self.post_reset_periods) {
            panic!(
                "scripted fault on post-reset cycle {}",
                self.post_reset_periods
            );
        }
    }
}

impl Dut for ScriptedDut {
    fn set_clock(&mut self, value: bool) {
        self.clock = value;
    }

    fn set_reset(&mut self, value: bool) {
        if self.reset && !value {
            let covered = self.covered.iter().all(|covered| *covered);
            let registers = self.registers.clone();
            self.probe.update(|state| {
                state.reset_covered = Some(covered);
                state.registers_at_release = registers;
            });
        }
        self.reset = value;
    }

    fn success(&self) -> bool {
        self.success_at
            .is_some_and(|success_at| self.post_reset_periods >= success_at)
    }

    fn eval(&mut self) {
        self.probe.update(|state| state.evaluations += 1);
        if self.clock && !self.last_clock {
            self.rising_edge();
        }
        self.last_clock = self.clock;
    }

    fn set_time(&mut self, cycle: u64) {
        self.probe.update(|state| state.last_time = cycle);
    }
}

impl Drop for ScriptedDut {
    fn drop(&mut self) {
        self.probe.update(|state| state.drops += 1);
    }
}
