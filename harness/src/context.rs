// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

/// Per-run simulation state shared between the driver and anything that
/// reports on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    cycle: u64,
    reset_released_at: Option<u64>,
    verbose: bool,
}

impl RunContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Default::default()
        }
    }

    /// Total clock periods driven so far, reset included. This is the
    /// simulated time.
    pub fn timestamp(&self) -> u64 {
        self.cycle
    }

    /// Clock periods driven since reset was released. Zero until then.
    pub fn elapsed(&self) -> u64 {
        self.reset_released_at
            .map_or(0, |released_at| self.cycle - released_at)
    }

    pub fn reset_done(&self) -> bool {
        self.reset_released_at.is_some()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub(crate) fn advance(&mut self) {
        self.cycle += 1;
    }

    pub(crate) fn release_reset(&mut self) {
        debug_assert!(!self.reset_done(), "reset is released only once");
        self.reset_released_at = Some(self.cycle);
    }
}
