// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Seeding for the C library generators a Verilated model draws from.

use libc::{c_long, c_uint};

unsafe extern "C" {
    fn srand48(seed: c_long);
}

/// Seeds both `rand` and the 48-bit `drand48` family with `seed`. Verilator
/// draws its randomized reset values from these, so this must happen before
/// the model is constructed and never again afterward.
pub fn seed_libc_generators(seed: u32) {
    // SAFETY: both only replace libc's internal generator state.
    unsafe {
        libc::srand(seed as c_uint);
        srand48(c_long::from(seed));
    }
}
