// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

// hardcoded knowledge:
// - the Verilated class for top module `top` is `V{top}` in `V{top}.h`
// - all harness ports are at most 8 bits wide

//! C++ wrappers that expose a Verilated test harness over `extern "C"`, in
//! the shape [`crate::VerilatorHost`] loads.

use std::{fmt::Write, fs};

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{Whatever, prelude::*};

use crate::{HarnessPorts, PortDirection};

/// The file [`write_shim`] creates inside its output directory.
pub const SHIM_FILE_NAME: &str = "ffi.cpp";

pub(crate) fn constructor_symbol(top: &str) -> String {
    format!("ffi_new_V{top}")
}

pub(crate) fn destructor_symbol(top: &str) -> String {
    format!("ffi_delete_V{top}")
}

pub(crate) fn eval_symbol(top: &str) -> String {
    format!("ffi_V{top}_eval")
}

pub(crate) fn pin_symbol(top: &str, port: &str) -> String {
    format!("ffi_V{top}_pin_{port}")
}

pub(crate) fn read_symbol(top: &str, port: &str) -> String {
    format!("ffi_V{top}_read_{port}")
}

pub(crate) const SET_TIME_SYMBOL: &str = "ffi_awl_set_time";
pub(crate) const RAND_RESET_SYMBOL: &str = "ffi_Verilated_randReset";
pub(crate) const COMMAND_ARGS_SYMBOL: &str = "ffi_Verilated_commandArgs";

/// Produces the C++ source for the FFI wrappers of top module `top`.
pub fn generate_shim(
    top: &str,
    ports: &HarnessPorts,
) -> Result<String, Whatever> {
    if top.chars().any(|c| c == '\\' || c == ' ') {
        whatever!("Escaped module names are not supported");
    }

    let mut buffer = String::new();
    writeln!(
        &mut buffer,
        r#"
#include "verilated.h"
#include "V{top}.h"

static uint64_t awl_trace_count = 0;

double sc_time_stamp() {{
    return awl_trace_count;
}}

extern "C" {{
    void* {new}() {{
        return new V{top}{{}};
    }}

    void {eval}(V{top}* top) {{
        top->eval();
    }}

    void {delete}(V{top}* top) {{
        delete top;
    }}

    void {SET_TIME_SYMBOL}(uint64_t time) {{
        awl_trace_count = time;
    }}

    void {RAND_RESET_SYMBOL}(int policy) {{
        Verilated::randReset(policy);
    }}

    void {COMMAND_ARGS_SYMBOL}(int argc, const char** argv) {{
        Verilated::commandArgs(argc, argv);
    }}
"#,
        new = constructor_symbol(top),
        eval = eval_symbol(top),
        delete = destructor_symbol(top),
    )
    .whatever_context("Failed to format utility FFI")?;

    for (port, direction) in ports.signature() {
        if port.is_empty() || port.chars().any(|c| c == '\\' || c == ' ') {
            whatever!("Port name `{}` is not a plain identifier", port);
        }
        let macro_prefix = match direction {
            PortDirection::Input => "VL_IN8",
            PortDirection::Output => "VL_OUT8",
        };
        let type_macro = |name: Option<&str>| {
            format!(
                "{}({}, 0, 0)",
                macro_prefix,
                name.unwrap_or("/* return value */"),
            )
        };

        if direction == PortDirection::Input {
            let input_type = type_macro(Some("new_value"));
            writeln!(
                &mut buffer,
                r#"
    void {symbol}(V{top}* top, {input_type}) {{
        top->{port} = new_value;
    }}"#,
                symbol = pin_symbol(top, port),
            )
            .whatever_context("Failed to format input port FFI")?;
        }

        if direction == PortDirection::Output {
            let return_type = type_macro(None);
            writeln!(
                &mut buffer,
                r#"
    {return_type} {symbol}(V{top}* top) {{
        return top->{port};
    }}"#,
                symbol = read_symbol(top, port),
            )
            .whatever_context("Failed to format output port FFI")?;
        }
    }

    writeln!(&mut buffer, "}} // extern \"C\"")
        .whatever_context("Failed to format ending brace")?;

    Ok(buffer)
}

/// Writes the wrappers from [`generate_shim`] to `directory`, creating it if
/// needed, and returns the path of the written file.
pub fn write_shim(
    directory: &Utf8Path,
    top: &str,
    ports: &HarnessPorts,
) -> Result<Utf8PathBuf, Whatever> {
    let source = generate_shim(top, ports)?;

    fs::create_dir_all(directory).whatever_context(format!(
        "Failed to create shim output directory {}",
        directory
    ))?;

    let shim_path = directory.join(SHIM_FILE_NAME);
    fs::write(&shim_path, source)
        .whatever_context("Failed to write FFI wrappers file")?;

    Ok(shim_path)
}
