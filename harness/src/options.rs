// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::fs;

use awl_verilator::RandomReset;
use camino::{Utf8Path, Utf8PathBuf};
use snafu::{ResultExt, Snafu};

/// The seed used when none is given.
pub const DEFAULT_RANDOM_SEED: u32 = 3;

/// The cycle budget used when none is given.
pub const DEFAULT_MAX_CYCLES: u64 = 100_000;

/// Configuration for a single harness run. Usually, you can just use
/// [`HarnessOptions::default()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessOptions {
    /// Seed for the generators the model draws randomized reset values from.
    /// Negative seeds are not accepted; `srand` takes an unsigned seed and
    /// this value is handed to it unchanged.
    pub random_seed: u32,

    /// The number of clock periods after reset the model has to assert
    /// success.
    pub max_cycles: u64,

    /// Whether to report the seed and successful runs on the diagnostics
    /// stream. Timeouts are always reported.
    pub verbose: bool,

    /// How registers without an explicit reset start out.
    pub random_reset: RandomReset,

    /// Forwarded to the evaluation host before the model is constructed.
    pub host_arguments: Vec<String>,

    /// Whether to use the log crate.
    pub log: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            random_seed: DEFAULT_RANDOM_SEED,
            max_cycles: DEFAULT_MAX_CYCLES,
            verbose: false,
            random_reset: RandomReset::default(),
            host_arguments: vec![],
            log: false,
        }
    }
}

/// Configuration file error.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read harness config at {path}"))]
    ReadConfig {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse harness config"))]
    ParseConfig { source: toml::de::Error },
    #[snafu(display("`harness.{key}` in harness config must be {expected}"))]
    InvalidValue { key: String, expected: String },
}

impl HarnessOptions {
    /// The same as the [`Default`] implementation except that the log crate is
    /// used.
    pub fn default_logging() -> Self {
        Self {
            log: true,
            ..Default::default()
        }
    }

    /// Reads options from the `[harness]` table of the TOML file at `path`.
    /// Keys missing from the file keep their default values.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).context(ReadConfigSnafu {
            path: path.to_path_buf(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses options from the `[harness]` table of a TOML document:
    ///
    /// ```toml
    /// [harness]
    /// random-seed = 3
    /// max-cycles = 100000
    /// verbose = false
    /// random-reset = "randomized"
    /// host-arguments = ["+verbose"]
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let document: toml::Value =
            toml::from_str(contents).context(ParseConfigSnafu)?;

        let mut options = Self::default();
        let Some(harness) = document.get("harness") else {
            return Ok(options);
        };

        let invalid = |key: &str, expected: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            expected: expected.to_string(),
        };

        if let Some(value) = harness.get("random-seed") {
            options.random_seed = value
                .as_integer()
                .and_then(|seed| u32::try_from(seed).ok())
                .ok_or_else(|| invalid("random-seed", "a 32-bit unsigned integer"))?;
        }
        if let Some(value) = harness.get("max-cycles") {
            options.max_cycles = value
                .as_integer()
                .and_then(|cycles| u64::try_from(cycles).ok())
                .ok_or_else(|| invalid("max-cycles", "a non-negative integer"))?;
        }
        if let Some(value) = harness.get("verbose") {
            options.verbose = value
                .as_bool()
                .ok_or_else(|| invalid("verbose", "a boolean"))?;
        }
        if let Some(value) = harness.get("random-reset") {
            options.random_reset = value
                .as_str()
                .and_then(|policy| policy.parse().ok())
                .ok_or_else(|| {
                    invalid("random-reset", "one of \"zeros\", \"ones\", or \"randomized\"")
                })?;
        }
        if let Some(value) = harness.get("host-arguments") {
            options.host_arguments = value
                .as_array()
                .and_then(|arguments| {
                    arguments
                        .iter()
                        .map(|argument| argument.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                })
                .ok_or_else(|| invalid("host-arguments", "an array of strings"))?;
        }

        Ok(options)
    }
}
