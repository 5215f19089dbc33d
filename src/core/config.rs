// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration for the emulator core.
//!
//! Loaded from a TOML file via [`EmulatorConfig::load`]; missing keys fall
//! back to [`EmulatorConfig::default`].

use std::collections::HashMap;
use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};

/// Per-module logging levels, keyed by the `log` target string
/// (`"bus"`, `"cpu"`, `"gte"`, `"interrupt"`, `"icache"`, ...).
pub type ModuleLevels = HashMap<String, LevelFilter>;

/// Host-configurable emulator behavior.
///
/// Distinct from COP0's own registers: this struct never participates in
/// guest-visible state, it only shapes how the interpreter and its
/// observability hooks behave from the outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Bitmask of COP0 exception causes (1 << cause code) that should halt
    /// the interpreter immediately instead of entering the guest exception
    /// handler. Useful for catching runaway reserved-instruction loops
    /// during development; 0 disables the feature entirely (the default,
    /// matching real hardware where every cause is guest-handled).
    pub exception_halt_mask: u32,

    /// Emit a disassembled line (via [`crate::core::cpu::Disassembler`])
    /// for every instruction the tracer records.
    pub trace_disassembly: bool,

    /// Log BIOS A0/B0/C0 function calls by name when recognized.
    pub trace_bios_calls: bool,

    /// Capture bytes written to the BIOS TTY output port into the tracer's
    /// buffer instead of only logging them.
    pub tty_capture: bool,

    /// Per-module log level overrides, applied on top of `RUST_LOG`.
    pub module_levels: ModuleLevels,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            exception_halt_mask: 0,
            trace_disassembly: false,
            trace_bios_calls: false,
            tty_capture: false,
            module_levels: HashMap::new(),
        }
    }
}

impl EmulatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// Missing keys fall back to [`EmulatorConfig::default`] via serde's
    /// `#[serde(default)]`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text).map_err(|e| EmulatorError::ConfigParse(e.to_string()))?;
        Ok(config)
    }

    /// Returns true if `cause_code` (as stored in COP0 CAUSE bits [6:2])
    /// is configured to halt the interpreter rather than be dispatched to
    /// the guest exception handler.
    pub fn halts_on(&self, cause_code: u32) -> bool {
        (self.exception_halt_mask & (1 << cause_code)) != 0
    }
}
