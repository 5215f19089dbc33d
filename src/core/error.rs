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

//! Error types for the emulator core.
//!
//! CPU-level faults (address errors, overflow, reserved instructions, ...)
//! are modeled as COP0 exceptions and never surface here - they are state
//! transitions the interpreter performs on itself, not `Result::Err`. This
//! type only covers host-level failures: bad configuration, missing or
//! malformed input files, and internal bus invariants being violated.

use thiserror::Error;

/// Result alias used throughout the emulator core.
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors surfaced by host-facing operations.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// The BIOS image could not be found at the given path.
    #[error("BIOS file not found: {0}")]
    BiosNotFound(String),

    /// The BIOS image exists but is not exactly 512KB.
    #[error("invalid BIOS size: expected {expected} bytes, got {got} bytes")]
    InvalidBiosSize { expected: usize, got: usize },

    /// A bus access reached an address with no backing region and no
    /// sentinel-return policy applies (internal bus invariant violation).
    #[error("invalid memory access at 0x{address:08X}")]
    InvalidMemoryAccess { address: u32 },

    /// A 16- or 32-bit access was issued at an address that does not meet
    /// the required alignment.
    #[error("unaligned {size}-byte access at 0x{address:08X}")]
    UnalignedAccess { address: u32, size: u8 },

    /// A tracer or debug API was asked to address a register index outside
    /// its valid range.
    #[error("invalid register index: {index}")]
    InvalidRegister { index: u8 },

    /// A PSX-EXE image had an implausible size (too small for its header,
    /// or its declared text size does not fit in RAM).
    #[error("executable size is invalid")]
    ExeSizeBad,

    /// A PSX-EXE image's identifier did not match "PS-X EXE".
    #[error("executable identifier is invalid")]
    ExeIdBad,

    /// Tracer I/O (writing a trace log, opening a capture file) failed.
    #[error("tracer I/O error: {0}")]
    TracerIo(#[from] std::io::Error),

    /// The configuration file could not be parsed as valid TOML.
    #[error("invalid configuration: {0}")]
    ConfigParse(String),
}
