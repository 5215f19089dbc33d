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

//! psrx: A MIPS R3000A / PSX CPU interpreter core
//!
//! This crate provides the CPU, bus, and geometry transformation engine
//! (GTE) at the heart of a PlayStation emulator. It does not include a
//! GPU, SPU, CD-ROM, or any other peripheral emulation - those are out of
//! scope; unmapped I/O windows read back fixed idle values instead.
//!
//! # Architecture
//!
//! The emulator is organized into the following modules:
//!
//! - [`core`]: Core emulation components (CPU, Memory, GTE, interrupt controller)
//!
//! # Example
//!
//! ```no_run
//! use psrx::core::config::EmulatorConfig;
//! use psrx::core::context::Context;
//!
//! let mut ctx = Context::new(EmulatorConfig::default());
//! ctx.load_bios("path/to/bios.bin")?;
//! ctx.run()?;
//! # Ok::<(), psrx::core::error::EmulatorError>(())
//! ```
//!
//! # Getting Started
//!
//! 1. Create a [`core::context::Context`] instance
//! 2. Load a BIOS file (or sideload a PS-X EXE)
//! 3. Run the emulation loop
//!
//! # Modules
//!
//! - [`core::cpu`]: MIPS R3000A CPU emulation
//! - [`core::memory`]: Memory bus and address translation
//! - [`core::gte`]: Geometry Transformation Engine (COP2)
//! - [`core::interrupt`]: Interrupt controller (I_STAT/I_MASK)
//! - [`core::context`]: Top-level wiring and the interpreter loop
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, EmulatorError>`.

pub mod core;

// Re-export commonly used types
pub use core::error::{EmulatorError, Result};
