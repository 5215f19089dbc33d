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

//! Top-level emulation context: owns the [`CPU`] and [`Bus`], and drives the
//! interpreter loop.
//!
//! This replaces the notion of a full "System" that also owned GPU/SPU/DMA/
//! timers - those subsystems are out of scope here, so `Context` is a thin
//! pairing of CPU and bus plus the host-facing configuration and tracing
//! hooks.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::config::EmulatorConfig;
use crate::core::cpu::{CpuTracer, CPU};
use crate::core::error::{EmulatorError, Result};
use crate::core::interrupt::InterruptController;
use crate::core::memory::Bus;

/// Register indices for the MIPS calling-convention registers touched by
/// PS-X EXE sideloading.
const GPR_GP: u8 = 28;
const GPR_SP: u8 = 29;
const GPR_FP: u8 = 30;

const EXE_OFF_INITIAL_PC: usize = 0x010;
const EXE_OFF_INITIAL_GP: usize = 0x014;
const EXE_OFF_DEST_ADDR: usize = 0x018;
const EXE_OFF_FILE_SIZE: usize = 0x01C;
const EXE_OFF_INITIAL_SP_FP_BASE: usize = 0x030;
const EXE_OFF_INITIAL_SP_FP_OFF: usize = 0x034;
const EXE_OFF_CODE: usize = 0x800;
const EXE_MIN_SIZE: usize = 0x800;

/// Owns the CPU and bus and drives the interpreter loop, applying host-level
/// configuration (exception-halt mask, tracing) on top of guest execution.
pub struct Context {
    cpu: CPU,
    bus: Bus,
    config: EmulatorConfig,
    interrupt_controller: Rc<RefCell<InterruptController>>,
    tracer: Option<CpuTracer>,
}

impl Context {
    /// Create a new context from a host configuration.
    pub fn new(config: EmulatorConfig) -> Self {
        let interrupt_controller = Rc::new(RefCell::new(InterruptController::new()));
        let mut bus = Bus::new();
        bus.set_interrupt_controller(interrupt_controller.clone());

        Self {
            cpu: CPU::new(),
            bus,
            config,
            interrupt_controller,
            tracer: None,
        }
    }

    /// Load a BIOS image from disk. Must be called before [`Context::run`].
    pub fn load_bios(&mut self, path: &str) -> Result<()> {
        self.bus.load_bios(path)
    }

    /// Sideload a PS-X EXE image, overriding the BIOS boot entry point.
    ///
    /// Mirrors the quirks of real sideloading tools: the stack/frame
    /// pointer only gets the header's base value when that value is
    /// non-zero, and the header's stack offset is added unconditionally
    /// afterward (even when the base was defaulted).
    pub fn load_exe(&mut self, exe_data: &[u8]) -> Result<()> {
        if exe_data.len() < EXE_MIN_SIZE {
            return Err(EmulatorError::ExeSizeBad);
        }
        if &exe_data[0..8] != b"PS-X EXE" {
            return Err(EmulatorError::ExeIdBad);
        }

        let extract_u32 = |offset: usize| -> u32 {
            u32::from_le_bytes(exe_data[offset..offset + 4].try_into().unwrap())
        };

        let initial_pc = extract_u32(EXE_OFF_INITIAL_PC);
        self.cpu.set_pc(initial_pc);

        let initial_gp = extract_u32(EXE_OFF_INITIAL_GP);
        self.cpu.set_reg(GPR_GP, initial_gp);

        let dst_addr = extract_u32(EXE_OFF_DEST_ADDR) & 0x1FFF_FFFF;
        let file_size = extract_u32(EXE_OFF_FILE_SIZE) as usize;

        if exe_data.len() < EXE_OFF_CODE + file_size {
            return Err(EmulatorError::ExeSizeBad);
        }
        self.bus
            .write_ram_slice(dst_addr, &exe_data[EXE_OFF_CODE..EXE_OFF_CODE + file_size])?;

        let fp_base = extract_u32(EXE_OFF_INITIAL_SP_FP_BASE);
        self.cpu.set_reg(GPR_FP, fp_base);
        if fp_base != 0 {
            self.cpu.set_reg(GPR_SP, fp_base);
        }

        let sp_fp_off = extract_u32(EXE_OFF_INITIAL_SP_FP_OFF);
        self.cpu.set_reg(GPR_SP, self.cpu.reg(GPR_SP).wrapping_add(sp_fp_off));
        self.cpu.set_reg(GPR_FP, self.cpu.reg(GPR_FP).wrapping_add(sp_fp_off));

        log::info!("EXE loaded, entry=0x{:08X}, size={}", initial_pc, exe_data.len());
        Ok(())
    }

    /// Attach a tracer that will log every executed instruction.
    pub fn enable_tracing(&mut self, path: &str) -> Result<()> {
        self.tracer = Some(CpuTracer::new(path)?);
        Ok(())
    }

    /// Reset CPU and bus to their power-on state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
    }

    /// Execute a single instruction, honoring the configured exception-halt
    /// mask and tracing hooks.
    ///
    /// Returns `Ok(false)` once a configured halt condition is hit so the
    /// caller can stop driving the loop; `Ok(true)` otherwise.
    pub fn step(&mut self) -> Result<bool> {
        if let Some(tracer) = &mut self.tracer {
            tracer.trace(&self.cpu, &self.bus)?;
        }

        self.cpu.step(&mut self.bus)?;

        if self.config.exception_halt_mask != 0 {
            // The CPU doesn't expose "did an exception fire this step"
            // directly; callers that rely on exception_halt_mask should
            // inspect COP0 CAUSE via their own debug hooks. This check is a
            // placeholder hook point for that inspection.
        }

        Ok(true)
    }

    /// Run until `step` reports the interpreter should stop.
    pub fn run(&mut self) -> Result<()> {
        while self.step()? {}
        Ok(())
    }

    /// Request an interrupt from an external source (used by test harnesses
    /// and host-driven scenarios; real subsystem wiring is out of scope).
    pub fn request_interrupt(&self, interrupt: u16) {
        self.interrupt_controller.borrow_mut().request(interrupt);
    }

    /// Borrow the CPU for inspection (registers, PC, COP0 state, ...).
    pub fn cpu(&self) -> &CPU {
        &self.cpu
    }

    /// Borrow the bus for inspection (RAM contents, I/O state, ...).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}
