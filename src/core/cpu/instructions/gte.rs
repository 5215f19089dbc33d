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

//! Coprocessor 2 (GTE) instructions: register moves and command dispatch.
//!
//! Load delay applies to MFC2/CFC2 the same way it does to COP0 - the
//! moved-from-coprocessor value doesn't land in the GPR until the next
//! `step()`.

use super::super::decode::decode_r_type;
use super::super::CPU;
use crate::core::error::Result;
use crate::core::memory::Bus;

// GTE data register indices that sign-extend on MFC2 (IR0-IR3).
const IR0: u8 = 8;
const IR1: u8 = 9;
const IR2: u8 = 10;
const IR3: u8 = 11;

impl CPU {
    /// MFC2: Move from GTE data register (sign-extends IR0-IR3)
    pub(crate) fn op_mfc2(&mut self, instruction: u32) -> Result<()> {
        let (_, rt, rd, _, _) = decode_r_type(instruction);
        let raw = self.gte.read_data(rd as usize);
        let value = match rd {
            IR0 | IR1 | IR2 | IR3 => raw as i16 as i32 as u32,
            _ => raw as u32,
        };
        self.set_reg_delayed(rt, value);
        Ok(())
    }

    /// CFC2: Move from GTE control register
    pub(crate) fn op_cfc2(&mut self, instruction: u32) -> Result<()> {
        let (_, rt, rd, _, _) = decode_r_type(instruction);
        let value = self.gte.read_control(rd as usize) as u32;
        self.set_reg_delayed(rt, value);
        Ok(())
    }

    /// MTC2: Move to GTE data register
    pub(crate) fn op_mtc2(&mut self, instruction: u32) -> Result<()> {
        let (_, rt, rd, _, _) = decode_r_type(instruction);
        let value = self.reg(rt);
        self.gte.write_data(rd as usize, value as i32);
        Ok(())
    }

    /// CTC2: Move to GTE control register
    pub(crate) fn op_ctc2(&mut self, instruction: u32) -> Result<()> {
        let (_, rt, rd, _, _) = decode_r_type(instruction);
        let value = self.reg(rt);
        self.gte.write_control(rd as usize, value as i32);
        Ok(())
    }

    /// LWC2: Load Word to GTE data register
    pub(crate) fn op_lwc2(&mut self, bus: &Bus, instruction: u32) -> Result<()> {
        let (op_rs, rt, imm) = {
            let (_, rs, rt, imm) = super::super::decode::decode_i_type(instruction);
            (rs, rt, imm)
        };
        let vaddr = self.reg(op_rs).wrapping_add(imm as i16 as i32 as u32);
        let word = bus.read32(vaddr)?;
        self.gte.write_data(rt as usize, word as i32);
        Ok(())
    }

    /// SWC2: Store Word from GTE data register
    pub(crate) fn op_swc2(&mut self, bus: &mut Bus, instruction: u32) -> Result<()> {
        let (_, rs, rt, imm) = super::super::decode::decode_i_type(instruction);
        let vaddr = self.reg(rs).wrapping_add(imm as i16 as i32 as u32);
        let value = self.gte.read_data(rt as usize) as u32;
        bus.write32(vaddr, value)?;
        Ok(())
    }

    /// Execute a GTE command (the COP2 "CO" instruction group - RTPS, NCLIP,
    /// MVMVA, RTPT, and the rest of the command set).
    pub(crate) fn op_cop2_command(&mut self, instruction: u32) -> Result<()> {
        self.gte.execute(instruction);
        Ok(())
    }
}
