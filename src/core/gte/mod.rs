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

//! GTE (Geometry Transformation Engine) implementation
//!
//! The GTE is Coprocessor 2 (COP2) for the PlayStation, responsible for
//! 3D geometry transformations and lighting calculations. It's essential
//! for 3D games performance.
//!
//! # Features
//!
//! - Matrix and vector operations
//! - Perspective transformation (RTPS, RTPT)
//! - Normal clipping (NCLIP)
//! - Color depth cueing and lighting (DPCS/DPCT/DCPL/INTPL, NCS/NCT/NCDS/NCDT/NCCS/NCCT)
//! - Outer product, squaring, average-Z, and general interpolation (OP, SQR, AVSZ3/4, GPF/GPL)
//!
//! # Hardware Details
//!
//! - 32 data registers (32-bit each)
//! - 32 control registers (32-bit each)
//! - FLAG register for overflow/underflow tracking
//! - Fixed-point arithmetic (12.4 format for most operations)
//!
//! # References
//!
//! - [PSX-SPX: GTE](http://problemkaputt.de/psx-spx.htm#geometrytransformationenginegte)

mod commands;
mod reciprocal;


/// GTE (Geometry Transformation Engine) - COP2
///
/// The GTE performs 3D geometry transformations and lighting calculations
/// for the PlayStation. It uses fixed-point arithmetic for performance.
///
/// # Example
///
/// ```
/// use psrx::core::gte::GTE;
///
/// let mut gte = GTE::new();
/// // Set up rotation matrix (identity)
/// gte.write_control(0, 0x1000);  // R11 = 1.0 in fixed-point
/// ```
pub struct GTE {
    /// Data registers (32 x 32-bit)
    ///
    /// These hold input vectors, intermediate results, and output values.
    /// Common registers:
    /// - VXY0-2: Input vectors (X,Y components)
    /// - VZ0-2: Input vectors (Z component)
    /// - SXY0-2: Screen coordinates (projection results)
    /// - MAC0-3: Multiply-accumulate registers
    data: [i32; 32],

    /// Control registers (32 x 32-bit)
    ///
    /// These hold transformation matrices, translation vectors,
    /// and projection parameters. Index 31 (FLAG) is not a plain
    /// register - see [`GTE::write_control`].
    control: [i32; 32],
}

#[allow(dead_code)]
impl GTE {
    // Data register indices
    const VXY0: usize = 0;
    const VZ0: usize = 1;
    const VXY1: usize = 2;
    const VZ1: usize = 3;
    const VXY2: usize = 4;
    const VZ2: usize = 5;
    const RGB: usize = 6; // Color/code value (RGBC)
    const OTZ: usize = 7; // Average Z value (for ordering table)
    const IR0: usize = 8;
    const IR1: usize = 9;
    const IR2: usize = 10;
    const IR3: usize = 11;
    const SXY0: usize = 12;
    const SXY1: usize = 13;
    const SXY2: usize = 14;
    const SXYP: usize = 15;
    const SZ0: usize = 16;
    const SZ1: usize = 17;
    const SZ2: usize = 18;
    const SZ3: usize = 19;
    const RGB0: usize = 20;
    const RGB1: usize = 21;
    const RGB2: usize = 22;
    const RES1: usize = 23;
    const MAC0: usize = 24;
    const MAC1: usize = 25;
    const MAC2: usize = 26;
    const MAC3: usize = 27;
    const IRGB: usize = 28;
    const ORGB: usize = 29;
    const LZCS: usize = 30;
    const LZCR: usize = 31;

    // Control register indices
    const RT11_RT12: usize = 0;
    const RT13_RT21: usize = 1;
    const RT22_RT23: usize = 2;
    const RT31_RT32: usize = 3;
    const RT33: usize = 4;
    const TRX: usize = 5;
    const TRY: usize = 6;
    const TRZ: usize = 7;
    const L11_L12: usize = 8;
    const L13_L21: usize = 9;
    const L22_L23: usize = 10;
    const L31_L32: usize = 11;
    const L33: usize = 12;
    const RBK: usize = 13;
    const GBK: usize = 14;
    const BBK: usize = 15;
    const LR1_LR2: usize = 16;
    const LR3_LG1: usize = 17;
    const LG2_LG3: usize = 18;
    const LB1_LB2: usize = 19;
    const LB3: usize = 20;
    const RFC: usize = 21;
    const GFC: usize = 22;
    const BFC: usize = 23;
    const OFX: usize = 24;
    const OFY: usize = 25;
    const H: usize = 26;
    const DQA: usize = 27;
    const DQB: usize = 28;
    const ZSF3: usize = 29;
    const ZSF4: usize = 30;
    /// The FLAG register. Distinct from `data[LZCR]` - control[31], not
    /// data[31] - even though both happen to be register index 31 in
    /// their respective files.
    const FLAG: usize = 31;

    // FLAG bit positions (control[FLAG]).
    const FLAG_MAC1_POS: u32 = 1 << 30;
    const FLAG_MAC2_POS: u32 = 1 << 29;
    const FLAG_MAC3_POS: u32 = 1 << 28;
    const FLAG_MAC1_NEG: u32 = 1 << 27;
    const FLAG_MAC2_NEG: u32 = 1 << 26;
    const FLAG_MAC3_NEG: u32 = 1 << 25;
    const FLAG_IR1_SAT: u32 = 1 << 24;
    const FLAG_IR2_SAT: u32 = 1 << 23;
    const FLAG_IR3_SAT: u32 = 1 << 22;
    const FLAG_RGB_R_SAT: u32 = 1 << 21;
    const FLAG_RGB_G_SAT: u32 = 1 << 20;
    const FLAG_RGB_B_SAT: u32 = 1 << 19;
    const FLAG_SZ_SAT: u32 = 1 << 18; // shared by SZ3 and OTZ
    const FLAG_DIVIDE_OVERFLOW: u32 = 1 << 17;
    const FLAG_MAC0_POS: u32 = 1 << 16;
    const FLAG_MAC0_NEG: u32 = 1 << 15;
    const FLAG_SX2_SAT: u32 = 1 << 14;
    const FLAG_SY2_SAT: u32 = 1 << 13;
    const FLAG_IR0_SAT: u32 = 1 << 12;

    /// Bits that contribute to the computed bit-31 "any error" summary.
    /// Notably excludes IR3-saturated and the RGB-saturated bits.
    const FLAG_ERROR_MASK: u32 = Self::FLAG_MAC1_POS
        | Self::FLAG_MAC2_POS
        | Self::FLAG_MAC3_POS
        | Self::FLAG_MAC1_NEG
        | Self::FLAG_MAC2_NEG
        | Self::FLAG_MAC3_NEG
        | Self::FLAG_IR1_SAT
        | Self::FLAG_IR2_SAT
        | Self::FLAG_SZ_SAT
        | Self::FLAG_DIVIDE_OVERFLOW
        | Self::FLAG_MAC0_POS
        | Self::FLAG_MAC0_NEG
        | Self::FLAG_SX2_SAT
        | Self::FLAG_SY2_SAT;

    /// Bits a direct CTC2 write to FLAG can set. Bit 31 itself is never
    /// directly settable - it is always recomputed from the other bits.
    const FLAG_WRITE_MASK: u32 = Self::FLAG_ERROR_MASK | Self::FLAG_IR3_SAT | Self::FLAG_RGB_R_SAT
        | Self::FLAG_RGB_G_SAT
        | Self::FLAG_RGB_B_SAT
        | Self::FLAG_IR0_SAT;

    /// Create a new GTE instance
    ///
    /// Initializes all registers to 0. In real hardware, registers
    /// would contain undefined values at power-on.
    pub fn new() -> Self {
        Self {
            data: [0; 32],
            control: [0; 32],
        }
    }

    /// Reset GTE to initial state
    pub fn reset(&mut self) {
        self.data = [0; 32];
        self.control = [0; 32];
    }

    /// Read from data register
    ///
    /// # Note
    ///
    /// Reads of `LZCR` (31) recompute the leading-zero count of `LZCS`
    /// (30) on the fly rather than returning a stored value. Reads of
    /// `IRGB`/`ORGB` return a packed 5:5:5 view onto `IR1..IR3`.
    #[inline(always)]
    pub fn read_data(&self, index: usize) -> i32 {
        match index {
            Self::LZCR => {
                let lzcs = self.data[Self::LZCS];
                if lzcs >= 0 {
                    lzcs.leading_zeros() as i32
                } else {
                    (!lzcs).leading_zeros() as i32
                }
            }
            Self::IRGB | Self::ORGB => self.pack_irgb(),
            _ => self.data[index],
        }
    }

    /// Write to data register
    ///
    /// # Note
    ///
    /// Writing to register 15 (SXYP) also pushes the screen-XY FIFO.
    /// Writing to register 28 (IRGB) unpacks a 5:5:5 color into
    /// `IR1..IR3`. `LZCS` (30) is stored as-is; the leading-zero count
    /// is computed when `LZCR` is read, not when `LZCS` is written.
    #[inline(always)]
    pub fn write_data(&mut self, index: usize, value: i32) {
        match index {
            Self::SXYP => {
                self.data[Self::SXY0] = self.data[Self::SXY1];
                self.data[Self::SXY1] = self.data[Self::SXY2];
                self.data[Self::SXY2] = value;
                self.data[Self::SXYP] = value;
            }
            Self::IRGB => {
                self.data[Self::IRGB] = value;
                self.data[Self::IR1] = ((value & 0x1F) << 7) as i32;
                self.data[Self::IR2] = (((value >> 5) & 0x1F) << 7) as i32;
                self.data[Self::IR3] = (((value >> 10) & 0x1F) << 7) as i32;
            }
            _ => {
                self.data[index] = value;
            }
        }
    }

    fn pack_irgb(&self) -> i32 {
        let r = (self.data[Self::IR1] >> 7).clamp(0, 31);
        let g = (self.data[Self::IR2] >> 7).clamp(0, 31);
        let b = (self.data[Self::IR3] >> 7).clamp(0, 31);
        (b << 10) | (g << 5) | r
    }

    /// Read from control register. Reading `FLAG` (31) returns the
    /// register as last computed by [`GTE::commit_flag`].
    #[inline(always)]
    pub fn read_control(&self, index: usize) -> i32 {
        self.control[index]
    }

    /// Write to control register.
    ///
    /// A direct write to `FLAG` (31) goes through the same write-mask
    /// and bit-31 recomputation as a command-driven update, rather than
    /// storing the raw value verbatim.
    #[inline(always)]
    pub fn write_control(&mut self, index: usize, value: i32) {
        if index == Self::FLAG {
            self.commit_flag(value as u32);
        } else {
            self.control[index] = value;
        }
    }

    /// Apply `bits` through the FLAG write mask, recompute bit 31 (set
    /// whenever any bit in [`GTE::FLAG_ERROR_MASK`] is set), and store
    /// the result. Every GTE command calls this exactly once, after
    /// accumulating all of its own flag bits - CTC2 writes go through
    /// the same path.
    fn commit_flag(&mut self, bits: u32) {
        let masked = bits & Self::FLAG_WRITE_MASK;
        let error = if masked & Self::FLAG_ERROR_MASK != 0 {
            1u32 << 31
        } else {
            0
        };
        self.control[Self::FLAG] = (masked | error) as i32;
    }

    /// Dispatches a GTE command to the appropriate handler based on the
    /// opcode encoded in bits [5:0] of the command word.
    pub fn execute(&mut self, command: u32) {
        let opcode = command & 0x3F;
        let sf = (command & (1 << 19)) != 0;
        let lm = (command & (1 << 10)) != 0;

        match opcode {
            0x01 => self.rtps(sf, lm),
            0x06 => self.nclip(),
            0x0C => self.op_cmd(sf, lm),
            0x10 => self.dpcs(sf, lm),
            0x11 => self.intpl(sf, lm),
            0x12 => self.mvmva(command),
            0x13 => self.ncds(sf, lm),
            0x16 => self.ncdt(sf, lm),
            0x1B => self.nccs(sf, lm),
            0x1E => self.ncs(sf, lm),
            0x20 => self.nct(sf, lm),
            0x28 => self.sqr(sf),
            0x29 => self.dcpl(sf, lm),
            0x2A => self.dpct(sf, lm),
            0x2D => self.avsz3(),
            0x2E => self.avsz4(),
            0x30 => self.rtpt(sf, lm),
            0x3D => self.gpf(sf, lm),
            0x3E => self.gpl(sf, lm),
            0x3F => self.ncct(sf, lm),
            _ => {
                log::warn!("Unknown GTE command: 0x{:02X}", opcode);
                // Bit 31 is normally a computed summary, not directly
                // settable - force it here since there are no per-field
                // flag bits to derive it from.
                self.control[Self::FLAG] |= 1 << 31;
            }
        }
    }
}

impl Default for GTE {
    fn default() -> Self {
        Self::new()
    }
}
