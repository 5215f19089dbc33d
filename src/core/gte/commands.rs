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

//! GTE command bodies: matrix/vector helpers and the individual opcode
//! handlers dispatched from [`super::GTE::execute`].

use super::reciprocal::unr_divide;
use super::GTE;

type Mat3 = [[i32; 3]; 3];

/// Split a packed control word into its low/high 16-bit fixed-point
/// components, sign extended.
fn unpack16(word: i32) -> (i32, i32) {
    ((word as i16) as i32, ((word >> 16) as i16) as i32)
}

fn wrap44(raw: i64) -> i64 {
    let mask = (1i64 << 44) - 1;
    let wrapped = raw & mask;
    if wrapped & (1i64 << 43) != 0 {
        wrapped - (1i64 << 44)
    } else {
        wrapped
    }
}

fn check_mac_overflow(raw: i64, pos_bit: u32, neg_bit: u32, flags: &mut u32) {
    const BOUND: i64 = 1i64 << 43;
    if raw >= BOUND {
        *flags |= pos_bit;
    }
    if raw < -BOUND {
        *flags |= neg_bit;
    }
}

fn check_mac0_overflow(raw: i64, flags: &mut u32) {
    if raw > i32::MAX as i64 {
        *flags |= GTE::FLAG_MAC0_POS;
    }
    if raw < i32::MIN as i64 {
        *flags |= GTE::FLAG_MAC0_NEG;
    }
}

fn saturate_ir(val: i64, lm: bool, bit: u32, flags: &mut u32) -> i32 {
    let lo = if lm { 0 } else { -0x8000 };
    let hi = 0x7FFF;
    if val < lo {
        *flags |= bit;
        lo as i32
    } else if val > hi {
        *flags |= bit;
        hi as i32
    } else {
        val as i32
    }
}

fn saturate_ir_nolm(val: i64, bit: u32, flags: &mut u32) -> i32 {
    saturate_ir(val, false, bit, flags)
}

fn saturate_ir0(val: i64, flags: &mut u32) -> i32 {
    if val < 0 {
        *flags |= GTE::FLAG_IR0_SAT;
        0
    } else if val > 0x1000 {
        *flags |= GTE::FLAG_IR0_SAT;
        0x1000
    } else {
        val as i32
    }
}

fn saturate_sz(val: i64, flags: &mut u32) -> u16 {
    if val < 0 {
        *flags |= GTE::FLAG_SZ_SAT;
        0
    } else if val > 0xFFFF {
        *flags |= GTE::FLAG_SZ_SAT;
        0xFFFF
    } else {
        val as u16
    }
}

fn saturate_sxy(val: i64, bit: u32, flags: &mut u32) -> i16 {
    if val < -0x400 {
        *flags |= bit;
        -0x400
    } else if val > 0x3FF {
        *flags |= bit;
        0x3FF
    } else {
        val as i16
    }
}

fn saturate_rgb(val: i64, bit: u32, flags: &mut u32) -> u8 {
    if val < 0 {
        *flags |= bit;
        0
    } else if val > 0xFF {
        *flags |= bit;
        0xFF
    } else {
        val as u8
    }
}

impl GTE {
    fn rt_matrix(&self) -> Mat3 {
        let (r11, r12) = unpack16(self.control[Self::RT11_RT12]);
        let (r13, r21) = unpack16(self.control[Self::RT13_RT21]);
        let (r22, r23) = unpack16(self.control[Self::RT22_RT23]);
        let (r31, r32) = unpack16(self.control[Self::RT31_RT32]);
        let r33 = self.control[Self::RT33] as i16 as i32;
        [[r11, r12, r13], [r21, r22, r23], [r31, r32, r33]]
    }

    fn light_matrix(&self) -> Mat3 {
        let (l11, l12) = unpack16(self.control[Self::L11_L12]);
        let (l13, l21) = unpack16(self.control[Self::L13_L21]);
        let (l22, l23) = unpack16(self.control[Self::L22_L23]);
        let (l31, l32) = unpack16(self.control[Self::L31_L32]);
        let l33 = self.control[Self::L33] as i16 as i32;
        [[l11, l12, l13], [l21, l22, l23], [l31, l32, l33]]
    }

    fn light_color_matrix(&self) -> Mat3 {
        let (lr1, lr2) = unpack16(self.control[Self::LR1_LR2]);
        let (lr3, lg1) = unpack16(self.control[Self::LR3_LG1]);
        let (lg2, lg3) = unpack16(self.control[Self::LG2_LG3]);
        let (lb1, lb2) = unpack16(self.control[Self::LB1_LB2]);
        let lb3 = self.control[Self::LB3] as i16 as i32;
        [[lr1, lr2, lr3], [lg1, lg2, lg3], [lb1, lb2, lb3]]
    }

    /// The `mx == 3` "bugged matrix" selector: row 0 comes from RGBC and
    /// IR0, rows 1 and 2 are both the RT13 element splatted 3 times.
    fn bugged_matrix(&self) -> Mat3 {
        let (r, _, _) = self.rgbc();
        let rt13 = self.rt_matrix()[0][2];
        let row0 = [-(r << 4), r << 4, self.data[Self::IR0]];
        [row0, [rt13, rt13, rt13], [rt13, rt13, rt13]]
    }

    fn rgbc(&self) -> (i32, i32, i32) {
        let w = self.data[Self::RGB] as u32;
        ((w & 0xFF) as i32, ((w >> 8) & 0xFF) as i32, ((w >> 16) & 0xFF) as i32)
    }

    fn vertex(&self, n: usize) -> (i32, i32, i32) {
        let (vxy, vz) = match n {
            0 => (Self::VXY0, Self::VZ0),
            1 => (Self::VXY1, Self::VZ1),
            _ => (Self::VXY2, Self::VZ2),
        };
        let (x, y) = unpack16(self.data[vxy]);
        let z = self.data[vz] as i16 as i32;
        (x, y, z)
    }

    fn ir_vector(&self) -> (i32, i32, i32) {
        (self.data[Self::IR1], self.data[Self::IR2], self.data[Self::IR3])
    }

    fn push_sz_fifo(&mut self, sz: u16) {
        self.data[Self::SZ0] = self.data[Self::SZ1];
        self.data[Self::SZ1] = self.data[Self::SZ2];
        self.data[Self::SZ2] = self.data[Self::SZ3];
        self.data[Self::SZ3] = sz as i32;
    }

    fn push_sxy_fifo(&mut self, x: i16, y: i16) {
        let packed = ((x as u16 as i32) & 0xFFFF) | ((y as i32) << 16);
        self.data[Self::SXY0] = self.data[Self::SXY1];
        self.data[Self::SXY1] = self.data[Self::SXY2];
        self.data[Self::SXY2] = packed;
        self.data[Self::SXYP] = packed;
    }

    fn push_rgb_fifo(&mut self, r: u8, g: u8, b: u8) {
        let code = (self.data[Self::RGB] >> 24) & 0xFF;
        let packed = (r as i32) | ((g as i32) << 8) | ((b as i32) << 16) | (code << 24);
        self.data[Self::RGB0] = self.data[Self::RGB1];
        self.data[Self::RGB1] = self.data[Self::RGB2];
        self.data[Self::RGB2] = packed;
    }

    /// Run the full perspective-transform pipeline for a single vertex:
    /// rotate+translate, derive SZ3 and the IR1-3 intermediates, then
    /// a UNR_TABLE reciprocal and the screen-space projection. Flag
    /// bits accumulate into `flags` rather than being committed here,
    /// so callers running this for multiple vertices (RTPT) can share
    /// one accumulator and commit once.
    fn transform_vertex(&mut self, v: (i32, i32, i32), sf: bool, lm: bool, flags: &mut u32) {
        let shift = if sf { 12 } else { 0 };
        let rt = self.rt_matrix();
        let tr = (
            self.control[Self::TRX] as i64,
            self.control[Self::TRY] as i64,
            self.control[Self::TRZ] as i64,
        );
        let (vx, vy, vz) = (v.0 as i64, v.1 as i64, v.2 as i64);

        let raw = [
            (tr.0 << 12) + rt[0][0] as i64 * vx + rt[0][1] as i64 * vy + rt[0][2] as i64 * vz,
            (tr.1 << 12) + rt[1][0] as i64 * vx + rt[1][1] as i64 * vy + rt[1][2] as i64 * vz,
            (tr.2 << 12) + rt[2][0] as i64 * vx + rt[2][1] as i64 * vy + rt[2][2] as i64 * vz,
        ];
        let pos_bits = [Self::FLAG_MAC1_POS, Self::FLAG_MAC2_POS, Self::FLAG_MAC3_POS];
        let neg_bits = [Self::FLAG_MAC1_NEG, Self::FLAG_MAC2_NEG, Self::FLAG_MAC3_NEG];
        let ir_bits = [Self::FLAG_IR1_SAT, Self::FLAG_IR2_SAT, Self::FLAG_IR3_SAT];
        let mac_regs = [Self::MAC1, Self::MAC2, Self::MAC3];
        let ir_regs = [Self::IR1, Self::IR2, Self::IR3];

        let mut wrapped = [0i64; 3];
        for i in 0..3 {
            check_mac_overflow(raw[i], pos_bits[i], neg_bits[i], flags);
            wrapped[i] = wrap44(raw[i]);
        }

        // SZ3 always uses the fixed 12-bit shift of the unshifted value.
        let sz3_raw = wrapped[2] >> 12;
        let sz3 = saturate_sz(sz3_raw, flags);
        self.push_sz_fifo(sz3);

        for i in 0..3 {
            let shifted = wrapped[i] >> shift;
            self.data[mac_regs[i]] = shifted as i32;
            let ir = saturate_ir(shifted, lm, ir_bits[i], flags);
            self.data[ir_regs[i]] = ir;
        }

        let h = self.control[Self::H] as u16 as u32;
        let (quot, overflow) = unr_divide(h, sz3 as u32);
        if overflow {
            *flags |= Self::FLAG_DIVIDE_OVERFLOW;
        }

        let ir1 = self.data[Self::IR1] as i64;
        let ir2 = self.data[Self::IR2] as i64;
        let quot = quot as i64;

        let mac0_x = self.control[Self::OFX] as i64 + ir1 * quot;
        check_mac0_overflow(mac0_x, flags);
        self.data[Self::MAC0] = mac0_x as i32;
        let sx = saturate_sxy(mac0_x >> 16, Self::FLAG_SX2_SAT, flags);

        let mac0_y = self.control[Self::OFY] as i64 + ir2 * quot;
        check_mac0_overflow(mac0_y, flags);
        self.data[Self::MAC0] = mac0_y as i32;
        let sy = saturate_sxy(mac0_y >> 16, Self::FLAG_SY2_SAT, flags);
        self.push_sxy_fifo(sx, sy);

        let mac0_z = self.control[Self::DQB] as i64 + self.control[Self::DQA] as i64 * quot;
        check_mac0_overflow(mac0_z, flags);
        self.data[Self::MAC0] = mac0_z as i32;
        let ir0 = saturate_ir0(mac0_z >> 12, flags);
        self.data[Self::IR0] = ir0;
    }

    /// RTPS: perspective-transform a single vertex (VXY0/VZ0).
    pub(super) fn rtps(&mut self, sf: bool, lm: bool) {
        let v = self.vertex(0);
        let mut flags = 0u32;
        self.transform_vertex(v, sf, lm, &mut flags);
        self.commit_flag(flags);
    }

    /// RTPT: perspective-transform all three vertices, sharing one
    /// flag accumulator across V0, V1 and V2 and committing once.
    pub(super) fn rtpt(&mut self, sf: bool, lm: bool) {
        let mut flags = 0u32;
        for n in 0..3 {
            let v = self.vertex(n);
            self.transform_vertex(v, sf, lm, &mut flags);
        }
        self.commit_flag(flags);
    }

    /// NCLIP: cross-product ordering test over the last three projected
    /// screen-space vertices, used to determine triangle winding.
    pub(super) fn nclip(&mut self) {
        let (sx0, sy0) = unpack16(self.data[Self::SXY0]);
        let (sx1, sy1) = unpack16(self.data[Self::SXY1]);
        let (sx2, sy2) = unpack16(self.data[Self::SXY2]);
        let raw = sx0 as i64 * (sy1 - sy2) as i64
            + sx1 as i64 * (sy2 - sy0) as i64
            + sx2 as i64 * (sy0 - sy1) as i64;
        let mut flags = 0u32;
        check_mac0_overflow(raw, &mut flags);
        self.data[Self::MAC0] = raw as i32;
        self.commit_flag(flags);
    }

    /// OP: outer (cross) product of IR1-3 against the diagonal of the
    /// rotation matrix.
    pub(super) fn op_cmd(&mut self, sf: bool, lm: bool) {
        let shift = if sf { 12 } else { 0 };
        let rt = self.rt_matrix();
        let (ir1, ir2, ir3) = self.ir_vector();
        let (ir1, ir2, ir3) = (ir1 as i64, ir2 as i64, ir3 as i64);
        let raw = [
            rt[1][1] as i64 * ir3 - rt[2][2] as i64 * ir2,
            rt[2][2] as i64 * ir1 - rt[0][0] as i64 * ir3,
            rt[0][0] as i64 * ir2 - rt[1][1] as i64 * ir1,
        ];
        let mut flags = 0u32;
        self.mac_ir_commit(raw, shift, lm, &mut flags);
        self.commit_flag(flags);
    }

    /// Shared 44-bit-check -> wrap -> shift -> MAC store -> IR saturate
    /// pattern used by OP, SQR, GPF and GPL.
    fn mac_ir_commit(&mut self, raw: [i64; 3], shift: u32, lm: bool, flags: &mut u32) {
        let pos_bits = [Self::FLAG_MAC1_POS, Self::FLAG_MAC2_POS, Self::FLAG_MAC3_POS];
        let neg_bits = [Self::FLAG_MAC1_NEG, Self::FLAG_MAC2_NEG, Self::FLAG_MAC3_NEG];
        let ir_bits = [Self::FLAG_IR1_SAT, Self::FLAG_IR2_SAT, Self::FLAG_IR3_SAT];
        let mac_regs = [Self::MAC1, Self::MAC2, Self::MAC3];
        let ir_regs = [Self::IR1, Self::IR2, Self::IR3];
        for i in 0..3 {
            check_mac_overflow(raw[i], pos_bits[i], neg_bits[i], flags);
            let shifted = wrap44(raw[i]) >> shift;
            self.data[mac_regs[i]] = shifted as i32;
            let ir = saturate_ir(shifted, lm, ir_bits[i], flags);
            self.data[ir_regs[i]] = ir;
        }
    }

    /// Depth-cue tail shared by DPCS/DPCT/DCPL/INTPL: subtract `seed`
    /// from the far-color translation, saturate without `lm`, then
    /// blend back in through IR0 and push the result through the RGB
    /// FIFO.
    fn depth_cue_tail(&mut self, seed: [i64; 3], sf: bool, lm: bool, flags: &mut u32) {
        let fc = (
            self.control[Self::RFC] as i64,
            self.control[Self::GFC] as i64,
            self.control[Self::BFC] as i64,
        );
        let raw = [(fc.0 << 12) - seed[0], (fc.1 << 12) - seed[1], (fc.2 << 12) - seed[2]];
        self.depth_cue_tail_raw(raw, sf, lm, flags);
    }

    /// As [`GTE::depth_cue_tail`] but takes the already-computed
    /// pre-shift MAC directly, skipping the far-color subtraction.
    /// Used by NCDS/NCDT which feed the lighting stage's own MAC in.
    fn depth_cue_tail_raw(&mut self, raw: [i64; 3], sf: bool, lm: bool, flags: &mut u32) {
        let shift = if sf { 12 } else { 0 };
        let pos_bits = [Self::FLAG_MAC1_POS, Self::FLAG_MAC2_POS, Self::FLAG_MAC3_POS];
        let neg_bits = [Self::FLAG_MAC1_NEG, Self::FLAG_MAC2_NEG, Self::FLAG_MAC3_NEG];
        let ir_bits = [Self::FLAG_IR1_SAT, Self::FLAG_IR2_SAT, Self::FLAG_IR3_SAT];
        let rgb_bits = [Self::FLAG_RGB_R_SAT, Self::FLAG_RGB_G_SAT, Self::FLAG_RGB_B_SAT];
        let mac_regs = [Self::MAC1, Self::MAC2, Self::MAC3];
        let ir_regs = [Self::IR1, Self::IR2, Self::IR3];
        let ir0 = self.data[Self::IR0] as i64;

        let mut mid = [0i32; 3];
        for i in 0..3 {
            check_mac_overflow(raw[i], pos_bits[i], neg_bits[i], flags);
            let shifted = wrap44(raw[i]) >> shift;
            mid[i] = saturate_ir_nolm(shifted, ir_bits[i], flags);
        }

        let mut rgb = [0u8; 3];
        for i in 0..3 {
            let raw2 = mid[i] as i64 * ir0 + raw[i];
            check_mac_overflow(raw2, pos_bits[i], neg_bits[i], flags);
            let shifted2 = wrap44(raw2) >> shift;
            self.data[mac_regs[i]] = shifted2 as i32;
            self.data[ir_regs[i]] = saturate_ir(shifted2, lm, ir_bits[i], flags);
            rgb[i] = saturate_rgb(shifted2 >> 4, rgb_bits[i], flags);
        }
        self.push_rgb_fifo(rgb[0], rgb[1], rgb[2]);
    }

    /// DPCS: depth-cue a single color (RGBC) toward the far color.
    pub(super) fn dpcs(&mut self, sf: bool, lm: bool) {
        let (r, g, b) = self.rgbc();
        let seed = [(r as i64) << 16, (g as i64) << 16, (b as i64) << 16];
        let mut flags = 0u32;
        self.depth_cue_tail(seed, sf, lm, &mut flags);
        self.commit_flag(flags);
    }

    /// DPCT: DPCS repeated for three vertices, sharing one accumulator.
    pub(super) fn dpct(&mut self, sf: bool, lm: bool) {
        let (r, g, b) = self.rgbc();
        let seed = [(r as i64) << 16, (g as i64) << 16, (b as i64) << 16];
        let mut flags = 0u32;
        for _ in 0..3 {
            self.depth_cue_tail(seed, sf, lm, &mut flags);
        }
        self.commit_flag(flags);
    }

    /// DCPL: depth-cue using the color/normal product as the seed.
    pub(super) fn dcpl(&mut self, sf: bool, lm: bool) {
        let (r, g, b) = self.rgbc();
        let (ir1, ir2, ir3) = self.ir_vector();
        let seed = [
            ((r as i64) << 4) * ir1 as i64,
            ((g as i64) << 4) * ir2 as i64,
            ((b as i64) << 4) * ir3 as i64,
        ];
        let mut flags = 0u32;
        self.depth_cue_tail(seed, sf, lm, &mut flags);
        self.commit_flag(flags);
    }

    /// INTPL: depth-cue using the current IR vector as the seed.
    pub(super) fn intpl(&mut self, sf: bool, lm: bool) {
        let (ir1, ir2, ir3) = self.ir_vector();
        let seed = [(ir1 as i64) << 12, (ir2 as i64) << 12, (ir3 as i64) << 12];
        let mut flags = 0u32;
        self.depth_cue_tail(seed, sf, lm, &mut flags);
        self.commit_flag(flags);
    }

    fn select_vector(&self, vx: u32) -> (i32, i32, i32) {
        match vx {
            0 => self.vertex(0),
            1 => self.vertex(1),
            2 => self.vertex(2),
            _ => self.ir_vector(),
        }
    }

    fn select_matrix(&self, mx: u32) -> Mat3 {
        match mx {
            0 => self.rt_matrix(),
            1 => self.light_matrix(),
            2 => self.light_color_matrix(),
            _ => self.bugged_matrix(),
        }
    }

    fn select_translation(&self, tx: u32) -> (i64, i64, i64) {
        match tx {
            0 => (
                self.control[Self::TRX] as i64,
                self.control[Self::TRY] as i64,
                self.control[Self::TRZ] as i64,
            ),
            1 => (
                self.control[Self::RBK] as i64,
                self.control[Self::GBK] as i64,
                self.control[Self::BBK] as i64,
            ),
            2 => (
                self.control[Self::RFC] as i64,
                self.control[Self::GFC] as i64,
                self.control[Self::BFC] as i64,
            ),
            _ => (0, 0, 0),
        }
    }

    /// MVMVA: generic matrix * vector + translation, with the matrix
    /// (`mx`), vector (`vx`) and translation (`tx`) operands each
    /// independently selected from the command word. `tx == 2` (the
    /// far-color translation) reproduces the hardware bug where the
    /// un-translated product is saturated and discarded before the
    /// translation is added back in.
    pub(super) fn mvmva(&mut self, command: u32) {
        let sf = (command & (1 << 19)) != 0;
        let lm = (command & (1 << 10)) != 0;
        let mx = (command >> 17) & 0x3;
        let vx = (command >> 15) & 0x3;
        let tx = (command >> 13) & 0x3;
        let shift = if sf { 12 } else { 0 };

        let matrix = self.select_matrix(mx);
        let (vx0, vy0, vz0) = self.select_vector(vx);
        let (vx0, vy0, vz0) = (vx0 as i64, vy0 as i64, vz0 as i64);
        let translation = self.select_translation(tx);

        let product = |row: usize| -> i64 {
            matrix[row][0] as i64 * vx0 + matrix[row][1] as i64 * vy0 + matrix[row][2] as i64 * vz0
        };

        let mut flags = 0u32;
        if tx == 2 {
            let mut discard = 0u32;
            for row in 0..3 {
                let wrapped = wrap44(product(row)) >> shift;
                let _ = saturate_ir_nolm(wrapped, 0, &mut discard);
            }
        }
        let raw = [
            (translation.0 << 12) + product(0),
            (translation.1 << 12) + product(1),
            (translation.2 << 12) + product(2),
        ];
        self.mac_ir_commit(raw, shift, lm, &mut flags);
        self.commit_flag(flags);
    }

    /// Shared normal-lighting pipeline for the NC* command family:
    /// transform a normal through the light matrix, then add the
    /// background color through the light-color matrix.
    fn light_normal(&mut self, v: (i32, i32, i32), sf: bool, lm: bool, flags: &mut u32) -> [i32; 3] {
        let shift = if sf { 12 } else { 0 };
        let llm = self.light_matrix();
        let (vx, vy, vz) = (v.0 as i64, v.1 as i64, v.2 as i64);
        let raw = [
            llm[0][0] as i64 * vx + llm[0][1] as i64 * vy + llm[0][2] as i64 * vz,
            llm[1][0] as i64 * vx + llm[1][1] as i64 * vy + llm[1][2] as i64 * vz,
            llm[2][0] as i64 * vx + llm[2][1] as i64 * vy + llm[2][2] as i64 * vz,
        ];
        self.mac_ir_commit(raw, shift, lm, flags);
        let (ir1, ir2, ir3) = self.ir_vector();

        let lcm = self.light_color_matrix();
        let bk = (
            self.control[Self::RBK] as i64,
            self.control[Self::GBK] as i64,
            self.control[Self::BBK] as i64,
        );
        let raw2 = [
            (bk.0 << 12) + lcm[0][0] as i64 * ir1 as i64 + lcm[0][1] as i64 * ir2 as i64 + lcm[0][2] as i64 * ir3 as i64,
            (bk.1 << 12) + lcm[1][0] as i64 * ir1 as i64 + lcm[1][1] as i64 * ir2 as i64 + lcm[1][2] as i64 * ir3 as i64,
            (bk.2 << 12) + lcm[2][0] as i64 * ir1 as i64 + lcm[2][1] as i64 * ir2 as i64 + lcm[2][2] as i64 * ir3 as i64,
        ];
        self.mac_ir_commit(raw2, shift, lm, flags);
        [self.data[Self::MAC1], self.data[Self::MAC2], self.data[Self::MAC3]]
    }

    fn push_rgb_from_mac(&mut self, mac: [i32; 3], flags: &mut u32) {
        let rgb_bits = [Self::FLAG_RGB_R_SAT, Self::FLAG_RGB_G_SAT, Self::FLAG_RGB_B_SAT];
        let mut rgb = [0u8; 3];
        for i in 0..3 {
            rgb[i] = saturate_rgb(mac[i] as i64 >> 4, rgb_bits[i], flags);
        }
        self.push_rgb_fifo(rgb[0], rgb[1], rgb[2]);
    }

    /// NCS: normal-color for one vertex, pushed directly to the RGB FIFO.
    pub(super) fn ncs(&mut self, sf: bool, lm: bool) {
        let mut flags = 0u32;
        let mac = self.light_normal(self.vertex(0), sf, lm, &mut flags);
        self.push_rgb_from_mac(mac, &mut flags);
        self.commit_flag(flags);
    }

    /// NCT: NCS repeated across all three vertices.
    pub(super) fn nct(&mut self, sf: bool, lm: bool) {
        let mut flags = 0u32;
        for n in 0..3 {
            let v = self.vertex(n);
            let mac = self.light_normal(v, sf, lm, &mut flags);
            self.push_rgb_from_mac(mac, &mut flags);
        }
        self.commit_flag(flags);
    }

    fn modulate_color(&mut self, mac: [i32; 3], sf: bool, lm: bool, flags: &mut u32) -> [i32; 3] {
        let shift = if sf { 12 } else { 0 };
        let (r, g, b) = self.rgbc();
        let raw = [
            ((r as i64) << 4) * mac[0] as i64,
            ((g as i64) << 4) * mac[1] as i64,
            ((b as i64) << 4) * mac[2] as i64,
        ];
        self.mac_ir_commit(raw, shift, lm, flags);
        [self.data[Self::MAC1], self.data[Self::MAC2], self.data[Self::MAC3]]
    }

    /// NCCS: normal-color modulated by RGBC, for one vertex.
    pub(super) fn nccs(&mut self, sf: bool, lm: bool) {
        let mut flags = 0u32;
        let mac = self.light_normal(self.vertex(0), sf, lm, &mut flags);
        let mac = self.modulate_color(mac, sf, lm, &mut flags);
        self.push_rgb_from_mac(mac, &mut flags);
        self.commit_flag(flags);
    }

    /// NCCT: NCCS repeated across all three vertices.
    pub(super) fn ncct(&mut self, sf: bool, lm: bool) {
        let mut flags = 0u32;
        for n in 0..3 {
            let v = self.vertex(n);
            let mac = self.light_normal(v, sf, lm, &mut flags);
            let mac = self.modulate_color(mac, sf, lm, &mut flags);
            self.push_rgb_from_mac(mac, &mut flags);
        }
        self.commit_flag(flags);
    }

    fn normal_depth_cue(&mut self, v: (i32, i32, i32), sf: bool, lm: bool, flags: &mut u32) {
        let mac = self.light_normal(v, sf, lm, flags);
        let shift = if sf { 12 } else { 0 };
        let raw = [(mac[0] as i64) << shift, (mac[1] as i64) << shift, (mac[2] as i64) << shift];
        self.depth_cue_tail_raw(raw, sf, lm, flags);
    }

    /// NCDS: normal-color depth-cued toward the far color, one vertex.
    pub(super) fn ncds(&mut self, sf: bool, lm: bool) {
        let mut flags = 0u32;
        self.normal_depth_cue(self.vertex(0), sf, lm, &mut flags);
        self.commit_flag(flags);
    }

    /// NCDT: NCDS repeated across all three vertices.
    pub(super) fn ncdt(&mut self, sf: bool, lm: bool) {
        let mut flags = 0u32;
        for n in 0..3 {
            let v = self.vertex(n);
            self.normal_depth_cue(v, sf, lm, &mut flags);
        }
        self.commit_flag(flags);
    }

    /// SQR: component-wise square of the IR vector. `lm` is forced on
    /// regardless of the command's `lm` bit, since a square is never
    /// negative.
    pub(super) fn sqr(&mut self, sf: bool) {
        let shift = if sf { 12 } else { 0 };
        let (ir1, ir2, ir3) = self.ir_vector();
        let raw = [ir1 as i64 * ir1 as i64, ir2 as i64 * ir2 as i64, ir3 as i64 * ir3 as i64];
        let mut flags = 0u32;
        self.mac_ir_commit(raw, shift, true, &mut flags);
        self.commit_flag(flags);
    }

    /// AVSZ3: weighted average of SZ1-3 into OTZ. The only command
    /// family (besides AVSZ4) that writes OTZ.
    pub(super) fn avsz3(&mut self) {
        let zsf3 = self.control[Self::ZSF3] as i64;
        let sum = self.data[Self::SZ1] as i64 + self.data[Self::SZ2] as i64 + self.data[Self::SZ3] as i64;
        let raw = zsf3 * sum;
        let mut flags = 0u32;
        check_mac0_overflow(raw, &mut flags);
        self.data[Self::MAC0] = raw as i32;
        let otz = saturate_sz(raw >> 12, &mut flags);
        self.data[Self::OTZ] = otz as i32;
        self.commit_flag(flags);
    }

    /// AVSZ4: weighted average of SZ0-3 into OTZ.
    pub(super) fn avsz4(&mut self) {
        let zsf4 = self.control[Self::ZSF4] as i64;
        let sum = self.data[Self::SZ0] as i64
            + self.data[Self::SZ1] as i64
            + self.data[Self::SZ2] as i64
            + self.data[Self::SZ3] as i64;
        let raw = zsf4 * sum;
        let mut flags = 0u32;
        check_mac0_overflow(raw, &mut flags);
        self.data[Self::MAC0] = raw as i32;
        let otz = saturate_sz(raw >> 12, &mut flags);
        self.data[Self::OTZ] = otz as i32;
        self.commit_flag(flags);
    }

    /// GPF: `MAC_i = (IR_i * IR0) >> sf`, then pushed through the RGB
    /// FIFO.
    pub(super) fn gpf(&mut self, sf: bool, lm: bool) {
        let shift = if sf { 12 } else { 0 };
        let (ir1, ir2, ir3) = self.ir_vector();
        let ir0 = self.data[Self::IR0] as i64;
        let raw = [ir1 as i64 * ir0, ir2 as i64 * ir0, ir3 as i64 * ir0];
        let mut flags = 0u32;
        self.mac_ir_commit(raw, shift, lm, &mut flags);
        let mac = [self.data[Self::MAC1], self.data[Self::MAC2], self.data[Self::MAC3]];
        self.push_rgb_from_mac(mac, &mut flags);
        self.commit_flag(flags);
    }

    /// GPL: as GPF but accumulates onto the current MAC1-3 (re-shifted
    /// up to raw precision) instead of starting from zero.
    pub(super) fn gpl(&mut self, sf: bool, lm: bool) {
        let shift = if sf { 12 } else { 0 };
        let (ir1, ir2, ir3) = self.ir_vector();
        let ir0 = self.data[Self::IR0] as i64;
        let base = [
            (self.data[Self::MAC1] as i64) << shift,
            (self.data[Self::MAC2] as i64) << shift,
            (self.data[Self::MAC3] as i64) << shift,
        ];
        let raw = [
            base[0] + ir1 as i64 * ir0,
            base[1] + ir2 as i64 * ir0,
            base[2] + ir3 as i64 * ir0,
        ];
        let mut flags = 0u32;
        self.mac_ir_commit(raw, shift, lm, &mut flags);
        let mac = [self.data[Self::MAC1], self.data[Self::MAC2], self.data[Self::MAC3]];
        self.push_rgb_from_mac(mac, &mut flags);
        self.commit_flag(flags);
    }
}
