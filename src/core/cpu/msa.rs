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

//! MSA (SIMD) element helpers
//!
//! A vector register is 128 bits wide and is viewed as 16 bytes, 8
//! halfwords, 4 words or 2 doublewords depending on the data format field
//! of the instruction. Every element operation goes through
//! [`map_elements`], which unpacks both operands, applies the operation
//! to each lane and packs the result.
//!
//! Float element operations report through [`Msa::fp_status`]; the caller
//! brackets a vector operation with [`Msa::clear_msacsr_cause`] and
//! [`Msa::check_msacsr_cause`].

use super::fpu::{
    fp, get_fp_cause, get_fp_enable, get_fp_flags, ieee_ex_to_mips, set_fp_cause, set_fp_flags,
    update_fp_flags, FloatFlags, FloatStatus, FpOperand, RoundingMode,
};
use crate::core::error::{CpuResult, Exception, ExceptionKind};
use serde::{Deserialize, Serialize};

/// 128-bit vector register, low doubleword first
pub type Wr = [u64; 2];

/// MSACSR.NX: non-trapping exception mode
pub const MSACSR_NX: u32 = 1 << 18;
pub const MSACSR_FS: u32 = 1 << 24;
const MSACSR_RM_MASK: u32 = 0x3;

/// Element width selected by the df field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Byte,
    Half,
    Word,
    Double,
}

impl DataFormat {
    /// Decode the 2-bit df field
    ///
    /// The decoder only ever produces values 0-3, so anything else is a bug
    /// in the caller.
    pub fn from_df(df: u32) -> Self {
        match df {
            0 => DataFormat::Byte,
            1 => DataFormat::Half,
            2 => DataFormat::Word,
            3 => DataFormat::Double,
            _ => unreachable!("invalid MSA data format {}", df),
        }
    }

    /// Element width in bits
    pub fn bits(self) -> u32 {
        8 << (self as u32)
    }

    /// Number of elements in a 128-bit register
    pub fn elements(self) -> usize {
        (128 / self.bits()) as usize
    }

    fn mask(self) -> u64 {
        match self {
            DataFormat::Double => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }

    /// Sign-extend an element value
    pub fn signed(self, value: u64) -> i64 {
        let shift = 64 - self.bits();
        ((value << shift) as i64) >> shift
    }

    /// Zero-extend an element value
    pub fn unsigned(self, value: u64) -> u64 {
        value & self.mask()
    }
}

/// Element `i` of `wr`, zero-extended
pub fn element(wr: &Wr, df: DataFormat, i: usize) -> u64 {
    let bits = df.bits() as usize;
    let bit = i * bits;
    (wr[bit / 64] >> (bit % 64)) & df.mask()
}

/// Replace element `i` of `wr`
pub fn set_element(wr: &mut Wr, df: DataFormat, i: usize, value: u64) {
    let bits = df.bits() as usize;
    let bit = i * bits;
    let shift = bit % 64;
    let word = &mut wr[bit / 64];
    *word = (*word & !(df.mask() << shift)) | ((value & df.mask()) << shift);
}

/// Apply `op` lane by lane; operands are passed zero-extended
pub fn map_elements<F>(df: DataFormat, a: &Wr, b: &Wr, mut op: F) -> Wr
where
    F: FnMut(u64, u64) -> u64,
{
    let mut out = [0u64; 2];
    for i in 0..df.elements() {
        let value = op(element(a, df, i), element(b, df, i));
        set_element(&mut out, df, i, value);
    }
    out
}

/// ADDV.df
///
/// # Example
///
/// ```
/// use mipsmt::core::cpu::msa::{addv, DataFormat};
///
/// let r = addv(DataFormat::Byte, &[0xFF, 0], &[0x01, 0]);
/// assert_eq!(r, [0, 0]);
/// ```
pub fn addv(df: DataFormat, a: &Wr, b: &Wr) -> Wr {
    map_elements(df, a, b, |x, y| x.wrapping_add(y))
}

/// SUBV.df
pub fn subv(df: DataFormat, a: &Wr, b: &Wr) -> Wr {
    map_elements(df, a, b, |x, y| x.wrapping_sub(y))
}

/// MAX_S.df
pub fn max_s(df: DataFormat, a: &Wr, b: &Wr) -> Wr {
    map_elements(df, a, b, |x, y| {
        if df.signed(x) > df.signed(y) {
            x
        } else {
            y
        }
    })
}

/// MIN_U.df
pub fn min_u(df: DataFormat, a: &Wr, b: &Wr) -> Wr {
    map_elements(df, a, b, |x, y| {
        if df.unsigned(x) < df.unsigned(y) {
            x
        } else {
            y
        }
    })
}

/// CEQ.df: all ones in lanes that compare equal
pub fn ceq(df: DataFormat, a: &Wr, b: &Wr) -> Wr {
    map_elements(df, a, b, |x, y| if x == y { u64::MAX } else { 0 })
}

/// Per-VPE MSA control state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msa {
    pub msacsr: u32,
    /// MSACSR as it was before the current vector operation
    pub msacsr_saved: u32,
    pub fp_status: FloatStatus,
}

impl Msa {
    /// Apply MSACSR.RM and MSACSR.FS to the kernel context
    pub fn restore_modes(&mut self) {
        self.fp_status.rounding_mode = RoundingMode::from_rm(self.msacsr & MSACSR_RM_MASK);
        self.fp_status.flush_to_zero = self.msacsr & MSACSR_FS != 0;
    }

    /// Start a vector float operation
    pub fn clear_msacsr_cause(&mut self) {
        set_fp_cause(&mut self.msacsr, 0);
        self.msacsr_saved = self.msacsr;
    }

    /// Fold the kernel flags of one element into MSACSR
    ///
    /// Returns the enabled exception bits of this element. In
    /// non-trapping mode those are not added to the cause field; the
    /// caller writes a signalling NaN carrying them instead.
    pub fn update_msacsr(&mut self) -> u32 {
        let mut flags = self.fp_status.flags;
        if flags.contains(FloatFlags::OVERFLOW | FloatFlags::UNDERFLOW) {
            flags.remove(FloatFlags::UNDERFLOW);
        }

        let cause = ieee_ex_to_mips(flags);
        let enable = get_fp_enable(self.msacsr) | fp::UNIMPLEMENTED;
        update_fp_flags(&mut self.msacsr, cause & !enable);

        let ex_cause = cause & enable;
        if !(self.msacsr & MSACSR_NX != 0 && ex_cause != 0) {
            let old_cause = get_fp_cause(self.msacsr);
            set_fp_cause(&mut self.msacsr, cause | old_cause);
        }
        ex_cause
    }

    /// Finish a vector float operation
    ///
    /// Raises MSAFPE when an enabled cause bit is set, putting back the
    /// flags seen before the operation.
    pub fn check_msacsr_cause(&mut self) -> CpuResult<()> {
        if self.msacsr & MSACSR_NX != 0 {
            return Ok(());
        }

        if (get_fp_enable(self.msacsr) | fp::UNIMPLEMENTED) & get_fp_cause(self.msacsr) != 0 {
            set_fp_flags(&mut self.msacsr, get_fp_flags(self.msacsr_saved));
            return Err(Exception::new(ExceptionKind::MsaFloatingPoint));
        }
        Ok(())
    }

    /// Run a float kernel over every element of a word or double vector
    ///
    /// `kernel` computes one element from the raw operand bits and reports
    /// IEEE exceptions through the status it is handed.
    pub fn float_binop<K>(&mut self, df: DataFormat, a: &Wr, b: &Wr, mut kernel: K) -> CpuResult<Wr>
    where
        K: FnMut(u64, u64, &mut FloatStatus) -> u64,
    {
        let snan_bits = match df {
            DataFormat::Word => 0x7FBF_FFFFu64,
            DataFormat::Double => 0x7FF7_FFFF_FFFF_FFFFu64,
            _ => unreachable!("float MSA operation on {:?} elements", df),
        };

        self.clear_msacsr_cause();
        let mut out = [0u64; 2];
        for i in 0..df.elements() {
            self.fp_status.flags = FloatFlags::empty();
            let mut value = kernel(element(a, df, i), element(b, df, i), &mut self.fp_status);
            let nx_cause = self.update_msacsr();
            if nx_cause != 0 {
                value = ((snan_bits >> 6) << 6) | nx_cause as u64;
            }
            set_element(&mut out, df, i, value);
        }
        self.check_msacsr_cause()?;
        Ok(out)
    }

    /// FADD.df using the host adder
    pub fn fadd(&mut self, df: DataFormat, a: &Wr, b: &Wr) -> CpuResult<Wr> {
        match df {
            DataFormat::Word => self.float_binop(df, a, b, |x, y, status| {
                host_add::<f32>(f32::from_raw(x as u32), f32::from_raw(y as u32), status).to_bits()
                    as u64
            }),
            _ => self.float_binop(df, a, b, |x, y, status| {
                host_add::<f64>(f64::from_raw(x), f64::from_raw(y), status).to_bits()
            }),
        }
    }
}

fn host_add<F>(a: F, b: F, status: &mut FloatStatus) -> F
where
    F: FpOperand + std::ops::Add<Output = F> + HostFloat,
{
    let sum = a + b;
    if a.is_signaling_nan() || b.is_signaling_nan() || (sum.is_nan_value() && !a.is_nan_value() && !b.is_nan_value()) {
        status.raise(FloatFlags::INVALID);
    } else if sum.is_infinite_value() && a.is_finite_value() && b.is_finite_value() {
        status.raise(FloatFlags::OVERFLOW | FloatFlags::INEXACT);
    }
    sum
}

trait HostFloat {
    fn is_infinite_value(self) -> bool;
    fn is_finite_value(self) -> bool;
}

impl HostFloat for f32 {
    fn is_infinite_value(self) -> bool {
        self.is_infinite()
    }
    fn is_finite_value(self) -> bool {
        self.is_finite()
    }
}

impl HostFloat for f64 {
    fn is_infinite_value(self) -> bool {
        self.is_infinite()
    }
    fn is_finite_value(self) -> bool {
        self.is_finite()
    }
}
