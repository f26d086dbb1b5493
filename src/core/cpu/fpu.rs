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

//! Floating-point control (CP1 control registers)
//!
//! The arithmetic itself belongs to the float kernel; this module owns the
//! control state the kernel reports into and turns its sticky flags into
//! FCSR cause/flag bits and FPE exceptions.
//!
//! # FCSR Layout
//!
//! ```text
//! 31..25 | 24 | 23   | 17..12 | 11..7   | 6..2  | 1..0
//! FCC7-1 | FS | FCC0 | Cause  | Enables | Flags | RM
//! ```

use crate::core::error::{CpuResult, Exception, ExceptionKind};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// IEEE sticky exception flags reported by the float kernel
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FloatFlags: u8 {
        const INVALID = 1 << 0;
        const DIVBYZERO = 1 << 1;
        const OVERFLOW = 1 << 2;
        const UNDERFLOW = 1 << 3;
        const INEXACT = 1 << 4;
        const INPUT_DENORMAL = 1 << 5;
        const OUTPUT_DENORMAL = 1 << 6;
    }
}

/// MIPS exception bits as used in the cause/enable/flag fields
pub mod fp {
    pub const INEXACT: u32 = 1;
    pub const UNDERFLOW: u32 = 2;
    pub const OVERFLOW: u32 = 4;
    pub const DIV0: u32 = 8;
    pub const INVALID: u32 = 16;
    pub const UNIMPLEMENTED: u32 = 32;
}

#[inline]
pub fn get_fp_enable(reg: u32) -> u32 {
    (reg >> 7) & 0x1F
}

#[inline]
pub fn get_fp_cause(reg: u32) -> u32 {
    (reg >> 12) & 0x3F
}

#[inline]
pub fn get_fp_flags(reg: u32) -> u32 {
    (reg >> 2) & 0x1F
}

#[inline]
pub fn set_fp_cause(reg: &mut u32, value: u32) {
    *reg = (*reg & !(0x3F << 12)) | ((value & 0x3F) << 12);
}

#[inline]
pub fn set_fp_flags(reg: &mut u32, value: u32) {
    *reg = (*reg & !(0x1F << 2)) | ((value & 0x1F) << 2);
}

#[inline]
pub fn update_fp_flags(reg: &mut u32, value: u32) {
    *reg |= (value & 0x1F) << 2;
}

/// Convert kernel flags to MIPS exception bits
pub fn ieee_ex_to_mips(flags: FloatFlags) -> u32 {
    let mut ret = 0;
    if flags.contains(FloatFlags::INVALID) {
        ret |= fp::INVALID;
    }
    if flags.contains(FloatFlags::OVERFLOW) {
        ret |= fp::OVERFLOW;
    }
    if flags.contains(FloatFlags::UNDERFLOW) {
        ret |= fp::UNDERFLOW;
    }
    if flags.contains(FloatFlags::DIVBYZERO) {
        ret |= fp::DIV0;
    }
    if flags.contains(FloatFlags::INEXACT) {
        ret |= fp::INEXACT;
    }
    ret
}

/// IEEE rounding mode selected by FCSR.RM
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMode {
    #[default]
    NearestEven,
    ToZero,
    Up,
    Down,
}

impl RoundingMode {
    pub fn from_rm(rm: u32) -> Self {
        match rm & 3 {
            0 => RoundingMode::NearestEven,
            1 => RoundingMode::ToZero,
            2 => RoundingMode::Up,
            _ => RoundingMode::Down,
        }
    }
}

/// Control context shared with the float kernel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatStatus {
    pub rounding_mode: RoundingMode,
    pub flush_to_zero: bool,
    pub flags: FloatFlags,
}

impl FloatStatus {
    pub fn raise(&mut self, flags: FloatFlags) {
        self.flags |= flags;
    }
}

/// FPU control state of one VPE
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fpu {
    pub fcr0: u32,
    pub fcr31: u32,
    pub fp_status: FloatStatus,
}

impl Fpu {
    pub fn new(fcr0: u32) -> Self {
        Self {
            fcr0,
            ..Self::default()
        }
    }

    /// CFC1: read an FPU control register
    pub fn cfc1(&self, reg: u32) -> u64 {
        let fcr31 = self.fcr31;
        let value = match reg {
            0 => self.fcr0,
            25 => ((fcr31 >> 24) & 0xFE) | ((fcr31 >> 23) & 0x1),
            26 => fcr31 & 0x0003_F07C,
            28 => (fcr31 & 0x0000_0F83) | ((fcr31 >> 22) & 0x4),
            _ => fcr31,
        };
        value as i32 as i64 as u64
    }

    /// CTC1: write an FPU control register
    ///
    /// Writes that set reserved bits are dropped. Raises FPE when the new
    /// value has a cause bit whose exception is enabled (unimplemented
    /// operation is always enabled).
    pub fn ctc1(&mut self, value: u64, reg: u32) -> CpuResult<()> {
        let value = value as u32;
        match reg {
            25 => {
                if value & 0xFFFF_FF00 != 0 {
                    return Ok(());
                }
                self.fcr31 =
                    (self.fcr31 & 0x017F_FFFF) | ((value & 0xFE) << 24) | ((value & 0x1) << 23);
            }
            26 => {
                if value & 0x007C_0000 != 0 {
                    return Ok(());
                }
                self.fcr31 = (self.fcr31 & 0xFFFC_0F83) | (value & 0x0003_F07C);
            }
            28 => {
                if value & 0x007C_0000 != 0 {
                    return Ok(());
                }
                self.fcr31 =
                    (self.fcr31 & 0xFEFF_F07C) | (value & 0x0000_0F83) | ((value & 0x4) << 22);
            }
            31 => {
                if value & 0x007C_0000 != 0 {
                    return Ok(());
                }
                self.fcr31 = value;
            }
            _ => return Ok(()),
        }

        self.restore_modes();
        self.fp_status.flags = FloatFlags::empty();

        if (get_fp_enable(self.fcr31) | fp::UNIMPLEMENTED) & get_fp_cause(self.fcr31) != 0 {
            return Err(Exception::new(ExceptionKind::FloatingPoint));
        }
        Ok(())
    }

    /// Apply FCSR.RM and FCSR.FS to the kernel context
    pub fn restore_modes(&mut self) {
        self.fp_status.rounding_mode = RoundingMode::from_rm(self.fcr31);
        self.fp_status.flush_to_zero = self.fcr31 & (1 << 24) != 0;
    }

    /// Fold the kernel's sticky flags into FCSR after an operation
    ///
    /// The cause field always reflects the last operation. An enabled
    /// exception raises FPE without touching the flag field.
    pub fn update_fcr31(&mut self) -> CpuResult<()> {
        let cause = ieee_ex_to_mips(self.fp_status.flags);
        set_fp_cause(&mut self.fcr31, cause);

        if get_fp_enable(self.fcr31) & cause != 0 {
            return Err(Exception::new(ExceptionKind::FloatingPoint));
        }
        update_fp_flags(&mut self.fcr31, cause);
        Ok(())
    }

    /// Condition code bit `cc` of FCSR
    pub fn condition(&self, cc: u32) -> bool {
        self.fcr31 & fcc_bit(cc) != 0
    }

    pub fn set_condition(&mut self, cc: u32, value: bool) {
        if value {
            self.fcr31 |= fcc_bit(cc);
        } else {
            self.fcr31 &= !fcc_bit(cc);
        }
    }

    /// C.cond.fmt: compare two raw operands and set condition code `cc`
    ///
    /// # Example
    ///
    /// ```
    /// use mipsmt::core::cpu::fpu::{FpCond, Fpu};
    ///
    /// let mut fpu = Fpu::default();
    /// fpu.compare::<f64>(FpCond::Olt, 1.0f64.to_bits(), 2.0f64.to_bits(), 0).unwrap();
    /// assert!(fpu.condition(0));
    /// ```
    pub fn compare<F: FpOperand>(&mut self, cond: FpCond, a: F::Bits, b: F::Bits, cc: u32) -> CpuResult<()> {
        self.compare_with::<F>(cond, F::from_raw(a), F::from_raw(b), cc)
    }

    /// CABS.cond.fmt: compare absolute values
    pub fn compare_abs<F: FpOperand>(&mut self, cond: FpCond, a: F::Bits, b: F::Bits, cc: u32) -> CpuResult<()> {
        self.compare_with::<F>(cond, F::from_raw(a).abs(), F::from_raw(b).abs(), cc)
    }

    fn compare_with<F: FpOperand>(&mut self, cond: FpCond, a: F, b: F, cc: u32) -> CpuResult<()> {
        self.fp_status.flags = FloatFlags::empty();
        let result = cond.evaluate(a, b, &mut self.fp_status);
        self.update_fcr31()?;
        self.set_condition(cc, result);
        Ok(())
    }
}

/// FCSR bit holding condition code `cc`
#[inline]
pub fn fcc_bit(cc: u32) -> u32 {
    if cc == 0 {
        1 << 23
    } else {
        1 << (24 + (cc & 7))
    }
}

/// Float formats the compare helpers operate on
pub trait FpOperand: Copy + PartialOrd {
    type Bits: Copy;

    fn from_raw(bits: Self::Bits) -> Self;
    fn is_nan_value(self) -> bool;
    /// Signalling NaN under the IEEE 754-2008 encoding (quiet bit clear)
    fn is_signaling_nan(self) -> bool;
    fn abs(self) -> Self;
}

impl FpOperand for f32 {
    type Bits = u32;

    fn from_raw(bits: u32) -> Self {
        f32::from_bits(bits)
    }

    fn is_nan_value(self) -> bool {
        self.is_nan()
    }

    fn is_signaling_nan(self) -> bool {
        self.is_nan() && self.to_bits() & (1 << 22) == 0
    }

    fn abs(self) -> Self {
        f32::from_bits(self.to_bits() & 0x7FFF_FFFF)
    }
}

impl FpOperand for f64 {
    type Bits = u64;

    fn from_raw(bits: u64) -> Self {
        f64::from_bits(bits)
    }

    fn is_nan_value(self) -> bool {
        self.is_nan()
    }

    fn is_signaling_nan(self) -> bool {
        self.is_nan() && self.to_bits() & (1 << 51) == 0
    }

    fn abs(self) -> Self {
        f64::from_bits(self.to_bits() & 0x7FFF_FFFF_FFFF_FFFF)
    }
}

/// The sixteen C.cond.fmt conditions
///
/// Bit 3 selects the signalling variant; bits 2..0 select "less",
/// "equal" and "unordered".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpCond {
    F,
    Un,
    Eq,
    Ueq,
    Olt,
    Ult,
    Ole,
    Ule,
    Sf,
    Ngle,
    Seq,
    Ngl,
    Lt,
    Nge,
    Le,
    Ngt,
}

impl FpCond {
    const ALL: [FpCond; 16] = [
        FpCond::F,
        FpCond::Un,
        FpCond::Eq,
        FpCond::Ueq,
        FpCond::Olt,
        FpCond::Ult,
        FpCond::Ole,
        FpCond::Ule,
        FpCond::Sf,
        FpCond::Ngle,
        FpCond::Seq,
        FpCond::Ngl,
        FpCond::Lt,
        FpCond::Nge,
        FpCond::Le,
        FpCond::Ngt,
    ];

    /// Condition from the instruction's 4-bit cond field
    pub fn from_code(code: u32) -> Self {
        Self::ALL[(code & 0xF) as usize]
    }

    fn code(self) -> u32 {
        self as u32
    }

    pub fn is_signaling(self) -> bool {
        self.code() & 8 != 0
    }

    /// Evaluate the condition, raising the invalid flag when required
    pub fn evaluate<F: FpOperand>(self, a: F, b: F, status: &mut FloatStatus) -> bool {
        let unordered = a.is_nan_value() || b.is_nan_value();
        let invalid = if self.is_signaling() {
            unordered
        } else {
            a.is_signaling_nan() || b.is_signaling_nan()
        };
        if invalid {
            status.raise(FloatFlags::INVALID);
        }

        let code = self.code();
        if unordered {
            return code & 1 != 0;
        }
        (code & 2 != 0 && a == b) || (code & 4 != 0 && a < b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QNAN64: u64 = 0x7FF8_0000_0000_0000;
    const SNAN64: u64 = 0x7FF4_0000_0000_0000;

    #[test]
    fn test_cfc1_views_of_fcsr() {
        let mut fpu = Fpu::new(0x0073_9500);
        fpu.fcr31 = 0xFE80_0F83 | (0x3F << 12);
        assert_eq!(fpu.cfc1(0), 0x0073_9500);
        assert_eq!(fpu.cfc1(25), 0xFF);
        assert_eq!(fpu.cfc1(26), 0x3F000);
        assert_eq!(fpu.cfc1(28), 0xF83);

        // FS shows up as bit 2 of FENR
        fpu.fcr31 = 1 << 24;
        assert_eq!(fpu.cfc1(28), 0x4);
        assert_eq!(fpu.cfc1(31), 1 << 24);
    }

    #[test]
    fn test_ctc1_fccr() {
        let mut fpu = Fpu::default();
        fpu.ctc1(0x81, 25).unwrap();
        assert!(fpu.condition(0));
        assert!(fpu.condition(7));
        assert!(!fpu.condition(1));

        // Reserved bits set: ignored
        fpu.ctc1(0x100, 25).unwrap();
        assert!(fpu.condition(0));
    }

    #[test]
    fn test_ctc1_sets_rounding_mode() {
        let mut fpu = Fpu::default();
        fpu.ctc1(0x0100_0003, 31).unwrap();
        assert_eq!(fpu.fp_status.rounding_mode, RoundingMode::Down);
        assert!(fpu.fp_status.flush_to_zero);

        fpu.ctc1(0x1, 28).unwrap();
        assert_eq!(fpu.fp_status.rounding_mode, RoundingMode::ToZero);
        assert!(!fpu.fp_status.flush_to_zero);
    }

    #[test]
    fn test_ctc1_raises_on_enabled_cause() {
        let mut fpu = Fpu::default();
        // Invalid enabled (bit 11) and invalid cause (bit 16)
        let err = fpu.ctc1((1 << 11) | (1 << 16), 31).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::FloatingPoint);

        // Unimplemented operation cause is always enabled
        let mut fpu = Fpu::default();
        assert!(fpu.ctc1(1 << 17, 31).is_err());

        // Reserved bits: write dropped, nothing raised
        let mut fpu = Fpu::default();
        assert!(fpu.ctc1(0x0004_0000, 31).is_ok());
        assert_eq!(fpu.fcr31, 0);
    }

    #[test]
    fn test_update_fcr31_accumulates_flags() {
        let mut fpu = Fpu::default();
        fpu.fp_status.flags = FloatFlags::INEXACT | FloatFlags::OVERFLOW;
        fpu.update_fcr31().unwrap();
        assert_eq!(get_fp_cause(fpu.fcr31), fp::INEXACT | fp::OVERFLOW);
        assert_eq!(get_fp_flags(fpu.fcr31), fp::INEXACT | fp::OVERFLOW);

        fpu.fp_status.flags = FloatFlags::empty();
        fpu.update_fcr31().unwrap();
        assert_eq!(get_fp_cause(fpu.fcr31), 0);
        assert_eq!(get_fp_flags(fpu.fcr31), fp::INEXACT | fp::OVERFLOW);
    }

    #[test]
    fn test_update_fcr31_traps_without_flag_update() {
        let mut fpu = Fpu::default();
        fpu.fcr31 = fp::DIV0 << 7;
        fpu.fp_status.flags = FloatFlags::DIVBYZERO;
        assert!(fpu.update_fcr31().is_err());
        assert_eq!(get_fp_cause(fpu.fcr31), fp::DIV0);
        assert_eq!(get_fp_flags(fpu.fcr31), 0);
    }

    #[test]
    fn test_compare_ordered() {
        let mut fpu = Fpu::default();
        let one = 1.0f64.to_bits();
        let two = 2.0f64.to_bits();

        fpu.compare::<f64>(FpCond::Olt, one, two, 0).unwrap();
        assert!(fpu.condition(0));
        fpu.compare::<f64>(FpCond::Olt, two, one, 0).unwrap();
        assert!(!fpu.condition(0));
        fpu.compare::<f64>(FpCond::Ole, one, one, 3).unwrap();
        assert!(fpu.condition(3));
        fpu.compare::<f64>(FpCond::F, one, one, 3).unwrap();
        assert!(!fpu.condition(3));
    }

    #[test]
    fn test_compare_unordered_quiet_and_signalling() {
        let mut fpu = Fpu::default();
        let one = 1.0f64.to_bits();

        fpu.compare::<f64>(FpCond::Ueq, QNAN64, one, 0).unwrap();
        assert!(fpu.condition(0));
        assert_eq!(get_fp_cause(fpu.fcr31), 0);

        // Signalling predicate on a quiet NaN raises invalid
        fpu.compare::<f64>(FpCond::Ngle, QNAN64, one, 0).unwrap();
        assert!(fpu.condition(0));
        assert_eq!(get_fp_cause(fpu.fcr31), fp::INVALID);

        // Quiet predicate on a signalling NaN raises invalid too
        fpu.compare::<f64>(FpCond::Eq, SNAN64, one, 0).unwrap();
        assert!(!fpu.condition(0));
        assert_eq!(get_fp_cause(fpu.fcr31), fp::INVALID);
    }

    #[test]
    fn test_compare_trap_leaves_condition() {
        let mut fpu = Fpu::default();
        fpu.set_condition(1, true);
        fpu.fcr31 |= fp::INVALID << 7;

        let err = fpu
            .compare::<f32>(FpCond::Lt, f32::NAN.to_bits(), 1.0f32.to_bits(), 1)
            .unwrap_err();
        assert_eq!(err.kind, ExceptionKind::FloatingPoint);
        assert!(fpu.condition(1));
    }

    #[test]
    fn test_compare_abs() {
        let mut fpu = Fpu::default();
        fpu.compare_abs::<f32>(FpCond::Eq, (-2.0f32).to_bits(), 2.0f32.to_bits(), 2)
            .unwrap();
        assert!(fpu.condition(2));
    }

    #[test]
    fn test_cond_codes() {
        assert_eq!(FpCond::from_code(4), FpCond::Olt);
        assert_eq!(FpCond::from_code(15), FpCond::Ngt);
        assert!(FpCond::Sf.is_signaling());
        assert!(!FpCond::Ule.is_signaling());
    }
}
