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

//! Coprocessor 1 control instructions

use super::super::fpu::{FpCond, FpOperand};
use super::super::{Cpu, HFlags};
use crate::core::error::{CpuResult, Exception, ExceptionKind};

impl Cpu {
    /// Coprocessor Unusable (CE=1) unless Status.CU1 is set
    fn check_cp1(&self) -> CpuResult<()> {
        if self.hflags.contains(HFlags::FPU) {
            Ok(())
        } else {
            Err(Exception::with_code(ExceptionKind::CoprocessorUnusable, 1))
        }
    }

    /// CFC1: read FPU control register `reg`
    pub fn cfc1(&self, reg: u32) -> CpuResult<u64> {
        self.check_cp1()?;
        Ok(self.fpu.cfc1(reg))
    }

    /// CTC1: write FPU control register `reg`
    pub fn ctc1(&mut self, reg: u32, value: u64) -> CpuResult<()> {
        self.check_cp1()?;
        self.fpu.ctc1(value, reg)
    }

    /// C.cond.fmt on raw operand bits
    pub fn fp_compare<F: FpOperand>(&mut self, cond: u32, a: F::Bits, b: F::Bits, cc: u32) -> CpuResult<()> {
        self.check_cp1()?;
        self.fpu.compare::<F>(FpCond::from_code(cond), a, b, cc)
    }

    /// CABS.cond.fmt on raw operand bits
    pub fn fp_compare_abs<F: FpOperand>(&mut self, cond: u32, a: F::Bits, b: F::Bits, cc: u32) -> CpuResult<()> {
        self.check_cp1()?;
        self.fpu.compare_abs::<F>(FpCond::from_code(cond), a, b, cc)
    }
}
