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

//! Privileged instruction helpers
//!
//! Each helper implements one instruction (or one CP0 register access)
//! after decoding, organized by category:
//!
//! - `cop0`: MFC0/MTC0/DMFC0/DMTC0 and the per-register accessors
//! - `mt`: MT ASE registers, Status/TCStatus/EntryHi synchronization, YIELD
//! - `tlb`: TLBWI/TLBWR/TLBP/TLBR and address translation
//! - `exception`: exception entry, ERET/DERET, DI/EI, WAIT, RDHWR
//! - `fpu`: CFC1/CTC1 and C.cond.fmt

use super::{Cpu, HFlags};
use crate::core::error::{CpuResult, Exception, ExceptionKind};

mod cop0;
mod exception;
mod fpu;
mod mt;
mod tlb;

pub(crate) use mt::masked_vpecontrol;

/// Error code of a TLB exception caused by a refill (no matching entry)
pub const EXCP_TLB_NOMATCH: i32 = 1;

impl Cpu {
    /// Reserved Instruction unless the model implements the MT ASE
    pub(in crate::core::cpu) fn check_mt(&self) -> CpuResult<()> {
        if self.model.has_mt() {
            Ok(())
        } else {
            Err(Exception::new(ExceptionKind::ReservedInstruction))
        }
    }

    /// Reserved Instruction unless the model is 64-bit
    pub(in crate::core::cpu) fn check_64bit(&self) -> CpuResult<()> {
        if self.model.is_64bit() {
            Ok(())
        } else {
            Err(Exception::new(ExceptionKind::ReservedInstruction))
        }
    }

    /// Coprocessor Unusable unless CP0 is accessible
    pub(in crate::core::cpu) fn check_cp0(&self) -> CpuResult<()> {
        if self.hflags.contains(HFlags::CP0) {
            Ok(())
        } else {
            Err(Exception::with_code(ExceptionKind::CoprocessorUnusable, 0))
        }
    }
}
