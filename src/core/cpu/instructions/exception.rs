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

//! Exception entry and return, interrupt enable and WAIT

use super::super::{cause, sext32, status, Cpu, HFlags};
use super::EXCP_TLB_NOMATCH;
use crate::core::error::{CpuResult, Exception, ExceptionKind};

/// Boot exception vector base used while Status.BEV is set
const BEV_VECTOR_BASE: u32 = 0xBFC0_0200;

/// Value LLAddr takes when an exception return breaks an LL/SC sequence
const LLADDR_INVALID: u64 = 1;

impl Cpu {
    /// Enter the exception handler for `exception`
    ///
    /// Called by the dispatch loop with the error an instruction helper
    /// returned. EPC and Cause.BD are only updated when EXL was clear, so a
    /// nested exception keeps the original return address.
    ///
    /// # Vector offsets
    ///
    /// | Exception                        | Offset |
    /// |----------------------------------|--------|
    /// | TLB refill, EXL clear            | 0x000  |
    /// | 64-bit TLB refill, EXL clear     | 0x080  |
    /// | Interrupt with Cause.IV          | 0x200  |
    /// | Everything else                  | 0x180  |
    pub fn deliver_exception(&mut self, exception: Exception) {
        let Some(code) = exception.kind.code() else {
            return;
        };
        let exl = self.cp0.status & status::EXL != 0;

        let offset = match exception.kind {
            ExceptionKind::TlbLoad | ExceptionKind::TlbStore
                if exception.error_code == EXCP_TLB_NOMATCH && !exl =>
            {
                if self.xtlb_refill() {
                    0x080
                } else {
                    0x000
                }
            }
            ExceptionKind::Interrupt if self.cp0.cause & cause::IV != 0 => 0x200,
            _ => 0x180,
        };

        if !exl {
            let step = if self.hflags.contains(HFlags::M16) { 2 } else { 4 };
            if self.in_branch_delay {
                self.cp0.epc = self.active_tc.pc.wrapping_sub(step);
                self.cp0.cause |= cause::BD;
            } else {
                self.cp0.epc = self.active_tc.pc;
                self.cp0.cause &= !cause::BD;
            }
            self.cp0.status |= status::EXL;
        }

        self.cp0.cause = (self.cp0.cause & !cause::EXC_CODE_MASK) | (code << cause::EXC_CODE_SHIFT);
        if exception.kind == ExceptionKind::CoprocessorUnusable {
            self.cp0.cause = (self.cp0.cause & !cause::CE_MASK)
                | (((exception.error_code as u32) << cause::CE_SHIFT) & cause::CE_MASK);
        }

        let base = if self.cp0.status & status::BEV != 0 {
            sext32(BEV_VECTOR_BASE)
        } else {
            sext32(self.cp0.ebase & !0x3FF)
        };
        self.active_tc.pc = base.wrapping_add(offset);
        self.hflags.remove(HFlags::M16);
        self.in_branch_delay = false;
        self.compute_hflags();

        log::debug!(
            "CPU{}: {:?} exception (code {}), EPC=0x{:016X} -> 0x{:016X}",
            self.index,
            exception.kind,
            code,
            self.cp0.epc,
            self.active_tc.pc
        );
    }

    /// Whether a refill for BadVAddr uses the 64-bit XTLB refill vector
    fn xtlb_refill(&self) -> bool {
        if !self.model.is_64bit() {
            return false;
        }
        let sr = self.cp0.status;
        match self.cp0.badvaddr >> 62 {
            0 => sr & status::UX != 0,
            1 => sr & status::SX != 0,
            3 => sr & status::KX != 0,
            _ => false,
        }
    }

    /// ERET: return from an exception (ERL first, then EXL)
    ///
    /// Also breaks any LL/SC sequence in progress.
    pub fn eret(&mut self) -> CpuResult<()> {
        self.check_cp0()?;
        if self.cp0.status & status::ERL != 0 {
            self.set_pc(self.cp0.error_epc);
            self.cp0.status &= !status::ERL;
        } else {
            self.set_pc(self.cp0.epc);
            self.cp0.status &= !status::EXL;
        }
        self.compute_hflags();
        self.lladdr = LLADDR_INVALID;
        log::trace!("CPU{}: ERET to 0x{:016X}", self.index, self.active_tc.pc);
        Ok(())
    }

    /// DERET: return from debug mode
    pub fn deret(&mut self) -> CpuResult<()> {
        self.check_cp0()?;
        self.set_pc(self.cp0.depc);
        self.hflags.remove(HFlags::DM);
        self.compute_hflags();
        self.lladdr = LLADDR_INVALID;
        log::trace!("CPU{}: DERET to 0x{:016X}", self.index, self.active_tc.pc);
        Ok(())
    }

    /// DI: clear Status.IE, returning the previous Status
    pub fn di(&mut self) -> CpuResult<u64> {
        self.check_cp0()?;
        let old = self.cp0.status;
        self.cp0.status = old & !status::IE;
        self.compute_hflags();
        Ok(sext32(old))
    }

    /// EI: set Status.IE, returning the previous Status
    pub fn ei(&mut self) -> CpuResult<u64> {
        self.check_cp0()?;
        let old = self.cp0.status;
        self.cp0.status = old | status::IE;
        self.compute_hflags();
        Ok(sext32(old))
    }

    /// WAIT: halt until an interrupt arrives
    ///
    /// Always returns the `Halt` pseudo-exception so the dispatch loop
    /// stops running this CPU.
    pub fn wait(&mut self) -> CpuResult<()> {
        self.halted = true;
        self.wake_requested = false;
        log::debug!("CPU{}: WAIT", self.index);
        Err(Exception::new(ExceptionKind::Halt))
    }

    /// RDHWR: read a hardware register
    ///
    /// | Reg | Value      |
    /// |-----|------------|
    /// | 0   | CPUNum     |
    /// | 1   | SYNCI_Step |
    /// | 2   | CC (Count) |
    /// | 3   | CCRes      |
    ///
    /// Accessible from kernel mode (CP0 usable) or when enabled in HWREna.
    pub fn rdhwr(&mut self, reg: u32) -> CpuResult<u64> {
        let allowed = reg < 4
            && (self.hflags.contains(HFlags::CP0) || self.cp0.hwrena & (1 << reg) != 0);
        if !allowed {
            return Err(Exception::new(ExceptionKind::ReservedInstruction));
        }

        let value = match reg {
            0 => self.cp0.ebase & 0x3FF,
            1 => self.model.synci_step,
            2 => self.read_count(),
            _ => self.model.ccres,
        };
        Ok(sext32(value))
    }
}
