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

//! Coprocessor 0 (System Control) register access
//!
//! MFC0/MTC0 move the low 32 bits of a register (sign-extended on read);
//! DMFC0/DMTC0 move the full 64-bit value and exist only on 64-bit models.
//! Registers are addressed by `(reg, sel)` as encoded in the instruction.

use super::super::{cause, debug, sext32, status, Cpu, HFlags};
use crate::core::error::{CpuResult, Exception, ExceptionKind};

/// Writable bits of Cause on every model (IV, WP, IP1..IP0)
const CAUSE_RW_MASK: u32 = 0x00C0_0300;

impl Cpu {
    /// MFC0: read a CP0 register, sign-extending the low 32 bits
    ///
    /// # Format
    ///
    /// MFC0 rt, rd, sel
    ///
    /// # Example
    ///
    /// ```text
    /// MFC0 $t0, $12, 0  # Status into $t0
    /// ```
    pub fn mfc0(&mut self, reg: u32, sel: u32) -> CpuResult<u64> {
        self.check_cp0()?;
        let value = self.read_cp0(reg, sel)?;
        Ok(sext32(value as u32))
    }

    /// DMFC0: read a CP0 register at full width
    pub fn dmfc0(&mut self, reg: u32, sel: u32) -> CpuResult<u64> {
        self.check_cp0()?;
        self.check_64bit()?;
        self.read_cp0(reg, sel)
    }

    /// MTC0: write the sign-extended low 32 bits of `value`
    ///
    /// # Format
    ///
    /// MTC0 rt, rd, sel
    pub fn mtc0(&mut self, reg: u32, sel: u32, value: u64) -> CpuResult<()> {
        self.check_cp0()?;
        self.write_cp0(reg, sel, sext32(value as u32))
    }

    /// DMTC0: write a CP0 register at full width
    pub fn dmtc0(&mut self, reg: u32, sel: u32, value: u64) -> CpuResult<()> {
        self.check_cp0()?;
        self.check_64bit()?;
        self.write_cp0(reg, sel, value)
    }

    fn read_cp0(&mut self, reg: u32, sel: u32) -> CpuResult<u64> {
        let value = match (reg, sel) {
            (0, 0) => sext32(self.cp0.index),
            (0, 1..=3) => {
                self.check_mt()?;
                let mvp = self.mvp;
                sext32([mvp.control, mvp.conf0, mvp.conf1][sel as usize - 1])
            }
            (1, 0) => sext32(self.read_random()),
            (1, 1..=7) => {
                self.check_mt()?;
                match sel {
                    1 => sext32(self.cp0.vpe_control),
                    2 => sext32(self.cp0.vpe_conf0),
                    3 => sext32(self.cp0.vpe_conf1),
                    4 => self.cp0.yq_mask,
                    5 => self.cp0.vpe_schedule,
                    6 => self.cp0.vpe_schefback,
                    _ => sext32(self.cp0.vpe_opt),
                }
            }
            (2, 0) => self.cp0.entry_lo0,
            (2, 1..=7) => {
                self.check_mt()?;
                let tc = &self.active_tc;
                match sel {
                    1 => sext32(tc.tcstatus),
                    2 => sext32(tc.tcbind),
                    3 => tc.pc,
                    4 => sext32(tc.tchalt),
                    5 => tc.tccontext,
                    6 => tc.tcschedule,
                    _ => tc.tcschefback,
                }
            }
            (3, 0) => self.cp0.entry_lo1,
            (4, 0) => self.cp0.context,
            (5, 0) => sext32(self.cp0.page_mask),
            (5, 1) => sext32(self.cp0.page_grain),
            (6, 0) => sext32(self.cp0.wired),
            (6, 1..=5) => sext32(self.cp0.srs_conf[sel as usize - 1]),
            (7, 0) => sext32(self.cp0.hwrena),
            (8, 0) => self.cp0.badvaddr,
            (9, 0) => sext32(self.read_count()),
            (10, 0) => self.cp0.entry_hi,
            (11, 0) => sext32(self.cp0.compare),
            (12, 0) => sext32(self.cp0.status),
            (12, 1) => sext32(self.cp0.intctl),
            (12, 2) => sext32(self.cp0.srsctl),
            (12, 3) => sext32(self.cp0.srsmap),
            (13, 0) => sext32(self.read_cause()),
            (14, 0) => self.cp0.epc,
            (15, 0) => sext32(self.cp0.prid),
            (15, 1) => sext32(self.cp0.ebase),
            (16, 0..=3 | 6 | 7) => sext32(self.cp0.config[sel as usize]),
            (17, 0) => self.mfc0_lladdr(),
            (18, 0..=7) => self.cp0.watch_lo[sel as usize],
            (19, 0..=7) => sext32(self.cp0.watch_hi[sel as usize]),
            (20, 0) => {
                self.check_64bit()?;
                self.cp0.xcontext
            }
            (21, 0) => sext32(self.cp0.framemask),
            (23, 0) => sext32(self.mfc0_debug()),
            (24, 0) => self.cp0.depc,
            (25, 0) => sext32(self.cp0.performance0),
            (26, 0) | (27, 0..=3) => 0,
            (28, 0..=7) if sel & 1 == 0 => sext32(self.cp0.tag_lo),
            (28, 0..=7) => sext32(self.cp0.data_lo),
            (29, 0..=7) if sel & 1 == 0 => sext32(self.cp0.tag_hi),
            (29, 0..=7) => sext32(self.cp0.data_hi),
            (30, 0) => self.cp0.error_epc,
            (31, 0) => self.cp0.desave,
            _ => {
                log::warn!("CPU{}: read of unknown CP0 register {}.{}", self.index, reg, sel);
                return Err(Exception::new(ExceptionKind::ReservedInstruction));
            }
        };
        log::trace!("CPU{}: CP0 {}.{} -> 0x{:016X}", self.index, reg, sel, value);
        Ok(value)
    }

    fn write_cp0(&mut self, reg: u32, sel: u32, value: u64) -> CpuResult<()> {
        log::trace!("CPU{}: CP0 {}.{} <- 0x{:016X}", self.index, reg, sel, value);
        match (reg, sel) {
            (0, 0) => self.mtc0_index(value),
            (0, 1) => self.mtc0_mvpcontrol(value)?,
            // MVPConf0/1 are read-only
            (0, 2..=3) => self.check_mt()?,
            (1, 0) => {}
            (1, 1) => self.mtc0_vpecontrol(value)?,
            (1, 2) => self.mtc0_vpeconf0(value)?,
            (1, 3) => self.mtc0_vpeconf1(value)?,
            (1, 4) => self.mtc0_yqmask(value)?,
            (1, 5) => {
                self.check_mt()?;
                self.cp0.vpe_schedule = value;
            }
            (1, 6) => {
                self.check_mt()?;
                self.cp0.vpe_schefback = value;
            }
            (1, 7) => self.mtc0_vpeopt(value)?,
            (2, 0) => self.cp0.entry_lo0 = value & 0x3FFF_FFFF,
            (2, 1) => self.mtc0_tcstatus(value)?,
            (2, 2) => self.mtc0_tcbind(value)?,
            (2, 3) => self.mtc0_tcrestart(value)?,
            (2, 4) => self.mtc0_tchalt(value)?,
            (2, 5) => {
                self.check_mt()?;
                self.active_tc.tccontext = value;
            }
            (2, 6) => {
                self.check_mt()?;
                self.active_tc.tcschedule = value;
            }
            (2, 7) => {
                self.check_mt()?;
                self.active_tc.tcschefback = value;
            }
            (3, 0) => self.cp0.entry_lo1 = value & 0x3FFF_FFFF,
            (4, 0) => {
                self.cp0.context = (self.cp0.context & 0x007F_FFFF) | (value & !0x007F_FFFF);
            }
            (5, 0) => self.cp0.page_mask = value as u32 & (0x1FFF << 13),
            // 1k pages are not supported
            (5, 1) => self.cp0.page_grain = 0,
            (6, 0) => self.cp0.wired = value as u32 % self.tlb.nb_tlb() as u32,
            (6, 1..=5) => {
                let i = sel as usize - 1;
                self.cp0.srs_conf[i] |= value as u32 & self.model.srs_conf_rw_bitmask[i];
            }
            (7, 0) => self.cp0.hwrena = value as u32 & 0xF,
            (8, 0) => {}
            (9, 0) => self.store_count(value as u32),
            (10, 0) => self.mtc0_entryhi(value),
            (11, 0) => self.store_compare(value as u32),
            (12, 0) => self.mtc0_status(value),
            (12, 1) => {
                self.cp0.intctl = (self.cp0.intctl & !0x3E0) | (value as u32 & 0x3E0);
            }
            (12, 2) => {
                let mask = (0xF << 12) | (0xF << 6);
                self.cp0.srsctl = (self.cp0.srsctl & !mask) | (value as u32 & mask);
            }
            (12, 3) => self.cp0.srsmap = value as u32,
            (13, 0) => self.mtc0_cause(value),
            (14, 0) => self.cp0.epc = value,
            (15, 0) => {}
            (15, 1) => {
                self.cp0.ebase = (self.cp0.ebase & !0x3FFF_F000) | (value as u32 & 0x3FFF_F000);
            }
            (16, 0) => {
                self.cp0.config[0] = (self.cp0.config[0] & 0x81FF_FFF8) | (value as u32 & 0x7);
            }
            // Secondary and tertiary caches are not implemented
            (16, 2) => self.cp0.config[2] &= 0x8FFF_0FFF,
            (16, 1 | 3 | 6 | 7) => {}
            (17, 0) => self.mtc0_lladdr(value),
            (18, 0..=7) => self.cp0.watch_lo[sel as usize] = value & !0x7,
            (19, 0..=7) => self.mtc0_watchhi(value, sel as usize),
            (20, 0) => {
                self.check_64bit()?;
                let mask = (1u64 << (self.model.segbits - 7)) - 1;
                self.cp0.xcontext = (self.cp0.xcontext & mask) | (value & !mask);
            }
            (21, 0) => self.cp0.framemask = value as u32,
            (23, 0) => self.mtc0_debug(value),
            (24, 0) => self.cp0.depc = value,
            (25, 0) => self.cp0.performance0 = value as u32 & 0x7FF,
            (26, 0) | (27, 0..=3) => {}
            (28, 0..=7) if sel & 1 == 0 => self.cp0.tag_lo = value as u32 & 0xFFFF_FCF6,
            (28, 0..=7) => self.cp0.data_lo = value as u32,
            (29, 0..=7) if sel & 1 == 0 => self.cp0.tag_hi = value as u32,
            (29, 0..=7) => self.cp0.data_hi = value as u32,
            (30, 0) => self.cp0.error_epc = value,
            (31, 0) => self.cp0.desave = value,
            _ => {
                log::warn!("CPU{}: write of unknown CP0 register {}.{}", self.index, reg, sel);
                return Err(Exception::new(ExceptionKind::ReservedInstruction));
            }
        }
        Ok(())
    }

    /// Index: the probe-failure bit plus enough bits to address the TLB
    pub fn mtc0_index(&mut self, value: u64) {
        let mut num: u32 = 1;
        let mut tmp = self.tlb.nb_tlb();
        loop {
            tmp >>= 1;
            num <<= 1;
            if tmp == 0 {
                break;
            }
        }
        self.cp0.index = (self.cp0.index & 0x8000_0000) | (value as u32 & (num - 1));
    }

    /// EntryHi: VPN2 and ASID
    ///
    /// An ASID change invalidates every cached translation.
    pub fn mtc0_entryhi(&mut self, value: u64) {
        let val = value & (!0x1FFFu64 | 0xFF) & self.model.seg_mask();
        let old = self.cp0.entry_hi;
        self.cp0.entry_hi = val;

        if self.model.has_mt() {
            self.sync_entryhi(self.current_tc);
        }
        if old & 0xFF != val & 0xFF {
            log::trace!("CPU{}: ASID {} -> {}", self.index, old & 0xFF, val & 0xFF);
            self.tlb.flush();
        }
    }

    /// Status: apply the model's writable mask and recompute modes
    pub fn mtc0_status(&mut self, value: u64) {
        let mask = self.model.status_rw_bitmask;
        let old = self.cp0.status;
        self.cp0.status = (old & !mask) | (value as u32 & mask);

        if self.model.has_mt() {
            self.sync_status(self.current_tc);
        } else {
            self.compute_hflags();
        }

        log::trace!(
            "CPU{}: Status 0x{:08X} (0x{:08X}) => 0x{:08X} Cause 0x{:08X} {:?}",
            self.index,
            old,
            old & self.read_cause() & status::IM_MASK,
            self.cp0.status,
            self.read_cause(),
            self.hflags.privilege()
        );
    }

    /// Cause: only IV, WP, the software interrupts and (R2) DC are writable
    pub fn mtc0_cause(&mut self, value: u64) {
        self.write_cause(value as u32);
    }

    /// Cause write shared with MTTC0
    pub fn write_cause(&mut self, value: u32) {
        let mut mask = CAUSE_RW_MASK;
        if self.is_r2() {
            mask |= cause::DC;
        }

        let old = self.cp0.cause;
        self.cp0.cause = (old & !mask) | (value & mask);
        let changed = old ^ self.cp0.cause;

        if changed & cause::DC != 0 {
            if self.cp0.cause & cause::DC != 0 {
                self.stop_count();
            } else {
                self.start_count();
            }
        }

        for pin in 0..2 {
            let bit = 1 << (cause::IP_SHIFT + pin as u32);
            if changed & bit != 0 {
                self.lines
                    .borrow_mut()
                    .set_level(self.index, pin, self.cp0.cause & bit != 0);
            }
        }
    }

    pub fn mfc0_lladdr(&self) -> u64 {
        sext32((self.lladdr >> self.model.lladdr_shift) as u32)
    }

    pub fn mtc0_lladdr(&mut self, value: u64) {
        let mask = self.model.lladdr_rw_bitmask;
        let value = value << self.model.lladdr_shift;
        self.lladdr = (self.lladdr & !mask) | (value & mask);
    }

    /// WatchHi: I/R/W status bits are write-one-to-clear
    pub fn mtc0_watchhi(&mut self, value: u64, sel: usize) {
        let value = value as u32;
        let old = self.cp0.watch_hi[sel];
        self.cp0.watch_hi[sel] = (old & 0x7 & !(value & 0x7)) | (value & 0x40FF_0FF8);
    }

    /// Debug with the DM bit reflected from the execution mode
    pub fn mfc0_debug(&self) -> u32 {
        let mut value = self.cp0.debug;
        if self.hflags.contains(HFlags::DM) {
            value |= debug::DM;
        }
        value
    }

    pub fn mtc0_debug(&mut self, value: u64) {
        let value = value as u32;
        self.cp0.debug = (self.cp0.debug & 0x8C03_FC1F) | (value & 0x1330_0120);
        if value & debug::DM != 0 {
            self.hflags |= HFlags::DM;
        } else {
            self.hflags.remove(HFlags::DM);
        }
        self.compute_hflags();
    }
}
