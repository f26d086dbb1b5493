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

//! MT ASE: VPE/TC control registers and YIELD
//!
//! Status and the running TC's TCStatus alias the same fields (CU, MX,
//! KSU) and EntryHi shares its ASID with TCStatus.TASID. Every write to one
//! side goes through the matching `sync_*` helper so both views agree.
//!
//! The `sync_*` helpers and the TC sleep/wake helpers take the TC index
//! explicitly because MTTC0 applies them to a TC of another CPU.

use super::super::{mvp, status, tcbits as tc, vpe, Cpu};
use crate::core::error::{CpuResult, Exception, ExceptionKind};

/// Status fields mirrored in TCStatus
const STATUS_SYNC_MASK: u32 = (0xF << status::CU_SHIFT) | status::MX | status::KSU_MASK;

/// TCStatus fields mirrored from Status and EntryHi
const TCSTATUS_SYNC_MASK: u32 =
    (0xF << tc::STATUS_TCU_SHIFT) | tc::STATUS_TMX | (0x3 << tc::STATUS_TKSU_SHIFT) | tc::STATUS_TASID_MASK;

/// VPEControl.EXCPT value for a YIELD with an invalid qualifier
const EXCPT_YIELD_QUALIFIER: u32 = 2;
/// VPEControl.EXCPT value for a yield scheduler exception
const EXCPT_YIELD_SCHEDULER: u32 = 4;

impl Cpu {
    /// Copy Status.{CU, MX, KSU} and the EntryHi ASID into TC `tc`'s TCStatus
    pub fn sync_status(&mut self, tc: usize) {
        let v = self.cp0.status;
        let cu = (v >> status::CU_SHIFT) & 0xF;
        let mx = (v & status::MX != 0) as u32;
        let ksu = (v & status::KSU_MASK) >> status::KSU_SHIFT;
        let asid = self.cp0.entry_hi as u32 & 0xFF;

        let tcstatus = (cu << tc::STATUS_TCU_SHIFT)
            | (mx * tc::STATUS_TMX)
            | (ksu << tc::STATUS_TKSU_SHIFT)
            | asid;

        let target = self.tc_mut(tc);
        target.tcstatus = (target.tcstatus & !TCSTATUS_SYNC_MASK) | tcstatus;
        self.compute_hflags();
    }

    /// Copy TCStatus.{TCU, TMX, TKSU} into Status and TASID into EntryHi
    pub fn sync_tcstatus(&mut self, _tc: usize, value: u32) {
        let tcu = (value >> tc::STATUS_TCU_SHIFT) & 0xF;
        let tmx = (value & tc::STATUS_TMX != 0) as u32;
        let tksu = (value >> tc::STATUS_TKSU_SHIFT) & 0x3;
        let tasid = (value & tc::STATUS_TASID_MASK) as u64;

        let bits = (tcu << status::CU_SHIFT) | (tmx * status::MX) | (tksu << status::KSU_SHIFT);
        self.cp0.status = (self.cp0.status & !STATUS_SYNC_MASK) | bits;
        self.cp0.entry_hi = (self.cp0.entry_hi & !0xFF) | tasid;
        self.compute_hflags();
    }

    /// Copy the EntryHi ASID into TC `tc`'s TCStatus.TASID
    pub fn sync_entryhi(&mut self, tc: usize) {
        let asid = self.cp0.entry_hi as u32 & 0xFF;
        let target = self.tc_mut(tc);
        target.tcstatus = (target.tcstatus & !tc::STATUS_TASID_MASK) | asid;
    }

    pub fn mtc0_mvpcontrol(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        let mut mask = 0;
        if self.cp0.vpe_conf0 & vpe::CONF0_MVP != 0 {
            mask |= mvp::CTL_CPA | mvp::CTL_VPC | mvp::CTL_EVP;
        }
        if self.mvp.control & mvp::CTL_VPC != 0 {
            mask |= mvp::CTL_STLB;
        }
        self.mvp.control = (self.mvp.control & !mask) | (value as u32 & mask);
        Ok(())
    }

    pub fn mtc0_vpecontrol(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        self.cp0.vpe_control = masked_vpecontrol(self.cp0.vpe_control, value as u32);
        Ok(())
    }

    pub fn mtc0_vpeconf0(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        self.cp0.vpe_conf0 = masked_vpeconf0(self.cp0.vpe_conf0, value as u32);
        Ok(())
    }

    pub fn mtc0_vpeconf1(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        let mut mask = 0;
        if self.mvp.control & mvp::CTL_VPC != 0 {
            mask |= (0xFF << vpe::CONF1_NCX_SHIFT)
                | (0xFF << vpe::CONF1_NCP2_SHIFT)
                | (0xFF << vpe::CONF1_NCP1_SHIFT);
        }
        // UDI and CP2 are not implemented
        self.cp0.vpe_conf1 = (self.cp0.vpe_conf1 & !mask) | (value as u32 & mask);
        Ok(())
    }

    /// YQMask: yield qualifier inputs are not implemented
    pub fn mtc0_yqmask(&mut self, _value: u64) -> CpuResult<()> {
        self.check_mt()?;
        self.cp0.yq_mask = 0;
        Ok(())
    }

    pub fn mtc0_vpeopt(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        self.cp0.vpe_opt = value as u32 & 0xFFFF;
        Ok(())
    }

    pub fn mtc0_tcstatus(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        let mask = self.model.tcstatus_rw_bitmask;
        let newval = (self.active_tc.tcstatus & !mask) | (value as u32 & mask);
        self.active_tc.tcstatus = newval;
        self.sync_tcstatus(self.current_tc, newval);
        Ok(())
    }

    pub fn mtc0_tcbind(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        self.active_tc.tcbind = self.masked_tcbind(self.active_tc.tcbind, value as u32);
        Ok(())
    }

    /// TCBind writable bits depend on this CPU's MVPControl.VPC
    pub fn masked_tcbind(&self, old: u32, value: u32) -> u32 {
        let mut mask = tc::BIND_TBE;
        if self.mvp.control & mvp::CTL_VPC != 0 {
            mask |= 1 << tc::BIND_CURVPE_SHIFT;
        }
        (old & !mask) | (value & mask)
    }

    /// TCRestart: new PC for the TC, dropping the delay slot and LL state
    pub fn mtc0_tcrestart(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        self.active_tc.pc = value;
        self.active_tc.tcstatus &= !tc::STATUS_TDS;
        self.lladdr = 0;
        Ok(())
    }

    pub fn mtc0_tchalt(&mut self, value: u64) -> CpuResult<()> {
        self.check_mt()?;
        self.active_tc.tchalt = value as u32 & 0x1;
        self.update_tc_halt(self.current_tc);
        Ok(())
    }

    /// Sleep or wake the VPE after TC `tc`'s TCHalt changed
    pub fn update_tc_halt(&mut self, tc: usize) {
        if self.tc(tc).tchalt & 1 != 0 {
            self.tc_sleep(tc);
        } else {
            self.tc_wake(tc);
        }
    }

    /// YIELD: reschedule or query the yield qualifiers
    ///
    /// No scheduling policy is implemented:
    ///
    /// - `arg < 0`, except the query value -2: a scheduler exception when
    ///   VPEControl.YSI and TCStatus.DT are both set, otherwise nothing
    /// - `arg == 0`: would deallocate the TC; nothing happens
    /// - `arg > 0`: qualifier inputs are not implemented, so always a
    ///   Thread exception
    ///
    /// # Returns
    ///
    /// YQMask
    pub fn yield_tc(&mut self, arg: i64) -> CpuResult<u64> {
        self.check_mt()?;

        if arg < 0 {
            if arg != -2
                && self.cp0.vpe_control & vpe::CTL_YSI != 0
                && self.active_tc.tcstatus & tc::STATUS_DT != 0
            {
                return Err(self.thread_exception(EXCPT_YIELD_SCHEDULER));
            }
        } else if arg > 0 {
            return Err(self.thread_exception(EXCPT_YIELD_QUALIFIER));
        }
        Ok(self.cp0.yq_mask)
    }

    fn thread_exception(&mut self, excpt: u32) -> Exception {
        self.cp0.vpe_control =
            (self.cp0.vpe_control & !vpe::CTL_EXCPT_MASK) | (excpt << vpe::CTL_EXCPT_SHIFT);
        log::debug!("CPU{}: thread exception, EXCPT={}", self.index, excpt);
        Exception::new(ExceptionKind::Thread)
    }
}

/// VPEControl writable bits
pub(crate) fn masked_vpecontrol(old: u32, value: u32) -> u32 {
    let mask = vpe::CTL_YSI | vpe::CTL_GSI | vpe::CTL_TE | vpe::CTL_TARGTC_MASK;
    (old & !mask) | (value & mask)
}

/// VPEConf0 writable bits; only a master VPE may change them
fn masked_vpeconf0(old: u32, value: u32) -> u32 {
    let mut mask = 0;
    if old & vpe::CONF0_MVP != 0 {
        if old & vpe::CONF0_VPA != 0 {
            mask |= 0xFF << vpe::CONF0_XTC_SHIFT;
        }
        mask |= vpe::CONF0_MVP | vpe::CONF0_VPA;
    }
    (old & !mask) | (value & mask)
}
