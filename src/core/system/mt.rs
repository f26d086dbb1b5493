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
//! MT ASE operations that reach across VPEs
//!
//! MFTR/MTTR (the `mft*`/`mtt*` helpers) access the thread context
//! selected by the issuing CPU's VPEControl.TargTC. The global TC number is
//! mapped to a (VPE, local TC) pair by [`Machine::resolve_tc`]; the target
//! register file is then reached through [`Cpu::tc`]/[`Cpu::tc_mut`], which
//! pick the active copy when the target TC is running.
//!
//! Every helper takes the index of the issuing CPU.
//!
//! # Panics
//!
//! All helpers panic if the issuing CPU index is not a CPU of the machine.

use super::Machine;
use crate::core::cpu::{
    debug, masked_vpecontrol, mvp, sext32, tcbits, vpe, Cpu, HFlags, TcState, MIPS_DSP_ACC,
};
use crate::core::error::{CpuResult, Exception, ExceptionKind};

/// Status bits MTTC0 clears: CU3..CU0, MX and KSU
const MTTC0_STATUS_RO_MASK: u32 = 0xF100_0018;

impl Machine {
    /// Map global TC number `tc_index` to `(cpu, local_tc)` for `cpu`
    ///
    /// A VPE without VPEConf0.MVP may only address itself: the request is
    /// clamped to its own running TC. A TC number beyond the last VPE stays
    /// on the issuing CPU.
    pub fn resolve_tc(&self, cpu: usize, tc_index: usize) -> (usize, usize) {
        let current = &self.cpus[cpu];
        if current.cp0().vpe_conf0 & vpe::CONF0_MVP == 0 {
            return (cpu, current.current_tc());
        }

        let nr_threads = current.nr_threads();
        let vpe_idx = tc_index / nr_threads;
        let local_tc = tc_index % nr_threads;
        if vpe_idx < self.cpus.len() {
            (vpe_idx, local_tc)
        } else {
            (cpu, local_tc)
        }
    }

    /// Resolve the VPEControl.TargTC of `cpu`
    pub fn target_tc(&self, cpu: usize) -> (usize, usize) {
        let targtc = self.cpus[cpu].cp0().vpe_control & vpe::CTL_TARGTC_MASK;
        self.resolve_tc(cpu, targtc as usize)
    }

    /// MFTR/MTTR, DVPE and EVPE need the MT ASE and CP0 access
    fn check_mt_access(&self, cpu: usize) -> CpuResult<()> {
        let current = &self.cpus[cpu];
        if !current.model().has_mt() {
            return Err(Exception::new(ExceptionKind::ReservedInstruction));
        }
        if !current.hflags().contains(HFlags::CP0) {
            return Err(Exception::with_code(ExceptionKind::CoprocessorUnusable, 0));
        }
        Ok(())
    }

    fn target_cpu(&mut self, cpu: usize) -> CpuResult<(&mut Cpu, usize)> {
        self.check_mt_access(cpu)?;
        let (other, tc) = self.target_tc(cpu);
        log::trace!("CPU{}: cross-TC access to VPE{} TC{}", cpu, other, tc);
        Ok((&mut self.cpus[other], tc))
    }

    fn read_target_tc<T>(&mut self, cpu: usize, read: impl FnOnce(&TcState) -> T) -> CpuResult<T> {
        let (other, tc) = self.target_cpu(cpu)?;
        Ok(read(other.tc(tc)))
    }

    fn write_target_tc(&mut self, cpu: usize, write: impl FnOnce(&mut TcState)) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        write(other.tc_mut(tc));
        Ok(())
    }

    // MFTC0

    pub fn mftc0_tcstatus(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| sext32(tc.tcstatus))
    }

    pub fn mftc0_tcbind(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| sext32(tc.tcbind))
    }

    pub fn mftc0_tcrestart(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.pc)
    }

    pub fn mftc0_tchalt(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| sext32(tc.tchalt))
    }

    pub fn mftc0_tccontext(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.tccontext)
    }

    pub fn mftc0_tcschedule(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.tcschedule)
    }

    pub fn mftc0_tcschefback(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.tcschefback)
    }

    pub fn mftc0_vpecontrol(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(sext32(other.cp0().vpe_control))
    }

    pub fn mftc0_vpeconf0(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(sext32(other.cp0().vpe_conf0))
    }

    pub fn mftc0_entryhi(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(other.cp0().entry_hi)
    }

    /// Cause of the target VPE, hardware lines included
    pub fn mftc0_cause(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(sext32(other.read_cause()))
    }

    pub fn mftc0_status(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(sext32(other.cp0().status))
    }

    pub fn mftc0_epc(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(other.cp0().epc)
    }

    pub fn mftc0_ebase(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(sext32(other.cp0().ebase))
    }

    /// Config0-7 of the target VPE; Config4/5 are reserved and read 0
    pub fn mftc0_configx(&mut self, cpu: usize, idx: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        let value = match idx {
            0..=3 | 6 | 7 => other.cp0().config[idx],
            _ => 0,
        };
        Ok(sext32(value))
    }

    pub fn mftc0_watchhi(&mut self, cpu: usize, sel: usize) -> CpuResult<u64> {
        let (other, _) = self.target_cpu(cpu)?;
        Ok(sext32(other.cp0().watch_hi[sel % 8]))
    }

    /// Debug of the target VPE with SSt/Halt taken from the target TC
    pub fn mftc0_debug(&mut self, cpu: usize) -> CpuResult<u64> {
        let (other, tc) = self.target_cpu(cpu)?;
        let tcstatus = other.tc(tc).debug_tcstatus;
        let value = (other.mfc0_debug() & !debug::TC_MASK) | (tcstatus & debug::TC_MASK);
        Ok(sext32(value))
    }

    // MTTC0

    /// TCStatus of the target TC, mirrored into the target VPE's Status
    pub fn mttc0_tcstatus(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        let value = value as u32;
        other.tc_mut(tc).tcstatus = value;
        other.sync_tcstatus(tc, value);
        Ok(())
    }

    /// TCBind; CurVPE is writable only when the target's MVPControl.VPC is set
    pub fn mttc0_tcbind(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        let bind = other.masked_tcbind(other.tc(tc).tcbind, value as u32);
        other.tc_mut(tc).tcbind = bind;
        Ok(())
    }

    /// TCRestart: new PC, TDS cleared, load-linked state dropped
    pub fn mttc0_tcrestart(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        let target = other.tc_mut(tc);
        target.pc = value;
        target.tcstatus &= !tcbits::STATUS_TDS;
        other.set_lladdr(0);
        Ok(())
    }

    /// TCHalt; halting or releasing the target's running TC sleeps or
    /// wakes the target VPE
    pub fn mttc0_tchalt(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        other.tc_mut(tc).tchalt = value as u32;
        other.update_tc_halt(tc);
        Ok(())
    }

    pub fn mttc0_tccontext(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        self.write_target_tc(cpu, |tc| tc.tccontext = value)
    }

    pub fn mttc0_tcschedule(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        self.write_target_tc(cpu, |tc| tc.tcschedule = value)
    }

    pub fn mttc0_tcschefback(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        self.write_target_tc(cpu, |tc| tc.tcschefback = value)
    }

    pub fn mttc0_vpecontrol(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, _) = self.target_cpu(cpu)?;
        let cp0 = other.cp0_mut();
        cp0.vpe_control = masked_vpecontrol(cp0.vpe_control, value as u32);
        Ok(())
    }

    /// VPEConf0 of the target: MVP and VPA are always writable through MTTC0
    pub fn mttc0_vpeconf0(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, _) = self.target_cpu(cpu)?;
        let mask = vpe::CONF0_MVP | vpe::CONF0_VPA;
        let cp0 = other.cp0_mut();
        cp0.vpe_conf0 = (cp0.vpe_conf0 & !mask) | (value as u32 & mask);
        Ok(())
    }

    pub fn mttc0_entryhi(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        other.cp0_mut().entry_hi = value;
        other.sync_entryhi(tc);
        Ok(())
    }

    pub fn mttc0_status(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        other.cp0_mut().status = value as u32 & !MTTC0_STATUS_RO_MASK;
        other.sync_status(tc);
        Ok(())
    }

    pub fn mttc0_cause(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, _) = self.target_cpu(cpu)?;
        other.write_cause(value as u32);
        Ok(())
    }

    pub fn mttc0_ebase(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, _) = self.target_cpu(cpu)?;
        let cp0 = other.cp0_mut();
        cp0.ebase = (cp0.ebase & !0x3FFF_F000) | (value as u32 & 0x3FFF_F000);
        Ok(())
    }

    /// Debug: SSt/Halt go to the target TC, the rest to the target VPE
    pub fn mttc0_debug(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        let (other, tc) = self.target_cpu(cpu)?;
        let value = value as u32;
        other.tc_mut(tc).debug_tcstatus = value & debug::TC_MASK;
        let cp0 = other.cp0_mut();
        cp0.debug = (cp0.debug & debug::TC_MASK) | (value & !debug::TC_MASK);
        Ok(())
    }

    // MFTR/MTTR for GPRs and the DSP accumulators

    pub fn mftgpr(&mut self, cpu: usize, sel: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.gpr[sel % 32])
    }

    pub fn mftlo(&mut self, cpu: usize, sel: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.lo[sel % MIPS_DSP_ACC])
    }

    pub fn mfthi(&mut self, cpu: usize, sel: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.hi[sel % MIPS_DSP_ACC])
    }

    pub fn mftacx(&mut self, cpu: usize, sel: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.acx[sel % MIPS_DSP_ACC])
    }

    pub fn mftdsp(&mut self, cpu: usize) -> CpuResult<u64> {
        self.read_target_tc(cpu, |tc| tc.dsp_control)
    }

    /// Write a GPR of the target TC; $zero stays zero
    pub fn mttgpr(&mut self, cpu: usize, sel: usize, value: u64) -> CpuResult<()> {
        let sel = sel % 32;
        self.write_target_tc(cpu, |tc| {
            if sel != 0 {
                tc.gpr[sel] = value;
            }
        })
    }

    pub fn mttlo(&mut self, cpu: usize, sel: usize, value: u64) -> CpuResult<()> {
        self.write_target_tc(cpu, |tc| tc.lo[sel % MIPS_DSP_ACC] = value)
    }

    pub fn mtthi(&mut self, cpu: usize, sel: usize, value: u64) -> CpuResult<()> {
        self.write_target_tc(cpu, |tc| tc.hi[sel % MIPS_DSP_ACC] = value)
    }

    pub fn mttacx(&mut self, cpu: usize, sel: usize, value: u64) -> CpuResult<()> {
        self.write_target_tc(cpu, |tc| tc.acx[sel % MIPS_DSP_ACC] = value)
    }

    pub fn mttdsp(&mut self, cpu: usize, value: u64) -> CpuResult<()> {
        self.write_target_tc(cpu, |tc| tc.dsp_control = value)
    }

    // VPE control

    /// DVPE: disable and stop every other VPE
    ///
    /// # Returns
    ///
    /// The issuing CPU's MVPControl before the instruction
    pub fn dvpe(&mut self, cpu: usize) -> CpuResult<u64> {
        self.check_mt_access(cpu)?;
        let prev = self.cpus[cpu].mvp().control;

        for other in self.cpus.iter_mut().filter(|other| other.index() != cpu) {
            other.mvp_mut().control &= !mvp::CTL_EVP;
            other.vpe_sleep();
        }
        log::debug!("CPU{}: DVPE", cpu);
        Ok(sext32(prev))
    }

    /// EVPE: enable and wake every other VPE
    ///
    /// A VPE sleeping in WAIT is left alone.
    ///
    /// # Returns
    ///
    /// The issuing CPU's MVPControl before the instruction
    pub fn evpe(&mut self, cpu: usize) -> CpuResult<u64> {
        self.check_mt_access(cpu)?;
        let prev = self.cpus[cpu].mvp().control;

        for other in self.cpus.iter_mut().filter(|other| other.index() != cpu) {
            if other.is_wfi() {
                continue;
            }
            other.mvp_mut().control |= mvp::CTL_EVP;
            other.vpe_wake();
        }
        log::debug!("CPU{}: EVPE", cpu);
        Ok(sext32(prev))
    }

    /// YIELD issued by `cpu`; see [`Cpu::yield_tc`]
    pub fn yield_tc(&mut self, cpu: usize, arg: i64) -> CpuResult<u64> {
        self.cpus[cpu].yield_tc(arg)
    }
}
