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

//! MIPS32/MIPS64 CPU control state
//!
//! A [`Cpu`] is one VPE of a multithreaded core (or a whole core when the
//! model has no MT ASE). It owns the privileged state that the core's
//! instruction helpers operate on:
//!
//! - CP0 register bank ([`Cp0`]) and the per-CPU MVP block ([`Mvp`])
//! - Thread contexts: the running one in `active_tc`, the others in `tcs`
//! - TLB engine with its host translation cache ([`Tlb`])
//! - FPU and MSA control registers
//! - Count/Compare timer
//!
//! Instruction decoding is not part of this module; a decoder calls the
//! helpers in `instructions` with already extracted register numbers.
//! Helpers that can abort return [`CpuResult`] and the caller hands the
//! error to [`Cpu::deliver_exception`].
//!
//! Operations that reach across CPUs (MTTC0/MFTC0, DVPE/EVPE) live on
//! [`crate::core::system::Machine`], which owns every CPU.

use crate::core::error::{EmulatorError, Result};
use crate::core::interrupt::SharedInterruptLines;
use crate::core::timing::{LocalTimer, VirtualClock};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

mod cop0;
mod count;
pub mod fpu;
mod hflags;
mod instructions;
pub mod model;
pub mod msa;
mod tc;
pub mod tlb;
#[cfg(test)]
mod tests;

pub use cop0::{cause, config, debug, intctl, mvp, sext32, srsctl, status, tc as tcbits, vpe, Cp0, Mvp};
pub use fpu::{FloatFlags, FloatStatus, FpCond, Fpu, RoundingMode};
pub use hflags::{HFlags, Privilege};
pub use instructions::EXCP_TLB_NOMATCH;
pub(crate) use instructions::masked_vpecontrol;
pub use model::{CpuModel, IsaFlags};
pub use msa::{DataFormat, Msa, Wr};
pub use tc::{TcState, MIPS_DSP_ACC};
pub use tlb::{Lfsr, RandomSource, Tlb, TlbEntry, TlbLookup, TlbState};

/// Largest number of TCs a VPE may carry
pub const MAX_THREADS: usize = 8;

/// Reset exception vector
pub const RESET_VECTOR: u32 = 0xBFC0_0000;

/// One VPE: CP0 state, thread contexts, TLB and coprocessor control
pub struct Cpu {
    /// VPE number, also the CPU's interrupt fabric index
    index: usize,
    model: &'static CpuModel,
    nr_threads: usize,
    num_vpe: usize,

    cp0: Cp0,
    mvp: Mvp,

    /// Register file of the running TC
    active_tc: TcState,
    /// Register files of every TC; slot `current_tc` is stale while running
    tcs: Vec<TcState>,
    current_tc: usize,

    tlb: Tlb,
    fpu: Fpu,
    msa: Msa,
    hflags: HFlags,

    /// Load-linked address; 1 after ERET marks it invalid
    lladdr: u64,
    halted: bool,
    /// A wake-up request is pending (set by EVPE and TCHalt writes)
    wake_requested: bool,
    in_branch_delay: bool,

    count_timer: LocalTimer,
    clock: Rc<VirtualClock>,
    lines: SharedInterruptLines,
}

/// Serializable image of a [`Cpu`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuState {
    pub index: usize,
    pub model: String,
    pub nr_threads: usize,
    pub cp0: Cp0,
    pub mvp: Mvp,
    pub active_tc: TcState,
    pub tcs: Vec<TcState>,
    pub current_tc: usize,
    pub tlb: TlbState,
    pub fpu: Fpu,
    pub msa: Msa,
    pub hflags: HFlags,
    pub lladdr: u64,
    pub halted: bool,
    pub wake_requested: bool,
    pub in_branch_delay: bool,
    pub count_timer: LocalTimer,
}

impl Cpu {
    /// Create a CPU and bring it out of reset
    ///
    /// # Arguments
    ///
    /// * `index` - VPE number of this CPU
    /// * `model` - Static model description
    /// * `nr_threads` - TCs per VPE (1-8); forced to 1 for models without MT
    /// * `num_vpe` - Total VPEs in the machine, reported through MVPConf0
    /// * `clock` - Shared virtual clock
    /// * `lines` - Shared interrupt line fabric
    /// * `tlb_seed` - Seed of the TLBWR random index generator
    ///
    /// # Errors
    ///
    /// [`EmulatorError::InvalidThreadCount`] for a thread count outside 1-8.
    pub fn new(
        index: usize,
        model: &'static CpuModel,
        nr_threads: usize,
        num_vpe: usize,
        clock: Rc<VirtualClock>,
        lines: SharedInterruptLines,
        tlb_seed: u32,
    ) -> Result<Self> {
        Self::with_random(
            index,
            model,
            nr_threads,
            num_vpe,
            clock,
            lines,
            Box::new(Lfsr::new(tlb_seed)),
        )
    }

    /// Like [`Cpu::new`] with a caller-supplied TLBWR random source
    pub fn with_random(
        index: usize,
        model: &'static CpuModel,
        nr_threads: usize,
        num_vpe: usize,
        clock: Rc<VirtualClock>,
        lines: SharedInterruptLines,
        random: Box<dyn RandomSource>,
    ) -> Result<Self> {
        if nr_threads == 0 || nr_threads > MAX_THREADS {
            return Err(EmulatorError::InvalidThreadCount(nr_threads));
        }
        let nr_threads = if model.has_mt() { nr_threads } else { 1 };

        let mut cpu = Self {
            index,
            model,
            nr_threads,
            num_vpe: num_vpe.max(1),
            cp0: Cp0::default(),
            mvp: Mvp::default(),
            active_tc: TcState::default(),
            tcs: vec![TcState::default(); nr_threads],
            current_tc: 0,
            tlb: Tlb::new(model.nb_tlb, random),
            fpu: Fpu::new(model.fcr0),
            msa: Msa::default(),
            hflags: HFlags::empty(),
            lladdr: 0,
            halted: false,
            wake_requested: false,
            in_branch_delay: false,
            count_timer: LocalTimer::new(),
            clock,
            lines,
        };
        cpu.reset();
        Ok(cpu)
    }

    /// Hardware reset
    ///
    /// Loads the model's identification and configuration registers, puts
    /// the CPU in kernel mode with BEV and ERL set and points the PC at the
    /// reset vector. With the MT ASE only VPE 0 comes up running, every
    /// other VPE waits halted for an EVPE.
    pub fn reset(&mut self) {
        let model = self.model;
        let nb_tlb = self.tlb.nb_tlb();
        let old_pc = self.active_tc.pc;

        self.count_timer.delete();
        self.cp0 = Cp0::default();
        self.mvp = Mvp::new(nb_tlb, self.num_vpe, self.nr_threads);
        self.active_tc = TcState::default();
        self.tcs = vec![TcState::default(); self.nr_threads];
        self.current_tc = 0;
        self.tlb.reset();
        self.fpu = Fpu::new(model.fcr0);
        self.fpu.restore_modes();
        self.msa = Msa::default();
        self.msa.restore_modes();
        self.lladdr = 0;
        self.halted = false;
        self.wake_requested = false;
        self.in_branch_delay = false;

        let cp0 = &mut self.cp0;
        cp0.prid = model.prid;
        cp0.config = [
            model.config0,
            model.config1,
            model.config2,
            model.config3,
            0,
            0,
            model.config6,
            model.config7,
        ];
        cp0.srsctl = model.srsctl;
        cp0.srs_conf = model.srs_conf;
        cp0.wired = 0;
        cp0.ebase = 0x8000_0000 | (self.index as u32 & 0x3FF);
        cp0.status = status::BEV | status::ERL;
        cp0.intctl = 0xE000_0000;
        cp0.debug = debug::CNT | (1 << debug::VER_SHIFT);
        cp0.error_epc = old_pc;

        self.hflags = HFlags::CP0;
        self.active_tc.pc = sext32(RESET_VECTOR);
        self.compute_hflags();

        if model.has_mt() {
            let bind = (self.index as u32) << tcbits::BIND_CURVPE_SHIFT;
            for tc in self.tcs.iter_mut().chain(std::iter::once(&mut self.active_tc)) {
                tc.tcbind = bind;
                tc.tchalt = 1;
            }
            self.halted = true;

            if self.index == 0 {
                self.mvp.control |= mvp::CTL_EVP;
                self.cp0.vpe_conf0 |= vpe::CONF0_MVP | vpe::CONF0_VPA;
                self.halted = false;
                self.active_tc.tchalt = 0;
                self.tcs[0].tchalt = 0;
                self.active_tc.tcstatus = tcbits::STATUS_A;
                self.tcs[0].tcstatus = tcbits::STATUS_A;
            }
        }

        self.cp0.compare = 0;
        self.store_count(1);

        log::debug!(
            "CPU{} reset ({}, {} TC{}, halted={})",
            self.index,
            model.name,
            self.nr_threads,
            if self.nr_threads == 1 { "" } else { "s" },
            self.halted
        );
    }

    // Accessors

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn model(&self) -> &'static CpuModel {
        self.model
    }

    /// TCs per VPE
    pub fn nr_threads(&self) -> usize {
        self.nr_threads
    }

    pub fn current_tc(&self) -> usize {
        self.current_tc
    }

    pub fn cp0(&self) -> &Cp0 {
        &self.cp0
    }

    /// Raw CP0 access; bypasses writable masks and side effects
    pub fn cp0_mut(&mut self) -> &mut Cp0 {
        &mut self.cp0
    }

    pub fn mvp(&self) -> &Mvp {
        &self.mvp
    }

    pub fn mvp_mut(&mut self) -> &mut Mvp {
        &mut self.mvp
    }

    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    pub fn fpu(&self) -> &Fpu {
        &self.fpu
    }

    pub fn fpu_mut(&mut self) -> &mut Fpu {
        &mut self.fpu
    }

    pub fn msa(&self) -> &Msa {
        &self.msa
    }

    pub fn msa_mut(&mut self) -> &mut Msa {
        &mut self.msa
    }

    pub fn hflags(&self) -> HFlags {
        self.hflags
    }

    pub fn lladdr(&self) -> u64 {
        self.lladdr
    }

    pub fn set_lladdr(&mut self, value: u64) {
        self.lladdr = value;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn wake_requested(&self) -> bool {
        self.wake_requested
    }

    pub fn in_branch_delay(&self) -> bool {
        self.in_branch_delay
    }

    /// Mark the next exception as taken in a branch delay slot
    pub fn set_branch_delay(&mut self, in_delay: bool) {
        self.in_branch_delay = in_delay;
    }

    pub fn pc(&self) -> u64 {
        self.active_tc.pc
    }

    /// Set the PC of the running TC
    ///
    /// Bit 0 selects MIPS16 mode and is not part of the address.
    pub fn set_pc(&mut self, target: u64) {
        self.active_tc.pc = target & !1;
        if target & 1 != 0 {
            self.hflags |= HFlags::M16;
        } else {
            self.hflags.remove(HFlags::M16);
        }
    }

    /// General purpose register of the running TC ($zero reads 0)
    pub fn gpr(&self, reg: usize) -> u64 {
        if reg == 0 {
            0
        } else {
            self.active_tc.gpr[reg & 31]
        }
    }

    pub fn set_gpr(&mut self, reg: usize, value: u64) {
        if reg != 0 {
            self.active_tc.gpr[reg & 31] = value;
        }
    }

    // Thread contexts

    /// Register file of TC `tc`, resolving the active/suspended duality
    ///
    /// # Panics
    ///
    /// Panics if `tc` is not below [`Cpu::nr_threads`].
    pub fn tc(&self, tc: usize) -> &TcState {
        if tc == self.current_tc {
            &self.active_tc
        } else {
            &self.tcs[tc]
        }
    }

    /// Mutable register file of TC `tc`; see [`Cpu::tc`]
    pub fn tc_mut(&mut self, tc: usize) -> &mut TcState {
        if tc == self.current_tc {
            &mut self.active_tc
        } else {
            &mut self.tcs[tc]
        }
    }

    /// Make `new_tc` the running TC
    ///
    /// The outgoing register file is stored back into its slot first.
    /// Out-of-range indices are logged and ignored.
    pub fn switch_tc(&mut self, new_tc: usize) {
        if new_tc >= self.nr_threads {
            log::warn!("CPU{}: switch to unknown TC {}", self.index, new_tc);
            return;
        }
        if new_tc == self.current_tc {
            return;
        }

        self.tcs[self.current_tc] = self.active_tc.clone();
        self.active_tc = self.tcs[new_tc].clone();
        log::debug!("CPU{}: TC{} -> TC{}", self.index, self.current_tc, new_tc);
        self.current_tc = new_tc;
    }

    /// Recompute the derived execution-mode flags
    pub fn compute_hflags(&mut self) {
        self.hflags = self
            .hflags
            .compute(self.cp0.status, self.model.isa, self.fpu.fcr0);
    }

    // VPE scheduling state

    /// Whether this VPE is allowed to run at all
    ///
    /// Requires the VPE to be enabled in MVPControl and VPEConf0 and its
    /// running TC to be activated and not halted.
    pub fn vpe_active(&self) -> bool {
        self.mvp.control & mvp::CTL_EVP != 0
            && self.cp0.vpe_conf0 & vpe::CONF0_VPA != 0
            && self.active_tc.tcstatus & tcbits::STATUS_A != 0
            && self.active_tc.tchalt & 1 == 0
    }

    /// Halted but otherwise active: waiting for an interrupt
    pub fn is_wfi(&self) -> bool {
        self.halted && self.vpe_active()
    }

    /// Put the VPE to sleep, dropping any pending wake-up request
    pub fn vpe_sleep(&mut self) {
        self.halted = true;
        self.wake_requested = false;
    }

    /// Ask the VPE to wake up
    ///
    /// The CPU is not unhalted here; [`Cpu::has_work`] decides whether it
    /// actually resumes since other conditions may keep it asleep.
    pub fn vpe_wake(&mut self) {
        self.wake_requested = true;
    }

    pub fn tc_sleep(&mut self, _tc: usize) {
        if !self.vpe_active() {
            self.vpe_sleep();
        }
    }

    pub fn tc_wake(&mut self, _tc: usize) {
        if self.vpe_active() && !self.is_wfi() {
            self.vpe_wake();
        }
    }

    /// Cause with the interrupt fabric levels merged into IP7..IP0
    pub fn read_cause(&self) -> u32 {
        let pending = self.lines.borrow().pending(self.index) as u32;
        (self.cp0.cause & !cause::IP_MASK) | (pending << cause::IP_SHIFT)
    }

    /// Whether an unmasked hardware or software interrupt can be taken
    pub fn interrupts_pending(&self) -> bool {
        let sr = self.cp0.status;
        if sr & status::IE == 0
            || sr & (status::EXL | status::ERL) != 0
            || self.hflags.contains(HFlags::DM)
        {
            return false;
        }
        self.read_cause() & sr & status::IM_MASK != 0
    }

    /// Whether a halted CPU should resume
    pub fn has_work(&self) -> bool {
        let mut has_work = self.interrupts_pending();
        if self.model.has_mt() {
            if self.wake_requested {
                has_work = true;
            }
            if !self.vpe_active() {
                has_work = false;
            }
        }
        has_work
    }

    /// Resume a halted CPU
    pub fn wake(&mut self) {
        self.halted = false;
        self.wake_requested = false;
    }

    // Save state

    pub fn snapshot(&self) -> CpuState {
        CpuState {
            index: self.index,
            model: self.model.name.to_string(),
            nr_threads: self.nr_threads,
            cp0: self.cp0.clone(),
            mvp: self.mvp,
            active_tc: self.active_tc.clone(),
            tcs: self.tcs.clone(),
            current_tc: self.current_tc,
            tlb: self.tlb.snapshot(),
            fpu: self.fpu.clone(),
            msa: self.msa.clone(),
            hflags: self.hflags,
            lladdr: self.lladdr,
            halted: self.halted,
            wake_requested: self.wake_requested,
            in_branch_delay: self.in_branch_delay,
            count_timer: self.count_timer,
        }
    }

    /// Load a [`CpuState`] taken from a CPU of the same shape
    pub fn restore(&mut self, state: &CpuState) -> Result<()> {
        if state.model != self.model.name
            || state.nr_threads != self.nr_threads
            || state.tcs.len() != self.nr_threads
            || state.current_tc >= self.nr_threads
        {
            return Err(EmulatorError::SaveStateMismatch(format!(
                "CPU{}: snapshot is {} with {} TCs, machine has {} with {}",
                self.index, state.model, state.nr_threads, self.model.name, self.nr_threads
            )));
        }

        self.tlb.restore(&state.tlb)?;
        self.cp0 = state.cp0.clone();
        self.mvp = state.mvp;
        self.active_tc = state.active_tc.clone();
        self.tcs = state.tcs.clone();
        self.current_tc = state.current_tc;
        self.fpu = state.fpu.clone();
        self.fpu.restore_modes();
        self.msa = state.msa.clone();
        self.hflags = state.hflags;
        self.lladdr = state.lladdr;
        self.halted = state.halted;
        self.wake_requested = state.wake_requested;
        self.in_branch_delay = state.in_branch_delay;
        self.count_timer = state.count_timer;
        Ok(())
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("index", &self.index)
            .field("model", &self.model.name)
            .field("pc", &format_args!("0x{:016X}", self.active_tc.pc))
            .field("current_tc", &self.current_tc)
            .field("halted", &self.halted)
            .field("hflags", &self.hflags)
            .finish()
    }
}
