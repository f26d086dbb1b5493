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
//! Machine assembly
//!
//! The [`Machine`] ties the CPUs, the GIC, the interrupt line fabric and the
//! virtual clock together and hosts every operation that reaches across
//! CPUs: the MT cross-TC register moves, DVPE/EVPE and the interrupt and
//! timer service loops.
//!
//! # Components
//!
//! - CPUs: one [`Cpu`] per VPE, indexed by VPE number
//! - GIC: shared, mapped on the MMIO bus at `gic_base`
//! - Interrupt lines: shared by the GIC and every CPU
//! - Clock: the single source of virtual time

mod mt;

#[cfg(test)]
mod tests;

use super::config::MachineConfig;
use super::cpu::{Cpu, CpuModel};
use super::error::{Exception, ExceptionKind, Result};
use super::gic::Gic;
use super::interrupt::{InterruptLines, SharedInterruptLines};
use super::memory::MmioMap;
use super::timing::{Nanoseconds, VirtualClock};
use std::cell::RefCell;
use std::rc::Rc;

/// A multi-VPE MIPS machine
///
/// # Example
///
/// ```
/// use mipsmt::core::config::MachineConfig;
/// use mipsmt::core::system::Machine;
///
/// let mut machine = Machine::new(&MachineConfig::default()).unwrap();
/// assert_eq!(machine.num_cpus(), 2);
///
/// // VPE 0 runs out of reset, VPE 1 waits for EVPE
/// assert!(!machine.cpu(0).unwrap().is_halted());
/// assert!(machine.cpu(1).unwrap().is_halted());
///
/// machine.advance(1_000);
/// assert_eq!(machine.now_ns(), 1_000);
/// ```
pub struct Machine {
    /// CPUs, indexed by VPE number
    cpus: Vec<Cpu>,
    /// Global Interrupt Controller (shared via Rc<RefCell> for MMIO access)
    gic: Rc<RefCell<Gic>>,
    /// Device windows on the physical bus
    mmio: MmioMap,
    /// Interrupt inputs of every CPU
    lines: SharedInterruptLines,
    /// Virtual time shared by every timer
    clock: Rc<VirtualClock>,
    model: &'static CpuModel,
    gic_base: u64,
}

impl Machine {
    /// Build and reset a machine
    ///
    /// # Errors
    ///
    /// Any configuration error reported by [`MachineConfig::validate`].
    pub fn new(config: &MachineConfig) -> Result<Self> {
        config.validate()?;
        let model = config.model()?;

        let clock = Rc::new(VirtualClock::new());
        let lines = InterruptLines::shared(config.cpus);

        let cpus = (0..config.cpus)
            .map(|index| {
                Cpu::new(
                    index,
                    model,
                    config.threads_per_vpe,
                    config.cpus,
                    clock.clone(),
                    lines.clone(),
                    config.tlb_seed.wrapping_add(index as u32),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let gic = Rc::new(RefCell::new(Gic::new(
            config.gic_config(),
            clock.clone(),
            lines.clone(),
        )?));

        let mut mmio = MmioMap::new();
        mmio.register(config.gic_base, gic.clone());

        log::info!(
            "Machine: {} x {} ({} TC{} per VPE), GIC with {} sources at 0x{:08X}",
            config.cpus,
            model.name,
            cpus[0].nr_threads(),
            if cpus[0].nr_threads() == 1 { "" } else { "s" },
            config.num_irq,
            config.gic_base
        );

        Ok(Self {
            cpus,
            gic,
            mmio,
            lines,
            clock,
            model,
            gic_base: config.gic_base,
        })
    }

    /// Hardware reset of every component
    ///
    /// Virtual time keeps running; only device state is reset.
    pub fn reset(&mut self) {
        self.lines.borrow_mut().reset();
        for cpu in self.cpus.iter_mut() {
            cpu.reset();
        }
        self.gic.borrow_mut().reset();
        log::info!("Machine reset at {} ns", self.clock.now_ns());
    }

    // Accessors

    pub fn num_cpus(&self) -> usize {
        self.cpus.len()
    }

    pub fn cpu(&self, index: usize) -> Option<&Cpu> {
        self.cpus.get(index)
    }

    pub fn cpu_mut(&mut self, index: usize) -> Option<&mut Cpu> {
        self.cpus.get_mut(index)
    }

    pub fn cpus(&self) -> &[Cpu] {
        &self.cpus
    }

    /// Get a reference to the GIC
    pub fn gic(&self) -> &Rc<RefCell<Gic>> {
        &self.gic
    }

    pub fn lines(&self) -> &SharedInterruptLines {
        &self.lines
    }

    pub(crate) fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn model(&self) -> &'static CpuModel {
        self.model
    }

    pub fn gic_base(&self) -> u64 {
        self.gic_base
    }

    /// Current virtual time in nanoseconds
    pub fn now_ns(&self) -> Nanoseconds {
        self.clock.now_ns()
    }

    /// Interrupt input levels of CPU `cpu`, bit n = Cause.IPn
    pub fn pending_lines(&self, cpu: usize) -> u8 {
        self.lines.borrow().pending(cpu)
    }

    // Bus

    /// Physical read issued by CPU `cpu`
    pub fn mmio_read(&self, cpu: usize, addr: u64, size: u32) -> u64 {
        self.mmio.read(cpu, addr, size)
    }

    /// Physical write issued by CPU `cpu`
    pub fn mmio_write(&self, cpu: usize, addr: u64, size: u32, value: u64) {
        self.mmio.write(cpu, addr, size, value)
    }

    /// Drive GIC input `n`, as an upstream device would
    pub fn set_irq(&self, n: usize, level: bool) {
        self.gic.borrow_mut().set_irq(n, level);
    }

    // Time

    /// Earliest armed GIC or Count/Compare deadline
    pub fn next_deadline(&self) -> Option<Nanoseconds> {
        let gic = self.gic.borrow().next_deadline();
        let cpus = self.cpus.iter().filter_map(Cpu::count_deadline).min();
        match (gic, cpus) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every GIC and Count/Compare timer due at the current time
    ///
    /// Returns the number of timers fired.
    pub fn poll_timers(&mut self) -> usize {
        let mut fired = self.gic.borrow_mut().poll_timers();
        for cpu in self.cpus.iter_mut() {
            if cpu.poll_count_timer() {
                fired += 1;
            }
        }
        fired
    }

    /// Move virtual time forward by `ns`
    ///
    /// The clock stops at every deadline on the way so timers fire in
    /// deadline order, each seeing the time it was due at.
    ///
    /// Returns the number of timers fired.
    pub fn advance(&mut self, ns: Nanoseconds) -> usize {
        let target = self.clock.now_ns().saturating_add(ns);
        let mut fired = 0;

        while let Some(deadline) = self.next_deadline().filter(|&deadline| deadline <= target) {
            self.clock.advance_to(deadline);
            let count = self.poll_timers();
            if count == 0 {
                break;
            }
            fired += count;
        }

        self.clock.advance_to(target);
        fired + self.poll_timers()
    }

    // Interrupts

    /// Wake halted CPUs with work and take pending interrupts
    ///
    /// A halted CPU is resumed when [`Cpu::has_work`] says so. Every running
    /// CPU with an unmasked interrupt then takes an Interrupt exception.
    ///
    /// Returns the number of interrupts delivered.
    pub fn service_interrupts(&mut self) -> usize {
        let mut delivered = 0;
        for cpu in self.cpus.iter_mut() {
            if cpu.is_halted() {
                if !cpu.has_work() {
                    continue;
                }
                log::debug!("CPU{}: woken up", cpu.index());
                cpu.wake();
            }
            if cpu.interrupts_pending() {
                log::trace!(
                    "CPU{}: interrupt, Cause 0x{:08X}",
                    cpu.index(),
                    cpu.read_cause()
                );
                cpu.deliver_exception(Exception::new(ExceptionKind::Interrupt));
                delivered += 1;
            }
        }
        delivered
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("model", &self.model.name)
            .field("now_ns", &self.clock.now_ns())
            .field("cpus", &self.cpus)
            .finish()
    }
}
