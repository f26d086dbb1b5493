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
//! Machine test modules
//!
//! - `basic`: construction, MMIO routing and reset
//! - `interrupts`: GIC routing into CPUs and interrupt service
//! - `timers`: virtual time and the GIC/CP0 timers
//! - `mt`: TC resolution, cross-TC register moves, DVPE/EVPE

use super::*;
use crate::core::gic::registers::*;


#[cfg(test)]
mod interrupts;



/// 34Kf machine with `cpus` VPEs of two TCs and eight GIC sources
fn machine(cpus: usize) -> Machine {
    Machine::new(&MachineConfig {
        cpus,
        num_irq: 8,
        ..Default::default()
    })
    .unwrap()
}

fn gic_write(machine: &Machine, cpu: usize, offset: u64, value: u64) {
    machine.mmio_write(cpu, machine.gic_base() + offset, 4, value);
}

fn gic_read(machine: &Machine, cpu: usize, offset: u64) -> u64 {
    machine.mmio_read(cpu, machine.gic_base() + offset, 4)
}

/// Route GIC source `n` to (`vpe`, `pin`) and enable it
fn route_source(machine: &Machine, n: u64, vpe: u32, pin: u32) {
    gic_write(machine, 0, GIC_SH_MAP0_PIN_OFS + n * 4, (GIC_MAP_TO_PIN_MSK | pin) as u64);
    gic_write(machine, 0, GIC_SH_MAP0_VPE31_0_OFS + n * GIC_SH_MAP_VPE_STRIDE, 1 << vpe);
    gic_write(machine, 0, GIC_SH_SMASK_31_0_OFS, 1 << n);
}

/// Level of GIC output `pin` of `vpe` at the CPU
fn gic_pin(machine: &Machine, vpe: usize, pin: u32) -> bool {
    machine.lines().borrow().level(vpe, pin as usize + GIC_CPU_PIN_OFFSET)
}

/// Point VPEControl.TargTC of VPE 0 at global TC `tc`
fn target(machine: &mut Machine, tc: u64) {
    machine.cpu_mut(0).unwrap().mtc0(1, 1, tc).unwrap();
}
