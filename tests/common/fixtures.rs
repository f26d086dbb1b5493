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
//! Test fixtures for common test scenarios

use mipsmt::core::config::MachineConfig;
use mipsmt::core::cpu::{status, tcbits, vpe};
use mipsmt::core::gic::registers::*;
use mipsmt::core::system::Machine;

/// Create a 34Kf machine with `cpus` VPEs and eight shared sources
#[allow(dead_code)]
pub fn create_machine(cpus: usize) -> Machine {
    Machine::new(&MachineConfig {
        cpus,
        num_irq: 8,
        ..Default::default()
    })
    .expect("Failed to create machine")
}

/// Create a machine for a named CPU model
#[allow(dead_code)]
pub fn create_machine_with_model(model: &str, cpus: usize) -> Machine {
    Machine::new(&MachineConfig {
        cpus,
        cpu_model: model.to_string(),
        num_irq: 8,
        ..Default::default()
    })
    .expect("Failed to create machine")
}

#[allow(dead_code)]
pub fn gic_write(machine: &Machine, cpu: usize, offset: u64, value: u64) {
    machine.mmio_write(cpu, machine.gic_base() + offset, 4, value);
}

#[allow(dead_code)]
pub fn gic_read(machine: &Machine, cpu: usize, offset: u64) -> u64 {
    machine.mmio_read(cpu, machine.gic_base() + offset, 4)
}

/// Route shared source `n` (below 32) to GIC pin `pin` of `vpe` and enable it
#[allow(dead_code)]
pub fn route_source(machine: &Machine, n: u64, vpe: u32, pin: u32) {
    gic_write(machine, 0, GIC_SH_MAP0_PIN_OFS + n * 4, (GIC_MAP_TO_PIN_MSK | pin) as u64);
    gic_write(machine, 0, GIC_SH_MAP0_VPE31_0_OFS + n * GIC_SH_MAP_VPE_STRIDE, 1 << vpe);
    gic_write(machine, 0, GIC_SH_SMASK_31_0_OFS, 1 << n);
}

/// Start VPE `target` from VPE 0 through MTTC0, then let it run
#[allow(dead_code)]
pub fn bring_up_vpe(machine: &mut Machine, target: usize) {
    let tc = (target * machine.cpu(0).unwrap().nr_threads()) as u64;
    machine.dvpe(0).expect("DVPE failed");
    machine.cpu_mut(0).unwrap().mtc0(1, 1, tc).expect("TargTC write failed");
    machine.mttc0_vpeconf0(0, vpe::CONF0_VPA as u64).unwrap();
    machine.mttc0_tcstatus(0, tcbits::STATUS_A as u64).unwrap();
    machine.mttc0_tchalt(0, 0).unwrap();
    machine.evpe(0).expect("EVPE failed");
    machine.service_interrupts();
}

/// Kernel mode with interrupts enabled for CPU input `ip` only
#[allow(dead_code)]
pub fn enable_interrupt(machine: &mut Machine, cpu: usize, ip: u32) {
    let value = status::IE | (1 << (status::IM_SHIFT + ip));
    machine
        .cpu_mut(cpu)
        .unwrap()
        .mtc0(12, 0, value as u64)
        .expect("Status write failed");
}
