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
//! GIC routing into the CPUs and interrupt service

use super::super::*;
use super::{gic_pin, gic_write, machine, route_source};
use crate::core::cpu::{cause, status};
use crate::core::gic::registers::*;

/// Kernel mode, interrupts enabled for IM bit `ip` only
fn enable_interrupt(machine: &mut Machine, cpu: usize, ip: u32) {
    let value = status::IE | (1 << (status::IM_SHIFT + ip));
    machine.cpu_mut(cpu).unwrap().mtc0(12, 0, value as u64).unwrap();
}

fn exc_code(cpu: &Cpu) -> u32 {
    (cpu.cp0().cause & cause::EXC_CODE_MASK) >> cause::EXC_CODE_SHIFT
}

#[test]
fn test_shared_pin_end_to_end() {
    let machine = Machine::new(&MachineConfig {
        cpus: 2,
        num_irq: 4,
        ..Default::default()
    })
    .unwrap();
    route_source(&machine, 0, 0, 2);
    route_source(&machine, 1, 0, 2);

    machine.set_irq(0, true);
    assert!(gic_pin(&machine, 0, 2));

    machine.set_irq(1, true);
    assert!(gic_pin(&machine, 0, 2));

    // Source 1 still holds the pin
    machine.set_irq(0, false);
    assert!(gic_pin(&machine, 0, 2));
    assert_ne!(machine.cpu(0).unwrap().read_cause() & (1 << 12), 0);

    machine.set_irq(1, false);
    assert!(!gic_pin(&machine, 0, 2));
    assert_eq!(machine.cpu(0).unwrap().read_cause() & cause::IP_MASK, 0);
    assert_eq!(machine.pending_lines(1), 0);
}

#[test]
fn test_sources_reach_their_vpe_only() {
    let machine = machine(2);
    route_source(&machine, 2, 1, 0);

    machine.set_irq(2, true);
    assert!(gic_pin(&machine, 1, 0));
    assert_eq!(machine.pending_lines(0), 0);
    assert_eq!(machine.pending_lines(1), 1 << 2);
}

#[test]
fn test_wedge_register_drives_source() {
    let machine = machine(1);
    route_source(&machine, 3, 0, 1);

    gic_write(&machine, 0, GIC_SH_WEDGE_OFS, (1 << 31) | 3);
    assert!(machine.gic().borrow().source(3).unwrap().pending);
    assert!(gic_pin(&machine, 0, 1));

    gic_write(&machine, 0, GIC_SH_WEDGE_OFS, 3);
    assert!(!gic_pin(&machine, 0, 1));
}

#[test]
fn test_service_delivers_interrupt() {
    let mut machine = machine(2);
    route_source(&machine, 0, 0, 2);
    // GIC pin 2 is CPU input 4
    enable_interrupt(&mut machine, 0, 4);

    assert_eq!(machine.service_interrupts(), 0);

    machine.set_irq(0, true);
    assert_eq!(machine.service_interrupts(), 1);

    let cpu = machine.cpu(0).unwrap();
    assert_eq!(exc_code(cpu), 0);
    assert_ne!(cpu.cp0().status & status::EXL, 0);
    assert_eq!(cpu.cp0().epc, 0xFFFF_FFFF_BFC0_0000);
    assert_eq!(cpu.pc(), 0xFFFF_FFFF_8000_0180);

    // EXL now blocks further delivery
    assert_eq!(machine.service_interrupts(), 0);
}

#[test]
fn test_masked_interrupt_is_not_taken() {
    let mut machine = machine(1);
    route_source(&machine, 0, 0, 3);
    enable_interrupt(&mut machine, 0, 4);

    machine.set_irq(0, true);
    assert!(gic_pin(&machine, 0, 3));
    assert_eq!(machine.service_interrupts(), 0);
}

#[test]
fn test_interrupt_wakes_waiting_cpu() {
    let mut machine = machine(1);
    route_source(&machine, 0, 0, 0);
    enable_interrupt(&mut machine, 0, 2);

    let halt = machine.cpu_mut(0).unwrap().wait();
    assert_eq!(halt.unwrap_err().kind, ExceptionKind::Halt);
    assert!(machine.cpu(0).unwrap().is_halted());

    assert_eq!(machine.service_interrupts(), 0);
    assert!(machine.cpu(0).unwrap().is_halted());

    machine.set_irq(0, true);
    assert_eq!(machine.service_interrupts(), 1);
    let cpu = machine.cpu(0).unwrap();
    assert!(!cpu.is_halted());
    assert_eq!(exc_code(cpu), 0);
}

#[test]
fn test_software_interrupt_through_cause() {
    let mut machine = machine(1);
    enable_interrupt(&mut machine, 0, 1);

    machine.cpu_mut(0).unwrap().mtc0(13, 0, 1 << 9).unwrap();
    assert_eq!(machine.pending_lines(0), 0b10);
    assert_eq!(machine.service_interrupts(), 1);
}
