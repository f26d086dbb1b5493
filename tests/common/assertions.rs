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
//! Custom assertions for machine-level tests

use mipsmt::core::cpu::{cause, Cpu};
use mipsmt::core::error::ExceptionKind;
use mipsmt::core::system::Machine;

/// Assert the interrupt inputs of a CPU
#[allow(dead_code)]
pub fn assert_pending_lines(machine: &Machine, cpu: usize, expected: u8) {
    let actual = machine.pending_lines(cpu);
    assert_eq!(
        actual, expected,
        "CPU{} lines mismatch: expected {:08b}, got {:08b}",
        cpu, expected, actual
    );
}

/// Assert the ExcCode of the last exception taken by a CPU
#[allow(dead_code)]
pub fn assert_exc_code(cpu: &Cpu, expected: ExceptionKind) {
    let actual = (cpu.cp0().cause & cause::EXC_CODE_MASK) >> cause::EXC_CODE_SHIFT;
    assert_eq!(
        Some(actual),
        expected.code(),
        "CPU{} ExcCode mismatch: expected {:?}, got {}",
        cpu.index(),
        expected,
        actual
    );
}

/// Assert CPU PC is at expected address
#[allow(dead_code)]
pub fn assert_cpu_pc(cpu: &Cpu, expected: u64) {
    let actual = cpu.pc();
    assert_eq!(
        actual, expected,
        "CPU{} PC mismatch: expected 0x{:016X}, got 0x{:016X}",
        cpu.index(),
        expected,
        actual
    );
}
