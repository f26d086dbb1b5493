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

//! CPU test modules
//!
//! - `basic`: reset state, register files and thread context switching
//! - `cop0`: CP0 register masks and write side effects
//! - `mt`: VPE/TC control registers, Status/TCStatus aliasing and YIELD
//! - `tlb`: TLB instructions, address translation and shadow entries
//! - `exceptions`: exception entry, vectors and return instructions
//! - `count`: Count/Compare timer

use super::model::{MODEL_34KF, MODEL_MIPS64R2_GENERIC};
use super::*;
use crate::core::interrupt::{InterruptLines, SharedInterruptLines};
use crate::core::timing::VirtualClock;
use std::rc::Rc;


#[cfg(test)]
mod cop0;

#[cfg(test)]
mod count;




/// A CPU together with the clock and interrupt lines it is wired to
struct Rig {
    cpu: Cpu,
    clock: Rc<VirtualClock>,
    lines: SharedInterruptLines,
}

/// Build CPU `index` of a two-VPE machine with two TCs per VPE
fn rig(index: usize, model: &'static CpuModel) -> Rig {
    let clock = Rc::new(VirtualClock::new());
    let lines = InterruptLines::shared(2);
    let cpu = Cpu::new(index, model, 2, 2, clock.clone(), lines.clone(), 1).unwrap();
    Rig { cpu, clock, lines }
}

/// VPE 0 of a 34Kf
fn mt_cpu() -> Rig {
    rig(0, &MODEL_34KF)
}

/// A 64-bit CPU without the MT ASE
fn cpu64() -> Rig {
    rig(0, &MODEL_MIPS64R2_GENERIC)
}

/// Drop to user mode with EXL and ERL clear
fn enter_user_mode(cpu: &mut Cpu) {
    cpu.cp0_mut().status = 2 << status::KSU_SHIFT;
    cpu.compute_hflags();
}
