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

//! GIC test modules
//!
//! - `routing`: source mapping, enable masks and pin OR-ing
//! - `registers`: register decoding, banked VPE blocks, reset values
//! - `timer`: shared counter and local compare timers

use super::*;
use crate::core::interrupt::InterruptLines;


#[cfg(test)]
mod routing;


/// Build a GIC together with its clock and interrupt lines
fn new_gic(num_cpu: usize, num_irq: usize) -> (Gic, Rc<VirtualClock>, SharedInterruptLines) {
    let clock = Rc::new(VirtualClock::new());
    let lines = InterruptLines::shared(num_cpu);
    let gic = Gic::new(GicConfig { num_cpu, num_irq }, clock.clone(), lines.clone()).unwrap();
    (gic, clock, lines)
}

/// Route source `n` to (`vpe`, `pin`) through the map registers
fn map_source(gic: &mut Gic, n: u64, vpe: u32, pin: u32) {
    gic.write(0, GIC_SH_MAP0_PIN_OFS + n * 4, 4, (GIC_MAP_TO_PIN_MSK | pin) as u64);
    gic.write(0, GIC_SH_MAP0_VPE31_0_OFS + n * GIC_SH_MAP_VPE_STRIDE, 4, 1 << vpe);
}

/// Level of GIC output `pin` of `vpe` as seen by the CPU
fn pin_level(lines: &SharedInterruptLines, vpe: usize, pin: u32) -> bool {
    lines.borrow().level(vpe, pin as usize + GIC_CPU_PIN_OFFSET)
}
