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

//! CPU Interrupt Line Fabric
//!
//! Every CPU has eight level-sensitive interrupt inputs which appear in
//! Cause.IP7..IP0. The fabric holds the current level of each input and is
//! shared by everything that drives them: the GIC, the CP0 Count/Compare
//! timer and the Cause software-interrupt bits.
//!
//! ## Pin Assignment
//!
//! ```text
//! Pin | Cause bit | Driven by
//! ----|-----------|------------------------------------------
//! 0   | IP0       | Cause software interrupt 0 (mtc0 Cause)
//! 1   | IP1       | Cause software interrupt 1 (mtc0 Cause)
//! 2-7 | IP2-IP7   | GIC output pins 0-5
//! any | IntCtl.IPTI | CP0 Count/Compare timer
//! ```
//!
//! The timer may share a pin with a GIC output (IPTI 7 is GIC pin 5 on the
//! 34K family). Its level is held apart and OR'd in, so acknowledging the
//! timer never drops a GIC interrupt on the same pin and vice versa.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Pin numbering constants
pub mod pins {
    /// Software interrupt 0 (Cause.IP0)
    pub const SW0: usize = 0;

    /// Software interrupt 1 (Cause.IP1)
    pub const SW1: usize = 1;

    /// First CPU input driven by the GIC
    pub const GIC_BASE: usize = 2;

    /// Number of CPU interrupt inputs
    pub const COUNT: usize = 8;
}

/// Handle to the fabric shared by the GIC and the CPUs
pub type SharedInterruptLines = Rc<RefCell<InterruptLines>>;

/// Interrupt input levels of every CPU in the machine
///
/// # Example
///
/// ```
/// use mipsmt::core::interrupt::InterruptLines;
///
/// let mut lines = InterruptLines::new(2);
/// lines.raise(1, 4);
/// assert!(lines.level(1, 4));
/// assert_eq!(lines.pending(1), 1 << 4);
/// assert_eq!(lines.pending(0), 0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterruptLines {
    levels: Vec<u8>,
    /// Count/Compare timer contribution
    #[serde(default)]
    timer: Vec<u8>,
}

impl InterruptLines {
    /// Create a fabric for `num_cpu` CPUs with every input low
    pub fn new(num_cpu: usize) -> Self {
        Self {
            levels: vec![0; num_cpu],
            timer: vec![0; num_cpu],
        }
    }

    /// Wrap a new fabric for sharing
    pub fn shared(num_cpu: usize) -> SharedInterruptLines {
        Rc::new(RefCell::new(Self::new(num_cpu)))
    }

    /// Number of CPUs attached to the fabric
    pub fn num_cpus(&self) -> usize {
        self.levels.len()
    }

    /// Drive one CPU input to `level`
    ///
    /// Requests for a CPU or pin that does not exist are logged and ignored.
    pub fn set_level(&mut self, cpu: usize, pin: usize, level: bool) {
        if Self::drive(&mut self.levels, cpu, pin, level) {
            log::trace!(
                "CPU{} IP{} -> {} (lines=0x{:02X})",
                cpu,
                pin,
                level,
                self.pending(cpu)
            );
        }
    }

    /// Drive the Count/Compare timer's contribution to one CPU input
    pub fn set_timer_level(&mut self, cpu: usize, pin: usize, level: bool) {
        // Deserialized fabrics may carry no timer layer
        if self.timer.len() < self.levels.len() {
            self.timer.resize(self.levels.len(), 0);
        }
        if Self::drive(&mut self.timer, cpu, pin, level) {
            log::trace!(
                "CPU{} timer IP{} -> {} (lines=0x{:02X})",
                cpu,
                pin,
                level,
                self.pending(cpu)
            );
        }
    }

    /// Update one bit of `masks`; returns whether it changed
    fn drive(masks: &mut [u8], cpu: usize, pin: usize, level: bool) -> bool {
        if pin >= pins::COUNT {
            log::warn!("IRQ line for unknown pin {} on CPU {}", pin, cpu);
            return false;
        }
        let Some(mask) = masks.get_mut(cpu) else {
            log::warn!("IRQ line for unknown CPU {} (pin {})", cpu, pin);
            return false;
        };

        let old = *mask;
        if level {
            *mask |= 1 << pin;
        } else {
            *mask &= !(1 << pin);
        }
        old != *mask
    }

    pub fn raise(&mut self, cpu: usize, pin: usize) {
        self.set_level(cpu, pin, true);
    }

    pub fn lower(&mut self, cpu: usize, pin: usize) {
        self.set_level(cpu, pin, false);
    }

    /// Current level of one CPU input
    pub fn level(&self, cpu: usize, pin: usize) -> bool {
        pin < pins::COUNT && self.pending(cpu) & (1 << pin) != 0
    }

    /// All eight input levels of a CPU, bit n = pin n
    pub fn pending(&self, cpu: usize) -> u8 {
        let level = self.levels.get(cpu).copied().unwrap_or(0);
        level | self.timer.get(cpu).copied().unwrap_or(0)
    }

    /// Drop every input to low
    pub fn reset(&mut self) {
        self.levels.iter_mut().for_each(|mask| *mask = 0);
        self.timer.iter_mut().for_each(|mask| *mask = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_and_lower() {
        let mut lines = InterruptLines::new(2);

        lines.raise(0, pins::GIC_BASE);
        assert!(lines.level(0, 2));
        assert_eq!(lines.pending(0), 0b100);

        lines.lower(0, pins::GIC_BASE);
        assert!(!lines.level(0, 2));
        assert_eq!(lines.pending(0), 0);
    }

    #[test]
    fn test_lines_are_per_cpu() {
        let mut lines = InterruptLines::new(2);

        lines.raise(1, pins::SW0);
        assert_eq!(lines.pending(0), 0);
        assert_eq!(lines.pending(1), 1);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut lines = InterruptLines::new(1);

        lines.raise(3, 2);
        lines.raise(0, 8);
        assert_eq!(lines.pending(0), 0);
        assert_eq!(lines.pending(3), 0);
        assert!(!lines.level(0, 8));
    }

    #[test]
    fn test_timer_shares_pin_with_gic() {
        let mut lines = InterruptLines::new(1);

        lines.raise(0, 7);
        lines.set_timer_level(0, 7, true);
        lines.set_timer_level(0, 7, false);
        assert!(lines.level(0, 7));

        lines.set_timer_level(0, 7, true);
        lines.lower(0, 7);
        assert!(lines.level(0, 7));

        lines.set_timer_level(0, 7, false);
        assert_eq!(lines.pending(0), 0);
    }

    #[test]
    fn test_reset_clears_all() {
        let mut lines = InterruptLines::new(2);
        lines.raise(0, 7);
        lines.raise(1, 3);
        lines.set_timer_level(1, 7, true);

        lines.reset();
        assert_eq!(lines.pending(0), 0);
        assert_eq!(lines.pending(1), 0);
    }
}
