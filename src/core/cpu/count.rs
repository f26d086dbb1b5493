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

//! CP0 Count/Compare timer
//!
//! Count runs at the virtual clock's 100 MHz counter rate. It is stored as
//! a base value: the live count is `cp0.count + ticks(now)` unless
//! Cause.DC has stopped it, in which case `cp0.count` is the value itself.
//! A [`LocalTimer`](crate::core::timing::LocalTimer) is armed for the next
//! Count == Compare match and polled by the machine.

use super::{cause, intctl, Cpu, IsaFlags};
use crate::core::timing::{compare_deadline, ticks_at, Nanoseconds};

impl Cpu {
    fn count_stopped(&self) -> bool {
        self.cp0.cause & cause::DC != 0
    }

    /// Interrupt line driven by the timer (IntCtl.IPTI)
    fn timer_pin(&self) -> usize {
        ((self.cp0.intctl >> intctl::IPTI_SHIFT) & 0x7) as usize
    }

    pub(in crate::core::cpu) fn is_r2(&self) -> bool {
        self.model.isa.contains(IsaFlags::MIPS32R2)
    }

    /// Re-arm the timer for the next Count == Compare match
    fn count_timer_update(&mut self) {
        let now = self.clock.now_ns();
        let (deadline, _) = compare_deadline(now, self.cp0.compare, self.cp0.count);
        self.count_timer.modify(deadline);
    }

    /// Compare match: schedule the next one and raise the timer interrupt
    fn count_timer_expire(&mut self) {
        self.count_timer_update();
        if self.is_r2() {
            self.cp0.cause |= cause::TI;
        }
        let pin = self.timer_pin();
        log::debug!("CPU{}: Count/Compare match, raising IP{}", self.index, pin);
        self.lines.borrow_mut().set_timer_level(self.index, pin, true);
    }

    /// Timer expiry
    ///
    /// The count is biased by one while rescheduling so the match that just
    /// happened is not found again immediately.
    fn count_timer_callback(&mut self) {
        if self.count_stopped() {
            return;
        }
        self.cp0.count = self.cp0.count.wrapping_add(1);
        self.count_timer_expire();
        self.cp0.count = self.cp0.count.wrapping_sub(1);
    }

    /// Current Count value
    pub fn read_count(&mut self) -> u32 {
        if self.count_stopped() {
            return self.cp0.count;
        }

        let now = self.clock.now_ns();
        if self.count_timer.take_expired(now) {
            self.count_timer_callback();
        }
        self.cp0.count.wrapping_add(ticks_at(now))
    }

    /// Set Count
    pub fn store_count(&mut self, value: u32) {
        if self.count_stopped() {
            self.cp0.count = value;
        } else {
            self.cp0.count = value.wrapping_sub(self.clock.ticks());
            self.count_timer_update();
        }
    }

    /// Set Compare, acknowledging the timer interrupt
    pub fn store_compare(&mut self, value: u32) {
        self.cp0.compare = value;
        if !self.count_stopped() {
            self.count_timer_update();
        }
        if self.is_r2() {
            self.cp0.cause &= !cause::TI;
        }
        let pin = self.timer_pin();
        self.lines.borrow_mut().set_timer_level(self.index, pin, false);
    }

    /// Restart a stopped counter from its frozen value
    pub fn start_count(&mut self) {
        self.store_count(self.cp0.count);
    }

    /// Freeze the counter at its current value
    pub fn stop_count(&mut self) {
        self.cp0.count = self.cp0.count.wrapping_add(self.clock.ticks());
        self.count_timer.delete();
    }

    /// Deadline of the next Count == Compare match, if armed
    pub fn count_deadline(&self) -> Option<Nanoseconds> {
        self.count_timer.deadline()
    }

    /// Fire the Count/Compare timer if it is due
    ///
    /// Returns whether it fired.
    pub fn poll_count_timer(&mut self) -> bool {
        let now = self.clock.now_ns();
        if self.count_timer.take_expired(now) {
            self.count_timer_callback();
            true
        } else {
            false
        }
    }
}
