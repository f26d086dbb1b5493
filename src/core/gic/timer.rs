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

//! Shared counter and per-VPE compare timers

use super::registers::*;
use super::Gic;
use crate::core::timing::{compare_deadline, ticks_at, Nanoseconds};

impl Gic {
    #[inline]
    fn counter_stopped(&self) -> bool {
        self.sh_config & GIC_SH_CONFIG_COUNTSTOP_MSK != 0
    }

    /// Current value of the shared counter
    ///
    /// While the counter runs, any local timer whose deadline has already
    /// passed is fired first, so compare state observed after this call is
    /// never behind the counter value returned.
    pub fn get_shared_count(&mut self) -> u32 {
        if self.counter_stopped() {
            return self.sh_counterlo;
        }

        let now = self.clock.now_ns();
        for vp in 0..self.num_cpu {
            if self.vps[vp].timer.take_expired(now) {
                self.fire_vpe_timer(vp);
            }
        }
        self.sh_counterlo.wrapping_add(ticks_at(now))
    }

    /// Set the shared counter to `count`
    ///
    /// A running counter is rebased against the clock and every local timer
    /// is rescheduled for the new count.
    pub fn store_shared_count(&mut self, count: u32) {
        if self.counter_stopped() {
            self.sh_counterlo = count;
        } else {
            self.sh_counterlo = count.wrapping_sub(self.clock.ticks());
            for vp in 0..self.num_cpu {
                self.vpe_timer_update(vp);
            }
        }
    }

    /// Program COMPARE_LO of VPE `vp`
    ///
    /// Acknowledges the local compare interrupt and lowers its pin unless
    /// another source still holds it.
    pub fn store_vpe_compare(&mut self, vp: usize, compare: u64) {
        self.vps[vp].comparelo = compare as u32;
        self.vpe_timer_update(vp);

        self.vps[vp].pend &= !GIC_VPE_MASK_CMP_MSK;
        let compare_map = self.vps[vp].compare_map;
        if compare_map & GIC_MAP_TO_PIN_MSK != 0 {
            self.set_vp_irq(vp, compare_map & GIC_MAP_MSK, false);
        }
    }

    /// Reschedule the local timer of `vp` for its next compare match
    ///
    /// Returns the number of counter ticks until the match. A stopped
    /// counter never reaches the compare value, so the timer is disarmed.
    fn vpe_timer_update(&mut self, vp: usize) -> u32 {
        if self.counter_stopped() {
            self.vps[vp].timer.delete();
            return 0;
        }

        let now = self.clock.now_ns();
        let (next, wait) = compare_deadline(now, self.vps[vp].comparelo, self.sh_counterlo);

        log::trace!(
            "GIC timer scheduled, now = {:#x}, next = {:#x} (wait = {})",
            now,
            next,
            wait
        );

        self.vps[vp].timer.modify(next);
        wait
    }

    fn vpe_timer_expire(&mut self, vp: usize) {
        let pin = self.vps[vp].compare_map & GIC_MAP_MSK;
        log::debug!("GIC timer expire => VPE[{}] irq {}", vp, pin);

        self.vpe_timer_update(vp);
        self.vps[vp].pend |= GIC_VPE_MASK_CMP_MSK;

        if self.vps[vp].compare_asserted() {
            if self.vps[vp].compare_map & GIC_MAP_TO_PIN_MSK != 0 {
                self.set_vp_irq(vp, pin, true);
            } else {
                log::debug!("GIC VPE[{}] compare interrupt disabled", vp);
            }
        } else {
            log::debug!("GIC VPE[{}] compare interrupt masked off", vp);
        }
    }

    /// Expiry callback of the local timer of `vp`
    ///
    /// The counter is bumped across the expiry so that the reschedule
    /// computed inside it lands one full wrap ahead instead of now.
    pub(crate) fn fire_vpe_timer(&mut self, vp: usize) {
        self.sh_counterlo = self.sh_counterlo.wrapping_add(1);
        self.vpe_timer_expire(vp);
        self.sh_counterlo = self.sh_counterlo.wrapping_sub(1);
    }

    fn start_count(&mut self) {
        log::debug!("GIC shared counter started at {:#x}", self.sh_counterlo);
        self.store_shared_count(self.sh_counterlo);
    }

    fn stop_count(&mut self) {
        self.sh_counterlo = self.sh_counterlo.wrapping_add(self.clock.ticks());
        for vp in self.vps.iter_mut() {
            vp.timer.delete();
        }
        log::debug!("GIC shared counter stopped at {:#x}", self.sh_counterlo);
    }

    /// Apply a write to SH_CONFIG; only COUNTSTOP is writable
    pub(super) fn write_sh_config(&mut self, data: u64) {
        let pre = self.sh_config;
        self.sh_config = (self.sh_config & !GIC_SH_CONFIG_COUNTSTOP_MSK)
            | (data as u32 & GIC_SH_CONFIG_COUNTSTOP_MSK);

        if pre != self.sh_config {
            if self.counter_stopped() {
                self.stop_count();
            } else {
                self.start_count();
            }
        }
    }

    /// Fire every local timer that is due at the current time
    ///
    /// Returns the number of timers fired.
    pub fn poll_timers(&mut self) -> usize {
        let now = self.clock.now_ns();
        let mut fired = 0;
        for vp in 0..self.num_cpu {
            if self.vps[vp].timer.take_expired(now) {
                self.fire_vpe_timer(vp);
                fired += 1;
            }
        }
        fired
    }

    /// Earliest armed local timer deadline
    pub fn next_deadline(&self) -> Option<Nanoseconds> {
        self.vps.iter().filter_map(|vp| vp.timer.deadline()).min()
    }
}
