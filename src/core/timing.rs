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

//! Virtual Clock and Local Timers
//!
//! All timed hardware in the core (the GIC per-VPE compare timers and the
//! CP0 Count/Compare timer of every CPU) runs off one monotonic nanosecond
//! clock. Nothing is scheduled behind the caller's back: every timer is a
//! plain deadline that its owner polls, either when the machine advances
//! the clock or when a register read needs an up-to-date value.
//!
//! # Counter Model
//!
//! Both counters tick at 100 MHz, i.e. once every [`TIMER_PERIOD_NS`]
//! nanoseconds. A counter is stored as a base value plus the elapsed tick
//! count, so reading it never requires touching the timers.
//!
//! # Example
//!
//! ```
//! use mipsmt::core::timing::{LocalTimer, VirtualClock};
//!
//! let clock = VirtualClock::new();
//! let mut timer = LocalTimer::new();
//! timer.modify(500);
//!
//! clock.advance(499);
//! assert!(!timer.take_expired(clock.now_ns()));
//!
//! clock.advance(1);
//! assert!(timer.take_expired(clock.now_ns()));
//! assert!(!timer.is_pending());
//! ```

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Absolute virtual time in nanoseconds since machine creation
pub type Nanoseconds = u64;

/// Counter period in nanoseconds (100 MHz)
pub const TIMER_PERIOD_NS: Nanoseconds = 10;

/// Monotonic virtual clock
///
/// Shared between the machine, the GIC and every CPU through an `Rc`.
/// Interior mutability keeps readers free of `RefCell` borrows.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Cell<Nanoseconds>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in nanoseconds
    #[inline(always)]
    pub fn now_ns(&self) -> Nanoseconds {
        self.now.get()
    }

    /// Elapsed 100 MHz ticks, truncated to the 32-bit counter width
    #[inline(always)]
    pub fn ticks(&self) -> u32 {
        ticks_at(self.now.get())
    }

    /// Move the clock forward by `ns` nanoseconds
    pub fn advance(&self, ns: Nanoseconds) {
        self.now.set(self.now.get().saturating_add(ns));
    }

    /// Move the clock to an absolute time
    ///
    /// Requests to go backwards are ignored; the clock never rewinds.
    pub fn advance_to(&self, ns: Nanoseconds) {
        if ns > self.now.get() {
            self.now.set(ns);
        }
    }

    /// Restore the clock from a snapshot
    pub(crate) fn restore(&self, ns: Nanoseconds) {
        self.now.set(ns);
    }
}

/// Tick count at an absolute time, truncated to 32 bits
#[inline(always)]
pub fn ticks_at(now: Nanoseconds) -> u32 {
    (now / TIMER_PERIOD_NS) as u32
}

/// Compute when a free-running counter next equals `compare`
///
/// The counter value at `now` is `base + now / TIMER_PERIOD_NS`. Wrapping
/// arithmetic makes a compare value that has just passed fire again after a
/// full 32-bit wrap.
///
/// # Returns
///
/// `(deadline, wait)` where `wait` is the number of ticks until the match
/// and `deadline` the absolute time of the match.
///
/// # Example
///
/// ```
/// use mipsmt::core::timing::compare_deadline;
///
/// // Counter at 100 after 0ns, compare 150: match 50 ticks (500ns) later
/// assert_eq!(compare_deadline(0, 150, 100), (500, 50));
/// ```
pub fn compare_deadline(now: Nanoseconds, compare: u32, base: u32) -> (Nanoseconds, u32) {
    let wait = compare.wrapping_sub(base).wrapping_sub(ticks_at(now));
    (now + wait as u64 * TIMER_PERIOD_NS, wait)
}

/// A single-shot deadline owned by one device
///
/// The owner arms it with [`LocalTimer::modify`] and polls it with
/// [`LocalTimer::take_expired`]. A fired timer stays idle until re-armed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTimer {
    deadline: Option<Nanoseconds>,
}

impl LocalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer for an absolute deadline
    pub fn modify(&mut self, deadline: Nanoseconds) {
        self.deadline = Some(deadline);
    }

    /// Disarm the timer
    pub fn delete(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Nanoseconds> {
        self.deadline
    }

    /// Whether the timer is armed and its deadline has been reached
    pub fn is_expired(&self, now: Nanoseconds) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    /// Disarm and report the timer if it has expired
    ///
    /// The owner runs its expiry callback when this returns `true`; the
    /// callback is expected to re-arm the timer if it repeats.
    pub fn take_expired(&mut self, now: Nanoseconds) -> bool {
        if self.is_expired(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}
