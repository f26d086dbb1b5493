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

use super::super::*;
use super::{cpu64, mt_cpu};
use crate::core::timing::TIMER_PERIOD_NS;

#[test]
fn test_count_follows_clock() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;

    // Reset leaves Count at 1
    rig.clock.advance(1000);
    assert_eq!(cpu.read_count(), 101);

    cpu.store_count(500);
    rig.clock.advance(100);
    assert_eq!(cpu.read_count(), 510);
}

#[test]
fn test_count_wraps() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;

    cpu.mtc0(9, 0, 0xFFFF_FFFE).unwrap();
    rig.clock.advance(3 * TIMER_PERIOD_NS);
    assert_eq!(cpu.read_count(), 1);
}

#[test]
fn test_compare_match_raises_timer_pin() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;

    cpu.mtc0(11, 0, 50).unwrap();
    assert_eq!(cpu.count_deadline(), Some(49 * TIMER_PERIOD_NS));

    rig.clock.advance(48 * TIMER_PERIOD_NS);
    assert!(!cpu.poll_count_timer());
    assert!(!rig.lines.borrow().level(0, 7));

    rig.clock.advance(TIMER_PERIOD_NS);
    assert!(cpu.poll_count_timer());
    assert!(rig.lines.borrow().level(0, 7));
    assert_ne!(cpu.cp0().cause & cause::TI, 0);
    assert_ne!(cpu.read_cause() & (1 << (cause::IP_SHIFT + 7)), 0);

    // Re-armed for the next match a full counter wrap later
    assert_eq!(
        cpu.count_deadline(),
        Some(49 * TIMER_PERIOD_NS + u32::MAX as u64 * TIMER_PERIOD_NS)
    );
}

#[test]
fn test_compare_write_acknowledges() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;
    cpu.mtc0(11, 0, 10).unwrap();
    rig.clock.advance(1000);
    cpu.poll_count_timer();
    assert!(rig.lines.borrow().level(0, 7));

    cpu.mtc0(11, 0, 1000).unwrap();
    assert!(!rig.lines.borrow().level(0, 7));
    assert_eq!(cpu.cp0().cause & cause::TI, 0);
}

#[test]
fn test_count_read_fires_due_timer() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;
    cpu.mtc0(11, 0, 20).unwrap();

    rig.clock.advance(500);
    assert_eq!(cpu.mfc0(9, 0).unwrap(), 51);
    assert!(rig.lines.borrow().level(0, 7));
}

#[test]
fn test_timer_pin_follows_intctl() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;
    cpu.cp0_mut().intctl = 5 << intctl::IPTI_SHIFT;
    cpu.mtc0(11, 0, 2).unwrap();

    rig.clock.advance(100);
    assert!(cpu.poll_count_timer());
    assert!(rig.lines.borrow().level(0, 5));
    assert!(!rig.lines.borrow().level(0, 7));
}

#[test]
fn test_stopped_count_does_not_fire() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;
    cpu.mtc0(11, 0, 20).unwrap();
    cpu.stop_count();
    assert_eq!(cpu.count_deadline(), None);

    rig.clock.advance(1000);
    assert!(!cpu.poll_count_timer());
    assert!(!rig.lines.borrow().level(0, 7));

    cpu.start_count();
    assert!(cpu.count_deadline().is_some());
}

#[test]
fn test_timer_on_64bit_model() {
    let rig = cpu64();
    let mut cpu = rig.cpu;
    cpu.mtc0(11, 0, 2).unwrap();

    rig.clock.advance(100);
    assert!(cpu.poll_count_timer());
    assert_ne!(cpu.cp0().cause & cause::TI, 0);
}
