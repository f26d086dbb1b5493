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
use super::{map_source, new_gic, pin_level};
use proptest::prelude::*;

#[test]
fn test_shared_pin_scenario() {
    let (mut gic, _clock, lines) = new_gic(2, 4);

    map_source(&mut gic, 0, 0, 2);
    map_source(&mut gic, 1, 0, 2);
    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 0b11);

    gic.set_irq(0, true);
    assert!(pin_level(&lines, 0, 2));

    gic.set_irq(1, true);
    assert!(pin_level(&lines, 0, 2));

    // Source 1 still holds the pin
    gic.set_irq(0, false);
    assert!(pin_level(&lines, 0, 2));

    gic.set_irq(1, false);
    assert!(!pin_level(&lines, 0, 2));

    // The other VPE never saw anything
    assert_eq!(lines.borrow().pending(1), 0);
}

#[test]
fn test_disabled_sibling_does_not_hold_pin() {
    let (mut gic, _clock, lines) = new_gic(1, 8);

    map_source(&mut gic, 0, 0, 1);
    map_source(&mut gic, 1, 0, 1);
    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 0b01);

    gic.set_irq(1, true);
    assert!(!pin_level(&lines, 0, 1));
    assert!(gic.source(1).unwrap().pending);

    gic.set_irq(0, true);
    gic.set_irq(0, false);
    assert!(!pin_level(&lines, 0, 1));
}

#[test]
fn test_enable_mask_recomputes_pin() {
    let (mut gic, _clock, lines) = new_gic(1, 8);
    map_source(&mut gic, 4, 0, 3);

    gic.set_irq(4, true);
    assert!(!pin_level(&lines, 0, 3));

    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 1 << 4);
    assert!(pin_level(&lines, 0, 3));

    gic.write(0, GIC_SH_RMASK_31_0_OFS, 4, 1 << 4);
    assert!(!pin_level(&lines, 0, 3));
    assert!(!gic.source(4).unwrap().enabled);
}

#[test]
fn test_unmapped_source_only_latches_pending() {
    let (mut gic, _clock, lines) = new_gic(2, 8);
    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 0xFF);

    gic.set_irq(5, true);
    assert!(gic.source(5).unwrap().pending);
    assert_eq!(lines.borrow().pending(0), 0);
    assert_eq!(lines.borrow().pending(1), 0);
}

#[test]
fn test_source_mapped_to_missing_vpe_is_ignored() {
    let (mut gic, _clock, lines) = new_gic(2, 8);
    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 0xFF);
    map_source(&mut gic, 2, 7, 0);

    assert_eq!(gic.source(2).unwrap().map_vpe, Some(7));
    gic.set_irq(2, true);
    assert_eq!(lines.borrow().pending(0), 0);
    assert_eq!(lines.borrow().pending(1), 0);
}

#[test]
fn test_remap_moves_asserted_level() {
    let (mut gic, _clock, lines) = new_gic(2, 8);
    map_source(&mut gic, 0, 0, 0);
    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 1);
    gic.set_irq(0, true);
    assert!(pin_level(&lines, 0, 0));

    gic.write(0, GIC_SH_MAP0_VPE31_0_OFS, 4, 1 << 1);
    assert!(!pin_level(&lines, 0, 0));
    assert!(pin_level(&lines, 1, 0));
}

#[test]
fn test_wedge_drives_source() {
    let (mut gic, _clock, lines) = new_gic(1, 16);
    map_source(&mut gic, 9, 0, 4);
    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 1 << 9);

    gic.write(0, GIC_SH_WEDGE_OFS, 4, GIC_SH_WEDGE_RW_MSK | 9);
    assert!(pin_level(&lines, 0, 4));
    assert_eq!(gic.read(0, GIC_SH_PEND_31_0_OFS, 4), 1 << 9);

    gic.write(0, GIC_SH_WEDGE_OFS, 4, 9);
    assert!(!pin_level(&lines, 0, 4));
    assert_eq!(gic.read(0, GIC_SH_PEND_31_0_OFS, 4), 0);

    // Out of range source index
    gic.write(0, GIC_SH_WEDGE_OFS, 4, GIC_SH_WEDGE_RW_MSK | 200);
    assert_eq!(lines.borrow().pending(0), 0);
}

#[test]
fn test_compare_pending_holds_shared_pin() {
    let (mut gic, _clock, lines) = new_gic(1, 8);

    // Compare interrupt and source 0 share pin 5
    map_source(&mut gic, 0, 0, GIC_DEFAULT_LOCAL_PIN);
    gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 1);
    gic.write(0, GIC_VPELOCAL_BASE_ADDR + GIC_VPE_SMASK_OFS, 4, GIC_VPE_MASK_CMP_MSK as u64);

    gic.set_irq(0, true);
    gic.fire_vpe_timer(0);
    assert_ne!(gic.vpe(0).unwrap().pend & GIC_VPE_MASK_CMP_MSK, 0);

    gic.set_irq(0, false);
    assert!(pin_level(&lines, 0, GIC_DEFAULT_LOCAL_PIN));

    // Acknowledging the compare interrupt drops the pin
    gic.write(0, GIC_VPELOCAL_BASE_ADDR + GIC_VPE_COMPARE_LO_OFS, 4, 0x1000);
    assert!(!pin_level(&lines, 0, GIC_DEFAULT_LOCAL_PIN));
}

proptest! {
    #[test]
    fn prop_pin_level_is_or_of_enabled_sources(
        enabled in prop::collection::vec(any::<bool>(), 6),
        events in prop::collection::vec((0usize..6, any::<bool>()), 1..40),
    ) {
        let (mut gic, _clock, lines) = new_gic(1, 8);
        for n in 0..6 {
            map_source(&mut gic, n, 0, 2);
        }
        let mask = enabled
            .iter()
            .enumerate()
            .fold(0u64, |acc, (n, &on)| if on { acc | 1 << n } else { acc });
        gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, mask);

        for (n, level) in events {
            gic.set_irq(n, level);

            let expected = (0..6).any(|i| {
                let source = gic.source(i).unwrap();
                source.enabled && source.pending
            });
            prop_assert_eq!(pin_level(&lines, 0, 2), expected);
        }
    }
}
