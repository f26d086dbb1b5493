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
use super::{cpu64, enter_user_mode, mt_cpu, rig};
use crate::core::cpu::model::MODEL_34KF;
use crate::core::error::ExceptionKind;

fn kind<T: std::fmt::Debug>(result: crate::core::error::CpuResult<T>) -> ExceptionKind {
    result.unwrap_err().kind
}

#[test]
fn test_mfc0_sign_extends() {
    let mut cpu = mt_cpu().cpu;
    assert_eq!(cpu.mfc0(15, 1).unwrap(), 0xFFFF_FFFF_8000_0000);
}

#[test]
fn test_unknown_register_is_reserved() {
    let mut cpu = mt_cpu().cpu;

    assert_eq!(kind(cpu.mfc0(22, 0)), ExceptionKind::ReservedInstruction);
    assert_eq!(kind(cpu.mtc0(5, 2, 0)), ExceptionKind::ReservedInstruction);
    assert_eq!(kind(cpu.mfc0(16, 4)), ExceptionKind::ReservedInstruction);
}

#[test]
fn test_mt_registers_need_mt_ase() {
    let mut cpu = cpu64().cpu;

    assert_eq!(kind(cpu.mfc0(0, 1)), ExceptionKind::ReservedInstruction);
    assert_eq!(kind(cpu.mtc0(2, 1, 0)), ExceptionKind::ReservedInstruction);

    let mut cpu = mt_cpu().cpu;
    assert!(cpu.mfc0(0, 1).is_ok());
}

#[test]
fn test_doubleword_access_needs_64bit() {
    let mut cpu = mt_cpu().cpu;
    assert_eq!(kind(cpu.dmfc0(12, 0)), ExceptionKind::ReservedInstruction);
    assert_eq!(kind(cpu.dmtc0(14, 0, 0)), ExceptionKind::ReservedInstruction);
    assert_eq!(kind(cpu.mfc0(20, 0)), ExceptionKind::ReservedInstruction);

    let mut cpu = cpu64().cpu;
    cpu.dmtc0(14, 0, 0x9000_0000_0000_1000).unwrap();
    assert_eq!(cpu.dmfc0(14, 0).unwrap(), 0x9000_0000_0000_1000);
    // MFC0 only sees the sign-extended low word
    assert_eq!(cpu.mfc0(14, 0).unwrap(), 0x1000);
}

#[test]
fn test_user_mode_cp0_unusable() {
    let mut cpu = mt_cpu().cpu;
    enter_user_mode(&mut cpu);

    let err = cpu.mfc0(12, 0).unwrap_err();
    assert_eq!(err.kind, ExceptionKind::CoprocessorUnusable);
    assert_eq!(err.error_code, 0);

    // CU0 grants access from user mode
    cpu.cp0_mut().status |= status::CU0;
    cpu.compute_hflags();
    assert!(cpu.mfc0(12, 0).is_ok());
}

#[test]
fn test_index_keeps_probe_bit() {
    let mut cpu = mt_cpu().cpu;
    cpu.cp0_mut().index = 0x8000_0000;

    // 16 entries: five index bits are writable
    cpu.mtc0(0, 0, 0xFFFF).unwrap();
    assert_eq!(cpu.cp0().index, 0x8000_001F);
}

#[test]
fn test_wired_and_pagegrain() {
    let mut cpu = mt_cpu().cpu;

    cpu.mtc0(6, 0, 20).unwrap();
    assert_eq!(cpu.cp0().wired, 4);

    cpu.mtc0(5, 1, 0xFFFF_FFFF).unwrap();
    assert_eq!(cpu.mfc0(5, 1).unwrap(), 0);
}

#[test]
fn test_pagemask_mask() {
    let mut cpu = mt_cpu().cpu;
    cpu.mtc0(5, 0, 0xFFFF_FFFF).unwrap();
    assert_eq!(cpu.cp0().page_mask, 0x1FFF << 13);
}

#[test]
fn test_status_write_syncs_tcstatus() {
    let mut cpu = mt_cpu().cpu;

    cpu.mtc0(12, 0, 0xFFFF_FFFF).unwrap();
    assert_eq!(cpu.cp0().status, MODEL_34KF.status_rw_bitmask);

    // CU1..CU0 and KSU=3 mirrored, Activated kept
    assert_eq!(cpu.tc(0).tcstatus, 0x3000_3800);
    assert!(cpu.hflags().contains(HFlags::FPU));
}

#[test]
fn test_tcstatus_write_syncs_status() {
    let mut cpu = mt_cpu().cpu;
    let value = tcbits::STATUS_A | (1 << tcbits::STATUS_TCU_SHIFT) | (2 << tcbits::STATUS_TKSU_SHIFT) | 0x42;

    cpu.mtc0(2, 1, value as u64).unwrap();
    assert_eq!(cpu.tc(0).tcstatus, value);

    let sr = cpu.cp0().status;
    assert_ne!(sr & status::CU0, 0);
    assert_eq!(sr & status::CU1, 0);
    assert_eq!(sr & status::KSU_MASK, 2 << status::KSU_SHIFT);
    assert_eq!(cpu.cp0().entry_hi & 0xFF, 0x42);

    // ERL from reset still forces kernel mode
    assert_eq!(cpu.hflags().privilege(), Privilege::Kernel);
}

#[test]
fn test_entryhi_asid_change_flushes() {
    let mut cpu = mt_cpu().cpu;
    let flushes = cpu.tlb().host().full_flushes();

    cpu.mtc0(10, 0, 0x0040_3FFF).unwrap();
    assert_eq!(cpu.cp0().entry_hi, 0x0040_20FF);
    assert_eq!(cpu.tc(0).tcstatus & 0xFF, 0xFF);
    assert_eq!(cpu.tlb().host().full_flushes(), flushes + 1);

    // Same ASID, new VPN2: nothing to flush
    cpu.mtc0(10, 0, 0x0080_00FF).unwrap();
    assert_eq!(cpu.tlb().host().full_flushes(), flushes + 1);
}

#[test]
fn test_cause_software_interrupts_drive_lines() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;

    cpu.mtc0(13, 0, 1 << 8).unwrap();
    assert!(rig.lines.borrow().level(0, 0));
    assert_ne!(cpu.mfc0(13, 0).unwrap() & (1 << 8), 0);

    cpu.mtc0(13, 0, 1 << 9).unwrap();
    assert!(!rig.lines.borrow().level(0, 0));
    assert!(rig.lines.borrow().level(0, 1));

    cpu.mtc0(13, 0, 0).unwrap();
    assert_eq!(rig.lines.borrow().pending(0), 0);
}

#[test]
fn test_cause_read_only_bits() {
    let mut cpu = mt_cpu().cpu;

    cpu.mtc0(13, 0, (0x7C | cause::BD | cause::TI) as u64).unwrap();
    assert_eq!(cpu.cp0().cause, 0);

    cpu.mtc0(13, 0, (cause::IV | cause::WP) as u64).unwrap();
    assert_eq!(cpu.cp0().cause, cause::IV | cause::WP);
}

#[test]
fn test_cause_dc_freezes_count() {
    let rig = mt_cpu();
    let mut cpu = rig.cpu;

    rig.clock.advance(1000);
    assert_eq!(cpu.mfc0(9, 0).unwrap(), 101);

    cpu.mtc0(13, 0, cause::DC as u64).unwrap();
    rig.clock.advance(500);
    assert_eq!(cpu.mfc0(9, 0).unwrap(), 101);
    assert_eq!(cpu.count_deadline(), None);

    cpu.mtc0(13, 0, 0).unwrap();
    rig.clock.advance(100);
    assert_eq!(cpu.mfc0(9, 0).unwrap(), 111);
    assert!(cpu.count_deadline().is_some());
}

#[test]
fn test_debug_dm_follows_hflags() {
    let mut cpu = mt_cpu().cpu;

    cpu.mtc0(23, 0, debug::DM as u64).unwrap();
    assert!(cpu.hflags().contains(HFlags::DM));
    assert_ne!(cpu.mfc0(23, 0).unwrap() as u32 & debug::DM, 0);

    cpu.mtc0(23, 0, 0).unwrap();
    assert!(!cpu.hflags().contains(HFlags::DM));
    assert_eq!(cpu.mfc0(23, 0).unwrap() as u32 & debug::DM, 0);
}

#[test]
fn test_watchhi_status_bits_write_one_to_clear() {
    let mut cpu = mt_cpu().cpu;
    cpu.cp0_mut().watch_hi[0] = 0x7;

    cpu.mtc0(19, 0, 0x2).unwrap();
    assert_eq!(cpu.cp0().watch_hi[0], 0x5);

    cpu.mtc0(19, 0, 0x0000_0FF8 | 0x5).unwrap();
    assert_eq!(cpu.cp0().watch_hi[0], 0x0000_0FF8);
}

#[test]
fn test_ebase_keeps_cpunum() {
    let mut cpu = rig(1, &MODEL_34KF).cpu;

    cpu.mtc0(15, 1, 0xFFFF_FFFF).unwrap();
    assert_eq!(cpu.cp0().ebase, 0xBFFF_F001);
}

#[test]
fn test_config0_only_k0_writable() {
    let mut cpu = mt_cpu().cpu;
    let config0 = cpu.cp0().config[0];

    cpu.mtc0(16, 0, 0xFFFF_FFFF).unwrap();
    assert_eq!(cpu.cp0().config[0], (config0 & 0x81FF_FFF8) | 0x7);

    // Config1 is read-only
    let config1 = cpu.cp0().config[1];
    cpu.mtc0(16, 1, 0).unwrap();
    assert_eq!(cpu.cp0().config[1], config1);
}

#[test]
fn test_intctl_only_vs_writable() {
    let mut cpu = mt_cpu().cpu;

    cpu.mtc0(12, 1, 0).unwrap();
    assert_eq!(cpu.cp0().intctl, 0xE000_0000);

    cpu.mtc0(12, 1, 0xFFFF_FFFF).unwrap();
    assert_eq!(cpu.cp0().intctl, 0xE000_03E0);
}

#[test]
fn test_lladdr_read() {
    let mut cpu = mt_cpu().cpu;
    cpu.set_lladdr(0x1234);

    assert_eq!(cpu.mfc0(17, 0).unwrap(), 0x1234);

    // No writable bits on this model
    cpu.mtc0(17, 0, 0xFFFF).unwrap();
    assert_eq!(cpu.lladdr(), 0x1234);
}
