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

//! GIC register map
//!
//! Byte offsets within the 128KB GIC window, and the bit layouts of the
//! registers the controller decodes.
//!
//! ```text
//! 0x00000 - 0x07FFF   Shared block (config, counter, per-source state)
//! 0x08000 - 0x0B000   VPE-local block (requesting VPE)
//! 0x0C000 - 0x0F000   VPE-other block (VPE selected by OTHER_ADDR)
//! 0x10000 - 0x1FFFF   User-mode visible block (counter mirror)
//! ```

/// Maximum number of VPEs a GIC can serve
pub const GIC_MAX_VPS: usize = 16;

/// Maximum number of interrupt sources
pub const GIC_MAX_INTRS: usize = 256;

/// Size of the register window
pub const GIC_ADDRSPACE_SZ: u64 = 128 * 1024;

/// GIC output pin n drives CPU interrupt input n + 2
pub const GIC_CPU_PIN_OFFSET: usize = 2;

// Shared block
pub const GIC_SH_CONFIG_OFS: u64 = 0x0000;
pub const GIC_SH_COUNTERLO_OFS: u64 = 0x0010;
pub const GIC_SH_COUNTERHI_OFS: u64 = 0x0014;

pub const GIC_SH_POL_31_0_OFS: u64 = 0x0100;
pub const GIC_SH_POL_255_224_OFS: u64 = 0x011C;

pub const GIC_SH_TRIG_31_0_OFS: u64 = 0x0180;
pub const GIC_SH_TRIG_255_224_OFS: u64 = 0x019C;

pub const GIC_SH_DUAL_31_0_OFS: u64 = 0x0200;
pub const GIC_SH_DUAL_255_224_OFS: u64 = 0x021C;

pub const GIC_SH_WEDGE_OFS: u64 = 0x0280;

pub const GIC_SH_RMASK_31_0_OFS: u64 = 0x0300;
pub const GIC_SH_RMASK_255_224_OFS: u64 = 0x031C;

pub const GIC_SH_SMASK_31_0_OFS: u64 = 0x0380;
pub const GIC_SH_SMASK_255_224_OFS: u64 = 0x039C;

pub const GIC_SH_MASK_31_0_OFS: u64 = 0x0400;
pub const GIC_SH_MASK_255_224_OFS: u64 = 0x041C;

pub const GIC_SH_PEND_31_0_OFS: u64 = 0x0480;
pub const GIC_SH_PEND_255_224_OFS: u64 = 0x049C;

pub const GIC_SH_MAP0_PIN_OFS: u64 = 0x0500;
pub const GIC_SH_MAP255_PIN_OFS: u64 = 0x08FC;

pub const GIC_SH_MAP0_VPE31_0_OFS: u64 = 0x2000;
pub const GIC_SH_MAP255_VPE63_32_OFS: u64 = 0x3FE4;

/// Stride between consecutive SH_MAP<n>_VPE register groups
pub const GIC_SH_MAP_VPE_STRIDE: u64 = 0x20;

// Banked VPE blocks
pub const GIC_VPELOCAL_BASE_ADDR: u64 = 0x8000;
pub const GIC_VPEOTHER_BASE_ADDR: u64 = 0xC000;
pub const GIC_VL_BRK_GROUP: u64 = 0x3000;

pub const GIC_USERMODE_BASE_ADDR: u64 = 0x10000;
pub const GIC_USER_MODE_COUNTERLO: u64 = 0x0000;
pub const GIC_USER_MODE_COUNTERHI: u64 = 0x0004;

// Offsets within a VPE block
pub const GIC_VPE_CTL_OFS: u64 = 0x0000;
pub const GIC_VPE_PEND_OFS: u64 = 0x0004;
pub const GIC_VPE_MASK_OFS: u64 = 0x0008;
pub const GIC_VPE_RMASK_OFS: u64 = 0x000C;
pub const GIC_VPE_SMASK_OFS: u64 = 0x0010;
pub const GIC_VPE_WD_MAP_OFS: u64 = 0x0040;
pub const GIC_VPE_COMPARE_MAP_OFS: u64 = 0x0044;
pub const GIC_VPE_TIMER_MAP_OFS: u64 = 0x0048;
pub const GIC_VPE_OTHER_ADDR_OFS: u64 = 0x0080;
pub const GIC_VPE_IDENT_OFS: u64 = 0x0088;
pub const GIC_VPE_COMPARE_LO_OFS: u64 = 0x00A0;
pub const GIC_VPE_COMPARE_HI_OFS: u64 = 0x00A4;

// SH_CONFIG fields
pub const GIC_SH_CONFIG_COUNTSTOP_SHF: u32 = 28;
pub const GIC_SH_CONFIG_COUNTSTOP_MSK: u32 = 1 << GIC_SH_CONFIG_COUNTSTOP_SHF;
pub const GIC_SH_CONFIG_NUMINTRS_SHF: u32 = 16;

/// SH_WEDGE: top bit is the level, the rest the source index
pub const GIC_SH_WEDGE_RW_MSK: u64 = 1 << 31;

// Map register fields (SH_MAP<n>_PIN and the VPE *_MAP registers)
pub const GIC_MAP_TO_PIN_MSK: u32 = 1 << 31;
pub const GIC_MAP_TO_NMI_MSK: u32 = 1 << 30;
pub const GIC_MAP_TO_YQ_MSK: u32 = 1 << 29;
pub const GIC_MAP_MSK: u32 = 0x3F;
pub const GIC_MAP_TO_PIN_REG_MSK: u32 =
    GIC_MAP_TO_PIN_MSK | GIC_MAP_TO_NMI_MSK | GIC_MAP_TO_YQ_MSK | GIC_MAP_MSK;

// VPE control/mask fields
pub const GIC_VPE_CTL_EIC_MODE_MSK: u32 = 1;
pub const GIC_VPE_MASK_CMP_SHF: u32 = 1;
pub const GIC_VPE_MASK_CMP_MSK: u32 = 1 << GIC_VPE_MASK_CMP_SHF;
pub const GIC_VPE_SET_RESET_MSK: u32 = 0x7F;

/// Default pin for the local compare and timer interrupts after reset
pub const GIC_DEFAULT_LOCAL_PIN: u32 = 5;
