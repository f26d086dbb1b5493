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

//! CPU model presets
//!
//! A model fixes everything that is not guest-writable: identification,
//! read-only configuration registers, writable-bit masks and sizes of the
//! TLB and the address space.

use super::cop0::{config, tc};
use crate::core::error::{EmulatorError, Result};
use bitflags::bitflags;

bitflags! {
    /// Instruction set and ASE support
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IsaFlags: u32 {
        const MIPS32 = 1 << 0;
        const MIPS32R2 = 1 << 1;
        const MIPS64 = 1 << 2;
        const MIPS64R2 = 1 << 3;
        const MIPS16 = 1 << 8;
        const MIPS3D = 1 << 9;
        const DSP = 1 << 10;
        const MT = 1 << 11;
        const MSA = 1 << 12;
    }
}

/// FIR (FCR0) fields
pub mod fcr0 {
    pub const PRID_SHIFT: u32 = 8;
    pub const S: u32 = 1 << 16;
    pub const D: u32 = 1 << 17;
    pub const PS: u32 = 1 << 18;
    pub const THREE_D: u32 = 1 << 19;
    pub const W: u32 = 1 << 20;
    pub const L: u32 = 1 << 21;
    pub const F64: u32 = 1 << 22;
}

/// Static description of a CPU model
#[derive(Debug, PartialEq, Eq)]
pub struct CpuModel {
    pub name: &'static str,
    pub prid: u32,
    pub config0: u32,
    pub config1: u32,
    pub config2: u32,
    pub config3: u32,
    pub config6: u32,
    pub config7: u32,
    pub status_rw_bitmask: u32,
    pub tcstatus_rw_bitmask: u32,
    pub srsctl: u32,
    pub srs_conf: [u32; 5],
    pub srs_conf_rw_bitmask: [u32; 5],
    pub lladdr_rw_bitmask: u64,
    pub lladdr_shift: u32,
    pub synci_step: u32,
    pub ccres: u32,
    pub fcr0: u32,
    pub segbits: u32,
    pub pabits: u32,
    pub isa: IsaFlags,
    pub nb_tlb: usize,
    /// Thread contexts per VPE
    pub nr_threads: usize,
}

const CONFIG0_BASE: u32 = config::M | (2 << config::K0_SHIFT) | (1 << config::AR_SHIFT);
const MMU_TYPE_R4000: u32 = 1;

/// MIPS32 34Kf: MIPS32R2 with the MT and DSP ASEs
pub const MODEL_34KF: CpuModel = CpuModel {
    name: "34Kf",
    prid: 0x0001_9500,
    config0: CONFIG0_BASE | (MMU_TYPE_R4000 << config::MT_SHIFT),
    config1: config::M
        | (15 << config::MMU_SHIFT)
        | (3 << config::IL_SHIFT)
        | (1 << config::IA_SHIFT)
        | (3 << config::DL_SHIFT)
        | (1 << config::DA_SHIFT)
        | config::FP,
    config2: config::M,
    config3: config::VINT | config::MT | config::DSPP,
    config6: 0,
    config7: 0,
    status_rw_bitmask: 0x3678_FF1F,
    tcstatus_rw_bitmask: (1 << (tc::STATUS_TCU_SHIFT + 1))
        | (1 << tc::STATUS_TCU_SHIFT)
        | tc::STATUS_DT
        | tc::STATUS_DA
        | tc::STATUS_A
        | (0x3 << tc::STATUS_TKSU_SHIFT)
        | tc::STATUS_IXMT
        | tc::STATUS_TASID_MASK,
    srsctl: 0xF << super::cop0::srsctl::HSS_SHIFT,
    srs_conf: [
        (1 << 31) | (0x3FE << 20) | (0x3FE << 10),
        (1 << 31) | (0x3FE << 20) | (0x3FE << 10) | 0x3FE,
        (1 << 31) | (0x3FE << 20) | (0x3FE << 10) | 0x3FE,
        (1 << 31) | (0x3FE << 20) | (0x3FE << 10) | 0x3FE,
        (0x3FE << 20) | (0x3FE << 10) | 0x3FE,
    ],
    srs_conf_rw_bitmask: [0x3FFF_FFFE; 5],
    lladdr_rw_bitmask: 0,
    lladdr_shift: 0,
    synci_step: 32,
    ccres: 2,
    fcr0: fcr0::F64
        | fcr0::L
        | fcr0::W
        | fcr0::D
        | fcr0::S
        | (0x95 << fcr0::PRID_SHIFT),
    segbits: 32,
    pabits: 32,
    isa: IsaFlags::MIPS32
        .union(IsaFlags::MIPS32R2)
        .union(IsaFlags::MIPS16)
        .union(IsaFlags::DSP)
        .union(IsaFlags::MT),
    nb_tlb: 16,
    nr_threads: 2,
};

/// Generic MIPS64 Release 2 core without MT
pub const MODEL_MIPS64R2_GENERIC: CpuModel = CpuModel {
    name: "MIPS64R2-generic",
    prid: 0x0001_0000,
    config0: CONFIG0_BASE | (2 << config::AT_SHIFT) | (MMU_TYPE_R4000 << config::MT_SHIFT),
    config1: config::M
        | (31 << config::MMU_SHIFT)
        | (2 << config::IS_SHIFT)
        | (4 << config::IL_SHIFT)
        | (3 << config::IA_SHIFT)
        | (2 << config::DS_SHIFT)
        | (4 << config::DL_SHIFT)
        | (3 << config::DA_SHIFT)
        | config::FP,
    config2: config::M,
    config3: config::LPA,
    config6: 0,
    config7: 0,
    status_rw_bitmask: 0x36FB_FFFF,
    tcstatus_rw_bitmask: 0,
    srsctl: 0,
    srs_conf: [0; 5],
    srs_conf_rw_bitmask: [0; 5],
    lladdr_rw_bitmask: 0,
    lladdr_shift: 0,
    synci_step: 32,
    ccres: 2,
    fcr0: fcr0::F64
        | fcr0::THREE_D
        | fcr0::PS
        | fcr0::L
        | fcr0::W
        | fcr0::D
        | fcr0::S,
    segbits: 42,
    pabits: 36,
    isa: IsaFlags::MIPS32
        .union(IsaFlags::MIPS32R2)
        .union(IsaFlags::MIPS64)
        .union(IsaFlags::MIPS64R2)
        .union(IsaFlags::MIPS3D),
    nb_tlb: 32,
    nr_threads: 1,
};

/// Every model the emulator knows
pub const MODELS: [&CpuModel; 2] = [&MODEL_34KF, &MODEL_MIPS64R2_GENERIC];

impl CpuModel {
    /// Look a model up by name (case-insensitive)
    ///
    /// # Example
    ///
    /// ```
    /// use mipsmt::core::cpu::CpuModel;
    ///
    /// let model = CpuModel::by_name("34kf").unwrap();
    /// assert_eq!(model.nb_tlb, 16);
    /// assert!(CpuModel::by_name("R3000").is_err());
    /// ```
    pub fn by_name(name: &str) -> Result<&'static CpuModel> {
        MODELS
            .iter()
            .copied()
            .find(|model| model.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| EmulatorError::UnknownCpuModel(name.to_string()))
    }

    /// Whether the model implements the 64-bit ISA
    pub fn is_64bit(&self) -> bool {
        self.isa.contains(IsaFlags::MIPS64)
    }

    pub fn has_mt(&self) -> bool {
        self.config3 & config::MT != 0
    }

    /// Mask applied to virtual addresses held in EntryHi and the TLB
    pub fn seg_mask(&self) -> u64 {
        if self.is_64bit() {
            let mut mask = (1u64 << self.segbits) - 1;
            if self.config0 & (0x3 << config::AT_SHIFT) != 0 {
                mask |= 3 << 62;
            }
            mask
        } else {
            u64::MAX
        }
    }
}
