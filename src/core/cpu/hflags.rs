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

//! Derived execution-mode flags
//!
//! The flags cache decisions that depend on Status, Config and the debug
//! mode bit. They must be recomputed after every change to any of those.

use super::cop0::status;
use super::model::{fcr0, IsaFlags};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Hardware mode flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct HFlags: u32 {
        /// Privilege field; kernel mode is all clear
        const KSU = 0b11;
        const SM = 0b01;
        const UM = 0b10;
        /// Debug mode
        const DM = 1 << 2;
        /// CP0 usable
        const CP0 = 1 << 3;
        /// 64-bit instructions enabled
        const MIPS64 = 1 << 4;
        /// 64-bit user addressing
        const UX = 1 << 5;
        /// FPU usable
        const FPU = 1 << 6;
        /// 64-bit FPU registers
        const F64 = 1 << 7;
        /// COP1X instructions enabled
        const COP1X = 1 << 8;
        /// MIPS16 mode
        const M16 = 1 << 9;
    }
}

/// Processor privilege level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Kernel,
    Supervisor,
    User,
}

impl HFlags {
    pub fn privilege(self) -> Privilege {
        let ksu = self.intersection(HFlags::KSU);
        if ksu == HFlags::UM {
            Privilege::User
        } else if ksu == HFlags::SM {
            Privilege::Supervisor
        } else {
            Privilege::Kernel
        }
    }

    /// Recompute every derived flag from the architectural state
    ///
    /// DM and M16 are not derived from Status and are carried over.
    pub fn compute(self, status: u32, isa: IsaFlags, fcr0_value: u32) -> HFlags {
        let mut flags = self.intersection(HFlags::DM | HFlags::M16);

        if status & (status::EXL | status::ERL) == 0 && !flags.contains(HFlags::DM) {
            flags |= HFlags::from_bits_truncate((status & status::KSU_MASK) >> status::KSU_SHIFT)
                & HFlags::KSU;
        }

        if isa.contains(IsaFlags::MIPS64) {
            if flags.privilege() != Privilege::User || status & (status::PX | status::UX) != 0 {
                flags |= HFlags::MIPS64;
            }
            if status & status::UX != 0 {
                flags |= HFlags::UX;
            }
        }

        if status & status::CU0 != 0 || flags.privilege() == Privilege::Kernel {
            flags |= HFlags::CP0;
        }
        if status & status::CU1 != 0 {
            flags |= HFlags::FPU;
        }
        if status & status::FR != 0 {
            flags |= HFlags::F64;
        }

        if isa.contains(IsaFlags::MIPS32R2) {
            if fcr0_value & fcr0::F64 != 0 {
                flags |= HFlags::COP1X;
            }
        } else if isa.contains(IsaFlags::MIPS32) && flags.contains(HFlags::MIPS64) {
            flags |= HFlags::COP1X;
        }

        flags
    }
}
