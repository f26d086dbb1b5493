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

//! Coprocessor 0 (System Control) register file
//!
//! [`Cp0`] holds the per-VPE privileged registers. Per-TC registers
//! (TCStatus, TCBind, ...) live in [`super::TcState`] and the MVP block
//! in [`Mvp`].
//!
//! Registers that are 32 bits wide architecturally are stored as `u32` and
//! sign-extended when read into a GPR; address-sized registers are stored
//! as `u64`.

use serde::{Deserialize, Serialize};

/// Status register bits
pub mod status {
    pub const IE: u32 = 1 << 0;
    pub const EXL: u32 = 1 << 1;
    pub const ERL: u32 = 1 << 2;
    pub const KSU_SHIFT: u32 = 3;
    pub const KSU_MASK: u32 = 3 << KSU_SHIFT;
    pub const UX: u32 = 1 << 5;
    pub const SX: u32 = 1 << 6;
    pub const KX: u32 = 1 << 7;
    pub const IM_SHIFT: u32 = 8;
    pub const IM_MASK: u32 = 0xFF << IM_SHIFT;
    pub const NMI: u32 = 1 << 19;
    pub const SR: u32 = 1 << 20;
    pub const TS: u32 = 1 << 21;
    pub const BEV: u32 = 1 << 22;
    pub const PX: u32 = 1 << 23;
    pub const MX: u32 = 1 << 24;
    pub const RE: u32 = 1 << 25;
    pub const FR: u32 = 1 << 26;
    pub const RP: u32 = 1 << 27;
    pub const CU_SHIFT: u32 = 28;
    pub const CU0: u32 = 1 << 28;
    pub const CU1: u32 = 1 << 29;
    pub const CU2: u32 = 1 << 30;
    pub const CU3: u32 = 1 << 31;
}

/// Cause register bits
pub mod cause {
    pub const EXC_CODE_SHIFT: u32 = 2;
    pub const EXC_CODE_MASK: u32 = 0x1F << EXC_CODE_SHIFT;
    pub const IP_SHIFT: u32 = 8;
    pub const IP_MASK: u32 = 0xFF << IP_SHIFT;
    /// Software interrupt bits IP1..IP0
    pub const IP_SW_MASK: u32 = 0x3 << IP_SHIFT;
    pub const WP: u32 = 1 << 22;
    pub const IV: u32 = 1 << 23;
    pub const PCI: u32 = 1 << 26;
    pub const DC: u32 = 1 << 27;
    pub const CE_SHIFT: u32 = 28;
    pub const CE_MASK: u32 = 0x3 << CE_SHIFT;
    pub const TI: u32 = 1 << 30;
    pub const BD: u32 = 1 << 31;
}

/// Debug register bits
pub mod debug {
    pub const SST: u32 = 1 << 8;
    pub const VER_SHIFT: u32 = 15;
    pub const CNT: u32 = 1 << 25;
    pub const HALT: u32 = 1 << 26;
    pub const DM: u32 = 1 << 30;
    /// Bits held per TC rather than per VPE
    pub const TC_MASK: u32 = SST | HALT;
}

/// IntCtl register fields
pub mod intctl {
    pub const VS_SHIFT: u32 = 5;
    pub const IPPCI_SHIFT: u32 = 26;
    pub const IPTI_SHIFT: u32 = 29;
}

/// SRSCtl register fields
pub mod srsctl {
    pub const CSS_SHIFT: u32 = 0;
    pub const PSS_SHIFT: u32 = 6;
    pub const ESS_SHIFT: u32 = 12;
    pub const EICSS_SHIFT: u32 = 18;
    pub const HSS_SHIFT: u32 = 26;
}

/// Config register fields
pub mod config {
    pub const M: u32 = 1 << 31;
    /// Config0
    pub const K0_SHIFT: u32 = 0;
    pub const MT_SHIFT: u32 = 7;
    pub const AR_SHIFT: u32 = 10;
    pub const AT_SHIFT: u32 = 13;
    pub const BE: u32 = 1 << 15;
    /// Config1
    pub const FP: u32 = 1 << 0;
    pub const DA_SHIFT: u32 = 7;
    pub const DL_SHIFT: u32 = 10;
    pub const DS_SHIFT: u32 = 13;
    pub const IA_SHIFT: u32 = 16;
    pub const IL_SHIFT: u32 = 19;
    pub const IS_SHIFT: u32 = 22;
    pub const MMU_SHIFT: u32 = 25;
    /// Config3
    pub const MT: u32 = 1 << 2;
    pub const VINT: u32 = 1 << 5;
    pub const VEIC: u32 = 1 << 6;
    pub const LPA: u32 = 1 << 7;
    pub const DSPP: u32 = 1 << 10;
    pub const MSAP: u32 = 1 << 28;
}

/// MVPControl / MVPConf0 / MVPConf1 fields
pub mod mvp {
    pub const CTL_EVP: u32 = 1 << 0;
    pub const CTL_VPC: u32 = 1 << 1;
    pub const CTL_STLB: u32 = 1 << 2;
    pub const CTL_CPA: u32 = 1 << 3;

    pub const CONF0_PTC_SHIFT: u32 = 0;
    pub const CONF0_PVPE_SHIFT: u32 = 10;
    pub const CONF0_TCA: u32 = 1 << 15;
    pub const CONF0_PTLBE_SHIFT: u32 = 16;
    pub const CONF0_PCP: u32 = 1 << 27;
    pub const CONF0_TLBS: u32 = 1 << 29;
    pub const CONF0_M: u32 = 1 << 31;

    pub const CONF1_PCP1_SHIFT: u32 = 0;
    pub const CONF1_CIF: u32 = 1 << 30;
    pub const CONF1_CIM: u32 = 1 << 31;
}

/// VPEControl / VPEConf0 / VPEConf1 fields
pub mod vpe {
    pub const CTL_TARGTC_MASK: u32 = 0xFF;
    pub const CTL_TE: u32 = 1 << 15;
    pub const CTL_EXCPT_SHIFT: u32 = 16;
    pub const CTL_EXCPT_MASK: u32 = 0x7 << CTL_EXCPT_SHIFT;
    pub const CTL_GSI: u32 = 1 << 20;
    pub const CTL_YSI: u32 = 1 << 21;

    pub const CONF0_VPA: u32 = 1 << 0;
    pub const CONF0_MVP: u32 = 1 << 1;
    pub const CONF0_XTC_SHIFT: u32 = 21;

    pub const CONF1_NCP1_SHIFT: u32 = 0;
    pub const CONF1_NCP2_SHIFT: u32 = 10;
    pub const CONF1_NCX_SHIFT: u32 = 20;
}

/// TCStatus / TCBind fields
pub mod tc {
    pub const STATUS_TASID_MASK: u32 = 0xFF;
    pub const STATUS_IXMT: u32 = 1 << 10;
    pub const STATUS_TKSU_SHIFT: u32 = 11;
    pub const STATUS_A: u32 = 1 << 13;
    pub const STATUS_DA: u32 = 1 << 15;
    pub const STATUS_DT: u32 = 1 << 20;
    pub const STATUS_TDS: u32 = 1 << 21;
    pub const STATUS_TMX: u32 = 1 << 27;
    pub const STATUS_TCU_SHIFT: u32 = 28;

    pub const BIND_CURVPE_SHIFT: u32 = 0;
    pub const BIND_TBE: u32 = 1 << 17;
    pub const BIND_CURTC_SHIFT: u32 = 21;
}

/// VPE-wide CP0 registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cp0 {
    pub index: u32,
    pub vpe_control: u32,
    pub vpe_conf0: u32,
    pub vpe_conf1: u32,
    pub yq_mask: u64,
    pub vpe_schedule: u64,
    pub vpe_schefback: u64,
    pub vpe_opt: u32,
    pub entry_lo0: u64,
    pub entry_lo1: u64,
    pub context: u64,
    pub page_mask: u32,
    pub page_grain: u32,
    pub wired: u32,
    pub srs_conf: [u32; 5],
    pub hwrena: u32,
    pub badvaddr: u64,
    /// Count base; the live value adds elapsed ticks unless Cause.DC is set
    pub count: u32,
    pub entry_hi: u64,
    pub compare: u32,
    pub status: u32,
    pub intctl: u32,
    pub srsctl: u32,
    pub srsmap: u32,
    /// Cause without the hardware interrupt lines, which are merged on read
    pub cause: u32,
    pub epc: u64,
    pub prid: u32,
    pub ebase: u32,
    pub config: [u32; 8],
    pub watch_lo: [u64; 8],
    pub watch_hi: [u32; 8],
    pub xcontext: u64,
    pub framemask: u32,
    pub debug: u32,
    pub depc: u64,
    pub performance0: u32,
    pub tag_lo: u32,
    pub data_lo: u32,
    pub tag_hi: u32,
    pub data_hi: u32,
    pub error_epc: u64,
    pub desave: u64,
}

/// Multi-VPE control block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mvp {
    pub control: u32,
    pub conf0: u32,
    pub conf1: u32,
}

impl Mvp {
    /// Configuration for a core with `num_vpe` VPEs of `nr_threads` TCs each
    pub fn new(nb_tlb: usize, num_vpe: usize, nr_threads: usize) -> Self {
        let ptc = (num_vpe * nr_threads).saturating_sub(1) as u32;
        let pvpe = num_vpe.saturating_sub(1) as u32;

        Self {
            control: 0,
            conf0: mvp::CONF0_M
                | mvp::CONF0_TLBS
                | mvp::CONF0_PCP
                | mvp::CONF0_TCA
                | ((nb_tlb as u32) << mvp::CONF0_PTLBE_SHIFT)
                | ((pvpe & 0xF) << mvp::CONF0_PVPE_SHIFT)
                | ((ptc & 0xFF) << mvp::CONF0_PTC_SHIFT),
            conf1: mvp::CONF1_CIM | mvp::CONF1_CIF | (1 << mvp::CONF1_PCP1_SHIFT),
        }
    }
}

/// Sign-extend a 32-bit register value to GPR width
#[inline(always)]
pub fn sext32(value: u32) -> u64 {
    value as i32 as i64 as u64
}
