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

use serde::{Deserialize, Serialize};

/// Number of DSP accumulators (HI/LO/ACX sets)
pub const MIPS_DSP_ACC: usize = 4;

/// Register file of one thread context
///
/// The running TC of a VPE is kept in `Cpu::active_tc`; the others sit in
/// the `Cpu::tcs` array. Always go through `Cpu::tc` / `Cpu::tc_mut` when
/// the TC index comes from the guest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcState {
    pub gpr: [u64; 32],
    pub pc: u64,
    pub hi: [u64; MIPS_DSP_ACC],
    pub lo: [u64; MIPS_DSP_ACC],
    pub acx: [u64; MIPS_DSP_ACC],
    pub dsp_control: u64,
    pub tcstatus: u32,
    pub tcbind: u32,
    pub tchalt: u32,
    pub tccontext: u64,
    pub tcschedule: u64,
    pub tcschefback: u64,
    /// Debug.SSt and Debug.Halt of this TC
    pub debug_tcstatus: u32,
}
