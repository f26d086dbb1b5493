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
//! Core emulation components
//!
//! This module contains all hardware emulation components:
//! - CPU (MIPS32/MIPS64 R2 with the MT ASE): CP0, TLB, FPU/MSA control
//! - GIC (Global Interrupt Controller)
//! - Interrupt line fabric between the GIC and the CPUs
//! - Virtual clock and local timers
//! - MMIO routing
//! - System integration and save states

pub mod config;
pub mod cpu;
pub mod error;
pub mod gic;
pub mod interrupt;
pub mod memory;
pub mod save_state;
pub mod system;
pub mod timing;

// Re-export commonly used types
pub use config::MachineConfig;
pub use cpu::{Cpu, CpuModel};
pub use error::{CpuResult, EmulatorError, Exception, ExceptionKind, Result};
pub use gic::{Gic, GicConfig};
pub use interrupt::InterruptLines;
pub use memory::{MmioDevice, MmioMap};
pub use save_state::SaveState;
pub use system::Machine;
pub use timing::VirtualClock;
