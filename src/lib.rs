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
//! MIPS multithreading CPU control core library
//!
//! This library models the control side of a multi-VPE MIPS core: the CP0
//! register bank with the MT ASE, the software-managed TLB, exception entry
//! and the MIPS Global Interrupt Controller that routes shared interrupt
//! sources onto per-VPE CPU pins.
//!
//! # Example
//!
//! ```
//! use mipsmt::core::config::MachineConfig;
//! use mipsmt::core::system::Machine;
//!
//! let mut machine = Machine::new(&MachineConfig::default()).unwrap();
//!
//! // Only VPE 0 runs out of reset
//! assert!(!machine.cpu(0).unwrap().is_halted());
//! assert!(machine.cpu(1).unwrap().is_halted());
//!
//! machine.advance(1_000);
//! assert_eq!(machine.now_ns(), 1_000);
//! ```

pub mod core;
