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

//! Memory-mapped device trait
//!
//! Devices expose a byte-addressed register window. The bus translates
//! physical addresses to window offsets and passes the index of the CPU
//! issuing the access, since banked register blocks (such as the GIC's
//! VPE-local block) decode differently per requester.
//!
//! # Example
//!
//! ```
//! use mipsmt::core::memory::MmioDevice;
//!
//! struct Scratch {
//!     regs: [u32; 4],
//! }
//!
//! impl MmioDevice for Scratch {
//!     fn size(&self) -> u64 {
//!         0x10
//!     }
//!
//!     fn read(&mut self, _cpu: usize, offset: u64, _size: u32) -> u64 {
//!         self.regs.get((offset / 4) as usize).copied().unwrap_or(0) as u64
//!     }
//!
//!     fn write(&mut self, _cpu: usize, offset: u64, _size: u32, value: u64) {
//!         if let Some(reg) = self.regs.get_mut((offset / 4) as usize) {
//!             *reg = value as u32;
//!         }
//!     }
//! }
//! ```

/// Trait for memory-mapped I/O devices
///
/// # Access Sizes
///
/// Callers only pass sizes accepted by [`is_valid_access_size`]; the bus
/// filters everything else before it reaches the device.
///
/// # Errors
///
/// Register accesses never fail. Unknown offsets are logged by the device,
/// reads of them return 0 and writes to them are dropped.
pub trait MmioDevice {
    /// Size of the register window in bytes
    fn size(&self) -> u64;

    /// Read `size` bytes at `offset` on behalf of CPU `cpu`
    ///
    /// Takes `&mut self` because some reads have side effects (folding
    /// elapsed time into a counter, firing due timers).
    fn read(&mut self, cpu: usize, offset: u64, size: u32) -> u64;

    /// Write `size` bytes at `offset` on behalf of CPU `cpu`
    fn write(&mut self, cpu: usize, offset: u64, size: u32, value: u64);

    /// Device name for diagnostics
    fn name(&self) -> &str {
        "Unknown Device"
    }
}

/// Whether a bus access width is supported by memory-mapped devices
#[inline]
pub fn is_valid_access_size(size: u32) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}
