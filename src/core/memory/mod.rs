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

//! Memory-mapped I/O routing
//!
//! The machine has no RAM model; the only thing on the bus is device
//! register windows. [`MmioMap`] keeps the windows and forwards accesses to
//! the owning device with the address rebased to the window start.
//!
//! # Example
//!
//! ```
//! use mipsmt::core::gic::{Gic, GicConfig};
//! use mipsmt::core::interrupt::InterruptLines;
//! use mipsmt::core::memory::MmioMap;
//! use mipsmt::core::timing::VirtualClock;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let clock = Rc::new(VirtualClock::new());
//! let lines = InterruptLines::shared(1);
//! let gic = Gic::new(GicConfig::default(), clock, lines).unwrap();
//!
//! let mut map = MmioMap::new();
//! map.register(0x1BDC_0000, Rc::new(RefCell::new(gic)));
//!
//! // IDENT register of the VPE-local block
//! assert_eq!(map.read(0, 0x1BDC_8088, 4), 0);
//! ```

mod io_device;

pub use io_device::{is_valid_access_size, MmioDevice};

use std::cell::RefCell;
use std::rc::Rc;

/// A device window on the bus
struct Region {
    base: u64,
    size: u64,
    device: Rc<RefCell<dyn MmioDevice>>,
}

impl Region {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

/// Physical address map of memory-mapped devices
#[derive(Default)]
pub struct MmioMap {
    regions: Vec<Region>,
}

impl MmioMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a device window at `base`
    pub fn register(&mut self, base: u64, device: Rc<RefCell<dyn MmioDevice>>) {
        let size = device.borrow().size();
        log::debug!(
            "Mapped {} at 0x{:08X}-0x{:08X}",
            device.borrow().name(),
            base,
            base + size - 1
        );
        self.regions.push(Region { base, size, device });
    }

    fn find(&self, addr: u64) -> Option<&Region> {
        self.regions.iter().find(|region| region.contains(addr))
    }

    /// Read from the device mapped at `addr`
    ///
    /// Unmapped addresses and unsupported widths read as 0.
    pub fn read(&self, cpu: usize, addr: u64, size: u32) -> u64 {
        if !is_valid_access_size(size) {
            log::warn!("Unsupported {}-byte MMIO read at 0x{:08X}", size, addr);
            return 0;
        }
        match self.find(addr) {
            Some(region) => region.device.borrow_mut().read(cpu, addr - region.base, size),
            None => {
                log::warn!("Unmapped MMIO read at 0x{:08X}", addr);
                0
            }
        }
    }

    /// Write to the device mapped at `addr`
    ///
    /// Unmapped addresses and unsupported widths are dropped.
    pub fn write(&self, cpu: usize, addr: u64, size: u32, value: u64) {
        if !is_valid_access_size(size) {
            log::warn!("Unsupported {}-byte MMIO write at 0x{:08X}", size, addr);
            return;
        }
        match self.find(addr) {
            Some(region) => region
                .device
                .borrow_mut()
                .write(cpu, addr - region.base, size, value),
            None => log::warn!(
                "Unmapped MMIO write at 0x{:08X} = 0x{:X}",
                addr,
                value
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch {
        value: u64,
        last_cpu: usize,
    }

    impl MmioDevice for Latch {
        fn size(&self) -> u64 {
            0x100
        }

        fn read(&mut self, cpu: usize, _offset: u64, _size: u32) -> u64 {
            self.last_cpu = cpu;
            self.value
        }

        fn write(&mut self, cpu: usize, offset: u64, _size: u32, value: u64) {
            self.last_cpu = cpu;
            self.value = value + offset;
        }
    }

    #[test]
    fn test_routes_with_rebased_offset() {
        let latch = Rc::new(RefCell::new(Latch {
            value: 0,
            last_cpu: 0,
        }));
        let mut map = MmioMap::new();
        map.register(0x1000, latch.clone());

        map.write(3, 0x1010, 4, 0x20);
        assert_eq!(latch.borrow().value, 0x30);
        assert_eq!(latch.borrow().last_cpu, 3);
        assert_eq!(map.read(1, 0x10FF, 4), 0x30);
        assert_eq!(latch.borrow().last_cpu, 1);
    }

    #[test]
    fn test_unmapped_and_bad_width() {
        let latch = Rc::new(RefCell::new(Latch {
            value: 7,
            last_cpu: 0,
        }));
        let mut map = MmioMap::new();
        map.register(0x1000, latch.clone());

        assert_eq!(map.read(0, 0x1100, 4), 0);
        assert_eq!(map.read(0, 0x1000, 3), 0);
        map.write(0, 0x0FFF, 4, 1);
        assert_eq!(latch.borrow().value, 7);
    }
}
