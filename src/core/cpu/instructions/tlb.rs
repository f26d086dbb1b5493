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

//! TLB instructions and virtual address translation

use super::super::{Cpu, Privilege, TlbEntry, TlbLookup};
use super::EXCP_TLB_NOMATCH;
use crate::core::error::{CpuResult, Exception, ExceptionKind};

/// Index.P: set by TLBP when nothing matched
const INDEX_PROBE_FAIL: u32 = 0x8000_0000;

/// Where a virtual address lands before the TLB is consulted
enum Segment {
    Mapped,
    Unmapped(u64),
    AddressError,
}

impl Cpu {
    /// Random: next TLBWR slot in `[Wired, nb_tlb)`
    pub fn read_random(&mut self) -> u32 {
        self.tlb.random_index(self.cp0.wired)
    }

    fn current_asid(&self) -> u8 {
        self.cp0.entry_hi as u8
    }

    fn entry_from_cp0(&self) -> TlbEntry {
        TlbEntry::from_cp0(
            self.cp0.entry_hi,
            self.cp0.entry_lo0,
            self.cp0.entry_lo1,
            self.cp0.page_mask,
            self.model.seg_mask(),
        )
    }

    /// TLBWI: write the entry at Index
    ///
    /// Shadow entries are discarded first since any of them may duplicate
    /// the slot being replaced.
    pub fn tlbwi(&mut self) -> CpuResult<()> {
        self.check_cp0()?;
        let nb_tlb = self.tlb.nb_tlb();
        let idx = (self.cp0.index & !INDEX_PROBE_FAIL) as usize % nb_tlb;
        let asid = self.current_asid();
        let seg_mask = self.model.seg_mask();

        self.tlb.flush_extra(nb_tlb, asid, seg_mask);
        self.tlb.invalidate(idx, false, asid, seg_mask);
        let entry = self.entry_from_cp0();
        self.tlb.fill(idx, entry);
        log::trace!("CPU{}: TLBWI [{}] = {:?}", self.index, idx, entry);
        Ok(())
    }

    /// TLBWR: write the entry at a random slot
    ///
    /// The old entry may survive as a shadow entry.
    pub fn tlbwr(&mut self) -> CpuResult<()> {
        self.check_cp0()?;
        let idx = self.read_random() as usize;
        let asid = self.current_asid();

        self.tlb.invalidate(idx, true, asid, self.model.seg_mask());
        let entry = self.entry_from_cp0();
        self.tlb.fill(idx, entry);
        log::trace!("CPU{}: TLBWR [{}] = {:?}", self.index, idx, entry);
        Ok(())
    }

    /// TLBP: look EntryHi up in the architectural entries
    ///
    /// On a miss, shadow entries matching EntryHi are discarded along with
    /// every shadow above them, and Index.P is set.
    pub fn tlbp(&mut self) -> CpuResult<()> {
        self.check_cp0()?;
        let vpn = self.cp0.entry_hi;
        let asid = self.current_asid();

        if let Some(idx) = self.tlb.probe(vpn, asid) {
            self.cp0.index = idx as u32;
            return Ok(());
        }

        if let Some(idx) = self.tlb.probe_shadow(vpn, asid) {
            self.tlb.flush_extra(idx, asid, self.model.seg_mask());
        }
        self.cp0.index |= INDEX_PROBE_FAIL;
        Ok(())
    }

    /// TLBR: load the entry at Index into EntryHi/EntryLo0/EntryLo1/PageMask
    pub fn tlbr(&mut self) -> CpuResult<()> {
        self.check_cp0()?;
        let nb_tlb = self.tlb.nb_tlb();
        let idx = (self.cp0.index & !INDEX_PROBE_FAIL) as usize % nb_tlb;
        let entry = self.tlb.entries()[idx];
        let asid = self.current_asid();

        // Loading another ASID invalidates cached translations
        if asid != entry.asid {
            self.tlb.flush();
        }
        self.tlb.flush_extra(nb_tlb, asid, self.model.seg_mask());

        let (entry_hi, entry_lo0, entry_lo1, page_mask) = entry.to_cp0();
        self.cp0.entry_hi = entry_hi;
        self.cp0.entry_lo0 = entry_lo0;
        self.cp0.entry_lo1 = entry_lo1;
        self.cp0.page_mask = page_mask;
        Ok(())
    }

    fn segment(&self, vaddr: u64) -> Segment {
        let privilege = self.hflags.privilege();
        let kernel = privilege == Privilege::Kernel;
        let supervisor = privilege != Privilege::User;
        let is_64bit = self.model.is_64bit();
        let seg_mask = self.model.seg_mask();

        let allow = |ok: bool, seg: Segment| if ok { seg } else { Segment::AddressError };

        if vaddr <= 0x7FFF_FFFF {
            // kuseg / useg
            Segment::Mapped
        } else if is_64bit && vaddr < 0x4000_0000_0000_0000 {
            // xuseg
            allow(vaddr <= seg_mask, Segment::Mapped)
        } else if is_64bit && vaddr < 0x8000_0000_0000_0000 {
            // xsseg
            allow(supervisor && vaddr & 0x3FFF_FFFF_FFFF_FFFF <= seg_mask, Segment::Mapped)
        } else if is_64bit && vaddr < 0xC000_0000_0000_0000 {
            // xkphys
            let paddr = vaddr & ((1u64 << self.model.pabits) - 1);
            allow(kernel, Segment::Unmapped(paddr))
        } else if is_64bit && vaddr < 0xFFFF_FFFF_8000_0000 {
            // xkseg
            allow(kernel && vaddr & 0x3FFF_FFFF_FFFF_FFFF <= seg_mask, Segment::Mapped)
        } else if vaddr < 0xFFFF_FFFF_8000_0000 {
            Segment::AddressError
        } else if vaddr < 0xFFFF_FFFF_A000_0000 {
            // kseg0
            allow(kernel, Segment::Unmapped(vaddr - 0xFFFF_FFFF_8000_0000))
        } else if vaddr < 0xFFFF_FFFF_C000_0000 {
            // kseg1
            allow(kernel, Segment::Unmapped(vaddr - 0xFFFF_FFFF_A000_0000))
        } else if vaddr < 0xFFFF_FFFF_E000_0000 {
            // ksseg
            allow(supervisor, Segment::Mapped)
        } else {
            // kseg3
            allow(kernel, Segment::Mapped)
        }
    }

    /// Translate a (sign-extended) virtual address for a load or store
    ///
    /// Mapped translations are cached in the host TLB. A failed
    /// translation loads BadVAddr, Context, EntryHi (and XContext on
    /// 64-bit models) with the faulting address and returns the matching
    /// address error or TLB exception.
    pub fn translate(&mut self, vaddr: u64, write: bool) -> CpuResult<u64> {
        let lookup = match self.segment(vaddr) {
            Segment::Unmapped(paddr) => return Ok(paddr),
            Segment::AddressError => None,
            Segment::Mapped => {
                if let Some(paddr) = self.tlb.host_mut().lookup(vaddr, write) {
                    return Ok(paddr);
                }
                Some(self.tlb.map_address(
                    vaddr,
                    self.current_asid(),
                    write,
                    self.model.seg_mask(),
                ))
            }
        };

        let exception = match lookup {
            Some(TlbLookup::Match { paddr, writable }) => {
                self.tlb.host_mut().insert(vaddr, paddr, writable);
                return Ok(paddr);
            }
            None if write => Exception::new(ExceptionKind::AddressErrorStore),
            None => Exception::new(ExceptionKind::AddressErrorLoad),
            Some(TlbLookup::Refill) => Exception::with_code(tlb_kind(write), EXCP_TLB_NOMATCH),
            Some(TlbLookup::Invalid) => Exception::new(tlb_kind(write)),
            Some(TlbLookup::Modified) => Exception::new(ExceptionKind::TlbModified),
        };

        self.record_bad_address(vaddr);
        log::trace!(
            "CPU{}: translate 0x{:016X} ({}) -> {:?}",
            self.index,
            vaddr,
            if write { "store" } else { "load" },
            exception.kind
        );
        Err(exception)
    }

    fn record_bad_address(&mut self, vaddr: u64) {
        let cp0 = &mut self.cp0;
        cp0.badvaddr = vaddr;
        cp0.context = (cp0.context & !0x007F_FFFF) | ((vaddr >> 9) & 0x007F_FFF0);
        cp0.entry_hi = ((cp0.entry_hi & 0xFF) | (vaddr & !0x1FFF)) & self.model.seg_mask();

        if self.model.is_64bit() {
            let segbits = self.model.segbits;
            cp0.xcontext = (cp0.xcontext & (!0u64 << (segbits - 7)))
                | ((vaddr >> 62) << (segbits - 9))
                | ((vaddr & ((1u64 << segbits) - 1) & !0x1FFF) >> 9);
        }
    }
}

fn tlb_kind(write: bool) -> ExceptionKind {
    if write {
        ExceptionKind::TlbStore
    } else {
        ExceptionKind::TlbLoad
    }
}
