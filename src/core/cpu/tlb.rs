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

//! R4000-style joint TLB
//!
//! The table has `nb_tlb` architectural slots followed by up to
//! `MIPS_TLB_MAX - nb_tlb` shadow slots. A random write keeps the entry it
//! replaces alive in a shadow slot as long as the guest cannot observe it;
//! every architectural change that could make a shadow stale drops the
//! shadows first.
//!
//! Translations that hit are cached in a [`HostTlb`], the model of the
//! host-side lookaside. Invalidation decides which of its pages to drop.
//!
//! # Entry Layout
//!
//! ```text
//! EntryHi:  | VPN2 (63/31..13) | 0 | ASID (7..0) |
//! EntryLo:  | PFN (29..6) | C (5..3) | D (2) | V (1) | G (0) |
//! PageMask: | Mask (28..13) |
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Total number of TLB slots, architectural plus shadow
pub const MIPS_TLB_MAX: usize = 128;

/// Host page size
pub const TARGET_PAGE_BITS: u32 = 12;
pub const TARGET_PAGE_SIZE: u64 = 1 << TARGET_PAGE_BITS;

/// VPN2 granularity: an entry always maps an even/odd pair of pages
const VPN2_MASK: u64 = !((TARGET_PAGE_SIZE << 1) - 1);

/// One half (even or odd page) of a TLB entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlbPage {
    pub valid: bool,
    pub dirty: bool,
    /// Cache attribute
    pub cache: u8,
    /// Physical frame base address
    pub pfn: u64,
}

impl TlbPage {
    fn from_entry_lo(lo: u64) -> Self {
        Self {
            valid: lo & 2 != 0,
            dirty: lo & 4 != 0,
            cache: ((lo >> 3) & 0x7) as u8,
            pfn: (lo >> 6) << 12,
        }
    }

    fn to_entry_lo(self, global: bool) -> u64 {
        global as u64
            | (self.valid as u64) << 1
            | (self.dirty as u64) << 2
            | (self.cache as u64) << 3
            | (self.pfn >> 6)
    }
}

/// One TLB entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlbEntry {
    pub vpn: u64,
    pub asid: u8,
    pub page_mask: u32,
    pub global: bool,
    pub pages: [TlbPage; 2],
}

impl TlbEntry {
    /// Build an entry from the EntryHi/EntryLo0/EntryLo1/PageMask registers
    pub fn from_cp0(entry_hi: u64, entry_lo0: u64, entry_lo1: u64, page_mask: u32, seg_mask: u64) -> Self {
        Self {
            vpn: entry_hi & VPN2_MASK & seg_mask,
            asid: entry_hi as u8,
            page_mask,
            global: entry_lo0 & entry_lo1 & 1 != 0,
            pages: [TlbPage::from_entry_lo(entry_lo0), TlbPage::from_entry_lo(entry_lo1)],
        }
    }

    /// Register images `(EntryHi, EntryLo0, EntryLo1, PageMask)` of the entry
    pub fn to_cp0(&self) -> (u64, u64, u64, u32) {
        (
            self.vpn | self.asid as u64,
            self.pages[0].to_entry_lo(self.global),
            self.pages[1].to_entry_lo(self.global),
            self.page_mask,
        )
    }

    /// Address bits covered by the entry (both pages)
    #[inline]
    pub fn mask(&self) -> u64 {
        self.page_mask as u64 | !(VPN2_MASK)
    }

    /// Whether the entry translates `vpn` in address space `asid`
    ///
    /// Only bits above the page mask take part in the compare.
    #[inline]
    pub fn matches(&self, vpn: u64, asid: u8) -> bool {
        let mask = self.mask();
        (self.global || self.asid == asid) && (self.vpn & !mask) == (vpn & !mask)
    }
}

/// Outcome of a TLB lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbLookup {
    Match { paddr: u64, writable: bool },
    /// No entry covers the address
    Refill,
    /// The entry exists but the page is not valid
    Invalid,
    /// Store to a clean page
    Modified,
}

/// Source of TLBWR / Random indexes
pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

/// 32-bit Galois LFSR with taps 0xD0000001
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lfsr {
    state: u32,
}

impl Lfsr {
    /// A zero seed would lock the register; it is replaced by 1
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RandomSource for Lfsr {
    fn next_u32(&mut self) -> u32 {
        self.state = (self.state >> 1) ^ ((self.state & 1).wrapping_neg() & 0xD000_0001);
        self.state
    }
}

/// A translation cached on the host side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostMapping {
    pub paddr: u64,
    pub writable: bool,
}

/// Host-side translation cache, keyed by virtual page
#[derive(Debug, Default)]
pub struct HostTlb {
    pages: BTreeMap<u64, HostMapping>,
    hits: u64,
    page_flushes: u64,
    full_flushes: u64,
}

impl HostTlb {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn page_of(vaddr: u64) -> u64 {
        vaddr & !(TARGET_PAGE_SIZE - 1)
    }

    /// Cached physical address for `vaddr`, if the page is present
    pub fn lookup(&mut self, vaddr: u64, write: bool) -> Option<u64> {
        let mapping = self.pages.get(&Self::page_of(vaddr))?;
        if write && !mapping.writable {
            return None;
        }
        self.hits += 1;
        Some(mapping.paddr | (vaddr & (TARGET_PAGE_SIZE - 1)))
    }

    pub fn insert(&mut self, vaddr: u64, paddr: u64, writable: bool) {
        self.pages.insert(
            Self::page_of(vaddr),
            HostMapping {
                paddr: Self::page_of(paddr),
                writable,
            },
        );
    }

    pub fn contains(&self, vaddr: u64) -> bool {
        self.pages.contains_key(&Self::page_of(vaddr))
    }

    /// Drop every cached page in `[start, end]`
    pub fn flush_range(&mut self, start: u64, end: u64) {
        if start > end {
            return;
        }
        let doomed: Vec<u64> = self.pages.range(start..=end).map(|(&page, _)| page).collect();
        self.page_flushes += doomed.len() as u64;
        for page in doomed {
            self.pages.remove(&page);
        }
    }

    pub fn flush_all(&mut self) {
        self.pages.clear();
        self.full_flushes += 1;
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn page_flushes(&self) -> u64 {
        self.page_flushes
    }

    pub fn full_flushes(&self) -> u64 {
        self.full_flushes
    }
}

/// Serializable TLB contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlbState {
    pub entries: Vec<TlbEntry>,
    pub tlb_in_use: usize,
    pub prev_random: u32,
}

/// The TLB of one VPE
pub struct Tlb {
    entries: Vec<TlbEntry>,
    nb_tlb: usize,
    tlb_in_use: usize,
    host: HostTlb,
    random: Box<dyn RandomSource>,
    prev_random: u32,
}

impl Tlb {
    pub fn new(nb_tlb: usize, random: Box<dyn RandomSource>) -> Self {
        let nb_tlb = nb_tlb.clamp(1, MIPS_TLB_MAX);
        Self {
            entries: vec![TlbEntry::default(); MIPS_TLB_MAX],
            nb_tlb,
            tlb_in_use: nb_tlb,
            host: HostTlb::new(),
            random,
            prev_random: 0,
        }
    }

    /// Number of architectural entries
    pub fn nb_tlb(&self) -> usize {
        self.nb_tlb
    }

    /// Architectural plus live shadow entries
    pub fn tlb_in_use(&self) -> usize {
        self.tlb_in_use
    }

    /// Entry at any slot, shadow slots included
    pub fn entry(&self, idx: usize) -> Option<&TlbEntry> {
        self.entries.get(idx)
    }

    /// Architectural entries
    pub fn entries(&self) -> &[TlbEntry] {
        &self.entries[..self.nb_tlb]
    }

    pub fn host(&self) -> &HostTlb {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostTlb {
        &mut self.host
    }

    pub fn reset(&mut self) {
        self.entries.iter_mut().for_each(|entry| *entry = TlbEntry::default());
        self.tlb_in_use = self.nb_tlb;
        self.prev_random = 0;
        self.host.flush_all();
    }

    /// Random index in `[wired, nb_tlb)`, never the previous value twice
    pub fn random_index(&mut self, wired: u32) -> u32 {
        let nb = self.nb_tlb as u32;
        let lo = wired.min(nb - 1);
        let span = nb - lo;

        if span == 1 {
            self.prev_random = lo;
            return lo;
        }

        let mut idx = self.random.next_u32() % span + lo;
        if idx == self.prev_random {
            // Step to the neighbouring slot instead of redrawing
            idx = lo + (idx - lo + 1) % span;
        }
        self.prev_random = idx;
        idx
    }

    /// Forget an entry before it is overwritten
    ///
    /// Non-global entries of another ASID are not in the host cache (it is
    /// flushed on every ASID change), so nothing needs to happen. With
    /// `use_extra` the old entry moves to a shadow slot while there is room;
    /// otherwise the host pages it covered are dropped.
    pub fn invalidate(&mut self, idx: usize, use_extra: bool, asid: u8, seg_mask: u64) {
        let entry = self.entries[idx];
        if !entry.global && entry.asid != asid {
            return;
        }

        if use_extra && self.tlb_in_use < MIPS_TLB_MAX {
            self.entries[self.tlb_in_use] = entry;
            self.tlb_in_use += 1;
            log::trace!("TLB slot {} shadowed to {}", idx, self.tlb_in_use - 1);
            return;
        }

        let mask = entry.mask();
        let fixup = |mut addr: u64| {
            if addr >= (0xFFFF_FFFF_8000_0000 & seg_mask) && seg_mask != u64::MAX {
                addr |= 0x3FFF_FF00_0000_0000;
            }
            addr
        };

        if entry.pages[0].valid {
            let start = fixup(entry.vpn & !mask);
            self.host.flush_range(start, start | (mask >> 1));
        }
        if entry.pages[1].valid {
            let start = fixup((entry.vpn & !mask) | ((mask >> 1) + 1));
            self.host.flush_range(start, start | (mask >> 1));
        }
    }

    /// Drop shadow entries down to slot `first`
    pub fn flush_extra(&mut self, first: usize, asid: u8, seg_mask: u64) {
        while self.tlb_in_use > first {
            self.tlb_in_use -= 1;
            self.invalidate(self.tlb_in_use, false, asid, seg_mask);
        }
    }

    /// Flush the host cache and every shadow entry
    pub fn flush(&mut self) {
        self.host.flush_all();
        self.tlb_in_use = self.nb_tlb;
    }

    pub fn fill(&mut self, idx: usize, entry: TlbEntry) {
        self.entries[idx] = entry;
    }

    /// Index of the architectural entry matching `vpn` in `asid`
    pub fn probe(&self, vpn: u64, asid: u8) -> Option<usize> {
        self.entries[..self.nb_tlb]
            .iter()
            .position(|entry| entry.matches(vpn, asid))
    }

    /// Index of the first shadow entry matching `vpn` in `asid`
    pub fn probe_shadow(&self, vpn: u64, asid: u8) -> Option<usize> {
        (self.nb_tlb..self.tlb_in_use).find(|&i| self.entries[i].matches(vpn, asid))
    }

    /// Translate `vaddr` through every live entry, shadows included
    pub fn map_address(&self, vaddr: u64, asid: u8, write: bool, seg_mask: u64) -> TlbLookup {
        for entry in &self.entries[..self.tlb_in_use] {
            let mask = entry.mask();
            let tag = vaddr & !mask & seg_mask;
            if !((entry.global || entry.asid == asid) && entry.vpn & !mask == tag) {
                continue;
            }

            let odd = vaddr & mask & !(mask >> 1) != 0;
            let page = entry.pages[odd as usize];
            if !page.valid {
                return TlbLookup::Invalid;
            }
            if write && !page.dirty {
                return TlbLookup::Modified;
            }
            return TlbLookup::Match {
                paddr: page.pfn | (vaddr & (mask >> 1)),
                writable: page.dirty,
            };
        }
        TlbLookup::Refill
    }

    pub fn snapshot(&self) -> TlbState {
        TlbState {
            entries: self.entries.clone(),
            tlb_in_use: self.tlb_in_use,
            prev_random: self.prev_random,
        }
    }

    /// Restore contents captured by [`Tlb::snapshot`]; the host cache starts empty
    pub fn restore(&mut self, state: &TlbState) -> crate::core::error::Result<()> {
        if state.entries.len() != MIPS_TLB_MAX || state.tlb_in_use < self.nb_tlb {
            return Err(crate::core::error::EmulatorError::SaveStateMismatch(format!(
                "TLB snapshot has {} slots, {} in use",
                state.entries.len(),
                state.tlb_in_use
            )));
        }
        self.entries = state.entries.clone();
        self.tlb_in_use = state.tlb_in_use.min(MIPS_TLB_MAX);
        self.prev_random = state.prev_random;
        self.host.flush_all();
        Ok(())
    }
}

impl std::fmt::Debug for Tlb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tlb")
            .field("nb_tlb", &self.nb_tlb)
            .field("tlb_in_use", &self.tlb_in_use)
            .field("host_pages", &self.host.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_lo(paddr: u64, global: bool) -> u64 {
        ((paddr >> 12) << 6) | 0x6 | global as u64
    }

    fn entry(vpn: u64, asid: u8, global: bool) -> TlbEntry {
        TlbEntry::from_cp0(
            vpn | asid as u64,
            entry_lo(0x1000, global),
            entry_lo(0x2000, global),
            0,
            u64::MAX,
        )
    }

    #[test]
    fn test_lfsr_sequence() {
        let mut lfsr = Lfsr::new(1);
        assert_eq!(lfsr.next_u32(), 0xD000_0001);
        assert_eq!(lfsr.next_u32(), 0xB800_0001);
        assert_eq!(Lfsr::new(0), Lfsr::new(1));
    }

    #[test]
    fn test_random_index_range() {
        let mut tlb = Tlb::new(16, Box::new(Lfsr::default()));
        let mut prev = None;
        for _ in 0..100 {
            let idx = tlb.random_index(4);
            assert!((4..16).contains(&idx));
            assert_ne!(Some(idx), prev);
            prev = Some(idx);
        }
        // Wired covering the table leaves a single slot
        assert_eq!(tlb.random_index(40), 15);
        assert_eq!(tlb.random_index(40), 15);
    }

    #[test]
    fn test_match_respects_asid_and_global() {
        let private = entry(0x0040_0000, 5, false);
        assert!(private.matches(0x0040_0000, 5));
        assert!(private.matches(0x0040_1FFF, 5));
        assert!(!private.matches(0x0040_0000, 6));
        assert!(!private.matches(0x0040_2000, 5));

        let global = entry(0x0040_0000, 5, true);
        assert!(global.matches(0x0040_0000, 9));
    }

    #[test]
    fn test_page_mask_widens_match() {
        // 16KB pages: mask covers bits 14..13
        let mut e = entry(0x0040_0000, 1, false);
        e.page_mask = 0x6000;
        assert!(e.matches(0x0040_7000, 1));
        assert!(!e.matches(0x0040_8000, 1));
    }

    #[test]
    fn test_map_address_even_odd_pages() {
        let mut tlb = Tlb::new(4, Box::new(Lfsr::default()));
        tlb.fill(0, entry(0x0040_0000, 1, false));

        assert_eq!(
            tlb.map_address(0x0040_0123, 1, false, u64::MAX),
            TlbLookup::Match {
                paddr: 0x1123,
                writable: true
            }
        );
        assert_eq!(
            tlb.map_address(0x0040_1004, 1, false, u64::MAX),
            TlbLookup::Match {
                paddr: 0x2004,
                writable: true
            }
        );
        assert_eq!(tlb.map_address(0x0040_0000, 2, false, u64::MAX), TlbLookup::Refill);
    }

    #[test]
    fn test_map_address_invalid_and_modified() {
        let mut tlb = Tlb::new(4, Box::new(Lfsr::default()));
        let mut e = entry(0x0040_0000, 1, false);
        e.pages[0].dirty = false;
        e.pages[1].valid = false;
        tlb.fill(1, e);

        assert_eq!(tlb.map_address(0x0040_0000, 1, true, u64::MAX), TlbLookup::Modified);
        assert_eq!(tlb.map_address(0x0040_1000, 1, false, u64::MAX), TlbLookup::Invalid);
    }

    #[test]
    fn test_invalidate_shadows_then_flushes() {
        let mut tlb = Tlb::new(2, Box::new(Lfsr::default()));
        tlb.fill(0, entry(0x0040_0000, 1, false));

        tlb.invalidate(0, true, 1, u64::MAX);
        assert_eq!(tlb.tlb_in_use(), 3);
        assert_eq!(tlb.entry(2), tlb.entry(0));

        tlb.host_mut().insert(0x0040_0000, 0x1000, true);
        tlb.host_mut().insert(0x0040_1000, 0x2000, true);
        tlb.host_mut().insert(0x0080_0000, 0x3000, true);
        tlb.flush_extra(2, 1, u64::MAX);
        assert_eq!(tlb.tlb_in_use(), 2);
        assert!(!tlb.host().contains(0x0040_0000));
        assert!(!tlb.host().contains(0x0040_1000));
        assert!(tlb.host().contains(0x0080_0000));
    }

    #[test]
    fn test_invalidate_skips_foreign_asid() {
        let mut tlb = Tlb::new(2, Box::new(Lfsr::default()));
        tlb.fill(0, entry(0x0040_0000, 1, false));
        tlb.host_mut().insert(0x0040_0000, 0x1000, true);

        tlb.invalidate(0, true, 2, u64::MAX);
        assert_eq!(tlb.tlb_in_use(), 2);
        assert!(tlb.host().contains(0x0040_0000));
    }

    #[test]
    fn test_cp0_image_round_trip() {
        let e = TlbEntry::from_cp0(0x1234_6042, 0x0000_0047, 0x0000_0087, 0x1FFF_E000, u64::MAX);
        let (hi, lo0, lo1, mask) = e.to_cp0();
        assert_eq!(hi, 0x1234_6042 & !0x1FFF | 0x42);
        assert_eq!(lo0, 0x47);
        assert_eq!(lo1, 0x87);
        assert_eq!(mask, 0x1FFF_E000);
    }
}
