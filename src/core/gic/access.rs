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

//! Register read/write decoding

use super::registers::*;
use super::{Gic, InterruptSource};
use crate::core::memory::is_valid_access_size;
use std::ops::Range;

const VPELOCAL_END: u64 = GIC_VPELOCAL_BASE_ADDR + GIC_VL_BRK_GROUP;
const VPEOTHER_END: u64 = GIC_VPEOTHER_BASE_ADDR + GIC_VL_BRK_GROUP;
const USERMODE_COUNTERLO: u64 = GIC_USERMODE_BASE_ADDR + GIC_USER_MODE_COUNTERLO;
const USERMODE_COUNTERHI: u64 = GIC_USERMODE_BASE_ADDR + GIC_USER_MODE_COUNTERHI;
const VPE_OTHER_ADDR_HI: u64 = GIC_VPE_OTHER_ADDR_OFS + 4;

impl Gic {
    /// Read `size` bytes at `addr` on behalf of CPU `cpu`
    pub fn read(&mut self, cpu: usize, addr: u64, size: u32) -> u64 {
        if !is_valid_access_size(size) {
            log::warn!("Unsupported {}-byte GIC read at offset {:#x}", size, addr);
            return 0;
        }
        let vp_index = self.current_vp(cpu);

        match addr {
            GIC_SH_CONFIG_OFS => self.sh_config as u64,
            GIC_SH_COUNTERLO_OFS => self.get_shared_count() as u64,
            GIC_SH_COUNTERHI_OFS => 0,
            GIC_SH_POL_31_0_OFS..=GIC_SH_POL_255_224_OFS => {
                self.read_bitmap(addr - GIC_SH_POL_31_0_OFS, size, |s| s.polarity)
            }
            GIC_SH_TRIG_31_0_OFS..=GIC_SH_TRIG_255_224_OFS => {
                self.read_bitmap(addr - GIC_SH_TRIG_31_0_OFS, size, |s| s.trigger_type)
            }
            GIC_SH_DUAL_31_0_OFS..=GIC_SH_DUAL_255_224_OFS => {
                self.read_bitmap(addr - GIC_SH_DUAL_31_0_OFS, size, |s| s.dual_edge)
            }
            GIC_SH_PEND_31_0_OFS..=GIC_SH_PEND_255_224_OFS => {
                self.get_shared_count();
                self.read_bitmap(addr - GIC_SH_PEND_31_0_OFS, size, |s| s.pending)
            }
            GIC_SH_MASK_31_0_OFS..=GIC_SH_MASK_255_224_OFS => {
                self.read_bitmap(addr - GIC_SH_MASK_31_0_OFS, size, |s| s.enabled)
            }
            GIC_SH_MAP0_PIN_OFS..=GIC_SH_MAP255_PIN_OFS => {
                let irq_src = ((addr - GIC_SH_MAP0_PIN_OFS) / 4) as usize;
                self.irq_state
                    .get(irq_src)
                    .map_or(0, |source| source.map_pin as u64)
            }
            GIC_SH_MAP0_VPE31_0_OFS..=GIC_SH_MAP255_VPE63_32_OFS => {
                let irq_src = ((addr - GIC_SH_MAP0_VPE31_0_OFS) / GIC_SH_MAP_VPE_STRIDE) as usize;
                self.irq_state
                    .get(irq_src)
                    .and_then(|source| source.map_vpe)
                    .map_or(0, |vpe| 1u64 << vpe)
            }
            GIC_VPELOCAL_BASE_ADDR..=VPELOCAL_END => {
                self.read_vpe(vp_index, addr - GIC_VPELOCAL_BASE_ADDR, size)
            }
            GIC_VPEOTHER_BASE_ADDR..=VPEOTHER_END => match self.vps.get(vp_index) {
                Some(vp) => {
                    let other_index = vp.other_addr;
                    self.read_vpe(other_index, addr - GIC_VPEOTHER_BASE_ADDR, size)
                }
                None => self.unknown_vp(vp_index),
            },
            USERMODE_COUNTERLO => self.get_shared_count() as u64,
            USERMODE_COUNTERHI => 0,
            _ => {
                log::warn!("Unimplemented {}-byte GIC read at offset {:#x}", size, addr);
                0
            }
        }
    }

    /// Write `size` bytes at `addr` on behalf of CPU `cpu`
    pub fn write(&mut self, cpu: usize, addr: u64, size: u32, data: u64) {
        if !is_valid_access_size(size) {
            log::warn!("Unsupported {}-byte GIC write at offset {:#x}", size, addr);
            return;
        }
        let vp_index = self.current_vp(cpu);

        match addr {
            GIC_SH_CONFIG_OFS => self.write_sh_config(data),
            GIC_SH_COUNTERLO_OFS => {
                if self.sh_config & GIC_SH_CONFIG_COUNTSTOP_MSK != 0 {
                    self.store_shared_count(data as u32);
                }
            }
            GIC_SH_COUNTERHI_OFS => {}
            GIC_SH_POL_31_0_OFS..=GIC_SH_POL_255_224_OFS => {
                self.write_bitmap(addr - GIC_SH_POL_31_0_OFS, size, data, |s, bit| {
                    s.polarity = bit
                });
            }
            GIC_SH_TRIG_31_0_OFS..=GIC_SH_TRIG_255_224_OFS => {
                self.write_bitmap(addr - GIC_SH_TRIG_31_0_OFS, size, data, |s, bit| {
                    s.trigger_type = bit
                });
            }
            GIC_SH_DUAL_31_0_OFS..=GIC_SH_DUAL_255_224_OFS => {
                self.write_bitmap(addr - GIC_SH_DUAL_31_0_OFS, size, data, |s, bit| {
                    s.dual_edge = bit
                });
            }
            GIC_SH_RMASK_31_0_OFS..=GIC_SH_RMASK_255_224_OFS => {
                let touched = self.write_bitmap(addr - GIC_SH_RMASK_31_0_OFS, size, data, |s, bit| {
                    s.enabled &= !bit
                });
                touched.for_each(|n| self.refresh_source(n));
            }
            GIC_SH_SMASK_31_0_OFS..=GIC_SH_SMASK_255_224_OFS => {
                let touched = self.write_bitmap(addr - GIC_SH_SMASK_31_0_OFS, size, data, |s, bit| {
                    s.enabled |= bit
                });
                touched.for_each(|n| self.refresh_source(n));
            }
            GIC_SH_WEDGE_OFS => {
                let intr = (data & 0x7FFF_FFFF) as usize;
                if intr < self.num_irq {
                    self.set_irq(intr, data & GIC_SH_WEDGE_RW_MSK != 0);
                }
            }
            GIC_SH_MAP0_PIN_OFS..=GIC_SH_MAP255_PIN_OFS => {
                let irq_src = ((addr - GIC_SH_MAP0_PIN_OFS) / 4) as usize;
                self.remap_source(irq_src, |source| source.map_pin = data as u32);
            }
            GIC_SH_MAP0_VPE31_0_OFS..=GIC_SH_MAP255_VPE63_32_OFS => {
                let irq_src = ((addr - GIC_SH_MAP0_VPE31_0_OFS) / GIC_SH_MAP_VPE_STRIDE) as usize;
                self.remap_source(irq_src, |source| {
                    source.map_vpe = (data != 0).then(|| data.trailing_zeros() as usize)
                });
            }
            GIC_VPELOCAL_BASE_ADDR..=VPELOCAL_END => {
                self.write_vpe(vp_index, addr - GIC_VPELOCAL_BASE_ADDR, size, data)
            }
            GIC_VPEOTHER_BASE_ADDR..=VPEOTHER_END => match self.vps.get(vp_index) {
                Some(vp) => {
                    let other_index = vp.other_addr;
                    self.write_vpe(other_index, addr - GIC_VPEOTHER_BASE_ADDR, size, data)
                }
                None => {
                    self.unknown_vp(vp_index);
                }
            },
            USERMODE_COUNTERLO | USERMODE_COUNTERHI => {}
            _ => log::warn!(
                "Unimplemented {}-byte GIC write at offset {:#x} = {:#010x}",
                size,
                addr,
                data
            ),
        }
    }

    fn read_vpe(&mut self, vp_index: usize, addr: u64, size: u32) -> u64 {
        if vp_index >= self.num_cpu {
            return self.unknown_vp(vp_index);
        }

        match addr {
            GIC_VPE_CTL_OFS => self.vps[vp_index].ctl as u64,
            GIC_VPE_PEND_OFS => {
                self.get_shared_count();
                self.vps[vp_index].pend as u64
            }
            GIC_VPE_MASK_OFS => self.vps[vp_index].mask as u64,
            GIC_VPE_WD_MAP_OFS => self.vps[vp_index].wd_map as u64,
            GIC_VPE_COMPARE_MAP_OFS => self.vps[vp_index].compare_map as u64,
            GIC_VPE_TIMER_MAP_OFS => self.vps[vp_index].timer_map as u64,
            GIC_VPE_OTHER_ADDR_OFS => self.vps[vp_index].other_addr as u64,
            GIC_VPE_IDENT_OFS => vp_index as u64,
            GIC_VPE_COMPARE_LO_OFS => self.vps[vp_index].comparelo as u64,
            GIC_VPE_COMPARE_HI_OFS => self.vps[vp_index].comparehi as u64,
            _ => {
                log::warn!(
                    "Unimplemented {}-byte GIC read at LOCAL/OTHER offset {:#x}",
                    size,
                    addr
                );
                0
            }
        }
    }

    fn write_vpe(&mut self, vp_index: usize, addr: u64, size: u32, data: u64) {
        if vp_index >= self.num_cpu {
            self.unknown_vp(vp_index);
            return;
        }

        let value = data as u32;
        match addr {
            GIC_VPE_CTL_OFS => {
                let vp = &mut self.vps[vp_index];
                vp.ctl = (vp.ctl & !GIC_VPE_CTL_EIC_MODE_MSK) | (value & GIC_VPE_CTL_EIC_MODE_MSK);
            }
            GIC_VPE_RMASK_OFS => {
                self.vps[vp_index].mask &= !(value & GIC_VPE_SET_RESET_MSK) & GIC_VPE_SET_RESET_MSK;
            }
            GIC_VPE_SMASK_OFS => {
                self.vps[vp_index].mask |= value & GIC_VPE_SET_RESET_MSK;
            }
            GIC_VPE_WD_MAP_OFS => self.vps[vp_index].wd_map = value & GIC_MAP_TO_PIN_REG_MSK,
            GIC_VPE_COMPARE_MAP_OFS => {
                self.vps[vp_index].compare_map = value & GIC_MAP_TO_PIN_REG_MSK
            }
            GIC_VPE_TIMER_MAP_OFS => self.vps[vp_index].timer_map = value & GIC_MAP_TO_PIN_REG_MSK,
            GIC_VPE_OTHER_ADDR_OFS => {
                if data < self.num_cpu as u64 {
                    self.vps[vp_index].other_addr = data as usize;
                } else {
                    log::debug!("GIC VPE[{}] OTHER_ADDR {} ignored", vp_index, data);
                }
            }
            VPE_OTHER_ADDR_HI => {}
            GIC_VPE_COMPARE_LO_OFS => self.store_vpe_compare(vp_index, data),
            GIC_VPE_COMPARE_HI_OFS => {}
            _ => log::warn!(
                "Unimplemented {}-byte GIC write at LOCAL/OTHER offset {:#x} = {:#010x}",
                size,
                addr,
                data
            ),
        }
    }

    /// Pack one flag of `size * 8` consecutive sources into a bitmap
    ///
    /// `rel` is the byte offset from the start of the register array.
    fn read_bitmap(&self, rel: u64, size: u32, flag: impl Fn(&InterruptSource) -> bool) -> u64 {
        let base = (rel * 8) as usize;
        (0..size as usize * 8)
            .filter(|i| self.irq_state.get(base + i).is_some_and(&flag))
            .fold(0u64, |acc, i| acc | (1 << i))
    }

    /// Unpack a bitmap write onto `size * 8` consecutive sources
    ///
    /// Returns the indices of the sources that exist in the written range.
    fn write_bitmap(
        &mut self,
        rel: u64,
        size: u32,
        data: u64,
        apply: impl Fn(&mut InterruptSource, bool),
    ) -> Range<usize> {
        let base = (rel * 8) as usize;
        let end = (base + size as usize * 8).min(self.irq_state.len());
        let start = base.min(end);
        for (i, source) in self.irq_state[start..end].iter_mut().enumerate() {
            apply(source, (data >> i) & 1 != 0);
        }
        start..end
    }

    fn unknown_vp(&self, vp_index: usize) -> u64 {
        log::warn!(
            "GIC access for VPE {} outside the {} configured",
            vp_index,
            self.num_cpu
        );
        0
    }
}
