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

//! MIPS Global Interrupt Controller (GIC)
//!
//! The GIC routes up to 256 external interrupt sources to (VPE, pin) pairs
//! and gives every VPE a local compare timer running off one shared 100 MHz
//! counter.
//!
//! ## Routing
//!
//! Each source has an enable bit, a pending bit and a routing pair
//! (`map_vpe`, `map_pin`). GIC pin `n` of a VPE drives CPU interrupt input
//! `n + 2` (Cause.IP2 upwards). Several sources may share one pin; the pin
//! level is the OR of every enabled source mapped there plus the VPE's
//! compare interrupt when it is routed to the same pin and unmasked.
//!
//! ## Local Timers
//!
//! The shared counter is stored lazily: `sh_counterlo` is a base value and
//! the live count is `sh_counterlo + now / 10ns`. Each VPE timer is a
//! deadline for the moment the live count reaches that VPE's COMPARE_LO.
//!
//! ## Register Access
//!
//! See [`registers`] for the layout. Every access names the requesting CPU
//! so that the VPE-local block can be banked.
//!
//! # Example
//!
//! ```
//! use mipsmt::core::gic::{registers::*, Gic, GicConfig};
//! use mipsmt::core::interrupt::InterruptLines;
//! use mipsmt::core::timing::VirtualClock;
//! use std::rc::Rc;
//!
//! let clock = Rc::new(VirtualClock::new());
//! let lines = InterruptLines::shared(1);
//! let mut gic = Gic::new(GicConfig::default(), clock, lines.clone()).unwrap();
//!
//! // Route source 3 to VPE 0, pin 1 and enable it
//! gic.write(0, GIC_SH_MAP0_PIN_OFS + 3 * 4, 4, (GIC_MAP_TO_PIN_MSK | 1) as u64);
//! gic.write(0, GIC_SH_MAP0_VPE31_0_OFS + 3 * 0x20, 4, 1);
//! gic.write(0, GIC_SH_SMASK_31_0_OFS, 4, 1 << 3);
//!
//! gic.set_irq(3, true);
//! assert!(lines.borrow().level(0, 1 + GIC_CPU_PIN_OFFSET));
//! ```

mod access;
pub mod registers;
mod timer;

#[cfg(test)]
mod tests;

use crate::core::error::{EmulatorError, Result};
use crate::core::interrupt::{pins, SharedInterruptLines};
use crate::core::memory::MmioDevice;
use crate::core::timing::{LocalTimer, VirtualClock};
use registers::*;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// GIC construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GicConfig {
    /// Number of VPEs served (at most [`GIC_MAX_VPS`])
    pub num_cpu: usize,
    /// Number of interrupt sources (at most [`GIC_MAX_INTRS`])
    pub num_irq: usize,
}

impl Default for GicConfig {
    fn default() -> Self {
        Self {
            num_cpu: 1,
            num_irq: GIC_MAX_INTRS,
        }
    }
}

impl GicConfig {
    /// Check the limits the hardware model can represent
    pub fn validate(&self) -> Result<()> {
        if self.num_cpu > GIC_MAX_VPS {
            return Err(EmulatorError::TooManyCpus {
                got: self.num_cpu,
                max: GIC_MAX_VPS,
            });
        }
        if self.num_cpu == 0 {
            return Err(EmulatorError::NoCpus);
        }
        if self.num_irq > GIC_MAX_INTRS {
            return Err(EmulatorError::TooManyIrqs {
                got: self.num_irq,
                max: GIC_MAX_INTRS,
            });
        }
        Ok(())
    }
}

/// State of one interrupt source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptSource {
    pub enabled: bool,
    pub pending: bool,
    pub polarity: bool,
    pub trigger_type: bool,
    pub dual_edge: bool,
    /// Raw SH_MAP<n>_PIN value: pin number plus routing flags
    pub map_pin: u32,
    /// Target VPE, `None` when unmapped
    pub map_vpe: Option<usize>,
}

impl Default for InterruptSource {
    fn default() -> Self {
        Self {
            enabled: false,
            pending: false,
            polarity: false,
            trigger_type: false,
            dual_edge: false,
            map_pin: GIC_MAP_TO_NMI_MSK,
            map_vpe: None,
        }
    }
}

impl InterruptSource {
    /// Output pin selected by the map register
    #[inline]
    pub fn pin(&self) -> u32 {
        self.map_pin & GIC_MAP_MSK
    }
}

/// Per-VPE register bank and local timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpeState {
    pub ctl: u32,
    pub pend: u32,
    pub mask: u32,
    pub wd_map: u32,
    pub compare_map: u32,
    pub timer_map: u32,
    pub comparelo: u32,
    pub comparehi: u32,
    /// VPE addressed by this VPE's "other" register block
    pub other_addr: usize,
    pub timer: LocalTimer,
}

impl Default for VpeState {
    fn default() -> Self {
        Self {
            ctl: 0,
            pend: 0,
            mask: 0,
            wd_map: GIC_MAP_TO_NMI_MSK,
            compare_map: GIC_MAP_TO_PIN_MSK | GIC_DEFAULT_LOCAL_PIN,
            timer_map: GIC_MAP_TO_PIN_MSK | GIC_DEFAULT_LOCAL_PIN,
            comparelo: 0,
            comparehi: 0,
            other_addr: 0,
            timer: LocalTimer::new(),
        }
    }
}

impl VpeState {
    /// Whether the local compare interrupt is pending and unmasked
    #[inline]
    fn compare_asserted(&self) -> bool {
        self.pend & self.mask & GIC_VPE_MASK_CMP_MSK != 0
    }
}

/// Serializable GIC register state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GicState {
    pub sh_config: u32,
    pub sh_counterlo: u32,
    pub irq_state: Vec<InterruptSource>,
    pub vps: Vec<VpeState>,
}

/// Global Interrupt Controller
pub struct Gic {
    num_cpu: usize,
    num_irq: usize,
    sh_config: u32,
    sh_counterlo: u32,
    irq_state: Vec<InterruptSource>,
    vps: Vec<VpeState>,
    clock: Rc<VirtualClock>,
    lines: SharedInterruptLines,
}

impl Gic {
    /// Create and reset a GIC
    ///
    /// Every VPE needs a CPU on the interrupt line fabric; a fabric with
    /// fewer CPUs than `num_cpu` is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `num_cpu`/`num_irq` exceed the
    /// hardware limits or a VPE has no CPU to drive.
    pub fn new(
        config: GicConfig,
        clock: Rc<VirtualClock>,
        lines: SharedInterruptLines,
    ) -> Result<Self> {
        config.validate()?;

        let registered = lines.borrow().num_cpus();
        if registered < config.num_cpu {
            return Err(EmulatorError::CpuNotRegistered(registered));
        }

        let mut gic = Self {
            num_cpu: config.num_cpu,
            num_irq: config.num_irq,
            sh_config: 0,
            sh_counterlo: 0,
            irq_state: vec![InterruptSource::default(); config.num_irq],
            vps: vec![VpeState::default(); config.num_cpu],
            clock,
            lines,
        };
        gic.reset();

        log::debug!(
            "GIC created: {} VPEs, {} interrupt sources",
            gic.num_cpu,
            gic.num_irq
        );
        Ok(gic)
    }

    /// Hardware reset
    ///
    /// The shared counter comes out of reset stopped, so all local timers
    /// are idle until software clears COUNTSTOP.
    pub fn reset(&mut self) {
        let numintrs = (self.num_irq / 8).saturating_sub(1) as u32;

        self.sh_config = GIC_SH_CONFIG_COUNTSTOP_MSK
            | (numintrs << GIC_SH_CONFIG_NUMINTRS_SHF)
            | self.num_cpu as u32;
        self.sh_counterlo = 0;

        self.vps.iter_mut().for_each(|vp| *vp = VpeState::default());
        self.irq_state
            .iter_mut()
            .for_each(|source| *source = InterruptSource::default());

        let mut lines = self.lines.borrow_mut();
        for vp in 0..self.num_cpu {
            for pin in pins::GIC_BASE..pins::COUNT {
                lines.lower(vp, pin);
            }
        }
    }

    /// Drive interrupt source `n` to `level`
    ///
    /// Called when an upstream device toggles a GIC input. The pending bit
    /// is updated even for disabled sources; the output pin is recomputed
    /// only when the source is mapped to a VPE.
    pub fn set_irq(&mut self, n: usize, level: bool) {
        let Some(source) = self.irq_state.get_mut(n) else {
            log::warn!("GIC set_irq for unknown source {}", n);
            return;
        };
        source.pending = level;

        log::trace!("GIC source {} -> {}", n, level);
        self.refresh_source(n);
    }

    /// Recompute the output pin a source is routed to
    ///
    /// Disabled sources never raise their pin; lowering always goes through
    /// the OR scan so siblings keep the pin asserted.
    fn refresh_source(&mut self, n: usize) {
        let source = self.irq_state[n];
        if let Some(vpe) = source.map_vpe.filter(|&vpe| vpe < self.num_cpu) {
            self.set_vp_irq(vpe, source.pin(), source.enabled && source.pending);
        }
    }

    /// Change the routing of source `n`, moving its contribution along
    fn remap_source(&mut self, n: usize, remap: impl FnOnce(&mut InterruptSource)) {
        let Some(source) = self.irq_state.get_mut(n) else {
            return;
        };
        let (old_vpe, old_pin) = (source.map_vpe, source.pin());
        remap(source);

        if let Some(vpe) = old_vpe.filter(|&vpe| vpe < self.num_cpu) {
            self.set_vp_irq(vpe, old_pin, false);
        }
        self.refresh_source(n);
    }

    /// Update the output level of one (VPE, pin) pair
    ///
    /// A raised level goes straight out. A lowered level is only propagated
    /// if no other enabled source mapped to the pair is pending and the
    /// local compare interrupt is not asserted on it.
    fn set_vp_irq(&mut self, vpe: usize, pin: u32, level: bool) {
        let mut ored_level = level;

        if !ored_level {
            ored_level = self.irq_state.iter().any(|source| {
                source.enabled && source.pending && source.map_vpe == Some(vpe) && source.pin() == pin
            });

            let vp = &self.vps[vpe];
            if vp.compare_map & GIC_MAP_MSK == pin && vp.compare_asserted() {
                ored_level = true;
            }
        }

        self.lines
            .borrow_mut()
            .set_level(vpe, pin as usize + GIC_CPU_PIN_OFFSET, ored_level);
    }

    /// VPE index addressed by an access from CPU `cpu`
    ///
    /// A single-VPE GIC ignores the requester.
    #[inline]
    fn current_vp(&self, cpu: usize) -> usize {
        if self.num_cpu > 1 {
            cpu
        } else {
            0
        }
    }

    pub fn num_cpu(&self) -> usize {
        self.num_cpu
    }

    pub fn num_irq(&self) -> usize {
        self.num_irq
    }

    pub fn sh_config(&self) -> u32 {
        self.sh_config
    }

    /// Interrupt source `n`, if it exists
    pub fn source(&self, n: usize) -> Option<&InterruptSource> {
        self.irq_state.get(n)
    }

    /// Register bank of VPE `vp`, if it exists
    pub fn vpe(&self, vp: usize) -> Option<&VpeState> {
        self.vps.get(vp)
    }

    /// Capture the register state for a save state
    pub fn snapshot(&self) -> GicState {
        GicState {
            sh_config: self.sh_config,
            sh_counterlo: self.sh_counterlo,
            irq_state: self.irq_state.clone(),
            vps: self.vps.clone(),
        }
    }

    /// Restore register state captured by [`Gic::snapshot`]
    ///
    /// # Errors
    ///
    /// Fails if the snapshot was taken from a GIC of a different size.
    pub fn restore(&mut self, state: &GicState) -> Result<()> {
        if state.irq_state.len() != self.num_irq || state.vps.len() != self.num_cpu {
            return Err(EmulatorError::SaveStateMismatch(format!(
                "GIC has {} VPEs/{} sources, snapshot has {}/{}",
                self.num_cpu,
                self.num_irq,
                state.vps.len(),
                state.irq_state.len()
            )));
        }
        self.sh_config = state.sh_config;
        self.sh_counterlo = state.sh_counterlo;
        self.irq_state = state.irq_state.clone();
        self.vps = state.vps.clone();
        Ok(())
    }
}

impl MmioDevice for Gic {
    fn size(&self) -> u64 {
        GIC_ADDRSPACE_SZ
    }

    fn read(&mut self, cpu: usize, offset: u64, size: u32) -> u64 {
        Gic::read(self, cpu, offset, size)
    }

    fn write(&mut self, cpu: usize, offset: u64, size: u32, value: u64) {
        Gic::write(self, cpu, offset, size, value)
    }

    fn name(&self) -> &str {
        "mips-gic"
    }
}
