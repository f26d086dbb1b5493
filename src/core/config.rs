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
//! Machine configuration
//!
//! A machine is described by a small TOML file. Every key is optional and
//! falls back to the built-in default:
//!
//! ```toml
//! # mipsmt.toml
//! cpus = 2
//! cpu_model = "34Kf"
//! threads_per_vpe = 2
//! num_irq = 256
//! gic_base = 0x1BDC0000
//! tlb_seed = 1
//! ```

use super::cpu::{CpuModel, MAX_THREADS};
use super::error::{EmulatorError, Result};
use super::gic::registers::{GIC_MAX_INTRS, GIC_MAX_VPS};
use super::gic::GicConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default physical base address of the GIC register window
pub const DEFAULT_GIC_BASE: u64 = 0x1BDC_0000;

/// Parameters of a [`crate::core::system::Machine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Number of VPEs (one `Cpu` each)
    pub cpus: usize,
    /// CPU model name, see [`CpuModel::by_name`]
    pub cpu_model: String,
    /// Thread contexts per VPE; ignored by models without MT
    pub threads_per_vpe: usize,
    /// GIC interrupt sources
    pub num_irq: usize,
    /// Physical address of the GIC window
    pub gic_base: u64,
    /// Seed of the TLBWR random index generator
    pub tlb_seed: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cpus: 2,
            cpu_model: "34Kf".to_string(),
            threads_per_vpe: 2,
            num_irq: GIC_MAX_INTRS,
            gic_base: DEFAULT_GIC_BASE,
            tlb_seed: 1,
        }
    }
}

impl MachineConfig {
    /// Parse a configuration from TOML text
    ///
    /// The result is not validated; call [`MachineConfig::validate`].
    ///
    /// # Example
    ///
    /// ```
    /// use mipsmt::core::config::MachineConfig;
    ///
    /// let config = MachineConfig::from_toml_str("cpus = 4\nnum_irq = 64").unwrap();
    /// assert_eq!(config.cpus, 4);
    /// assert_eq!(config.num_irq, 64);
    /// assert_eq!(config.cpu_model, "34Kf");
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded machine configuration from {}", path.display());
        Ok(config)
    }

    /// Check every limit the machine enforces at construction
    pub fn validate(&self) -> Result<()> {
        self.gic_config().validate()?;
        if self.threads_per_vpe == 0 || self.threads_per_vpe > MAX_THREADS {
            return Err(EmulatorError::InvalidThreadCount(self.threads_per_vpe));
        }
        self.model()?;
        Ok(())
    }

    /// Resolve the configured CPU model
    pub fn model(&self) -> Result<&'static CpuModel> {
        CpuModel::by_name(&self.cpu_model)
    }

    /// GIC parameters: one VPE per CPU
    pub fn gic_config(&self) -> GicConfig {
        GicConfig {
            num_cpu: self.cpus,
            num_irq: self.num_irq,
        }
    }
}
