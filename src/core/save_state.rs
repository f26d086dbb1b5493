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
//! Machine snapshots
//!
//! A [`SaveState`] captures everything needed to resume a [`Machine`]
//! exactly where it stopped.
//!
//! # Save State Format
//!
//! Save states are serialized using bincode (standard configuration). The
//! state includes:
//! - Metadata (format version, timestamp, CPU model)
//! - Per-CPU state (TC register files, CP0, MVP block, TLB, FPU/MSA control)
//! - GIC state (shared registers, per-source routing, per-VPE local block)
//! - Virtual clock
//! - Interrupt line levels
//!
//! The same structure can be dumped as pretty-printed JSON for inspection.
//!
//! # Version Compatibility
//!
//! Loading a save state written with a different [`SAVE_STATE_VERSION`]
//! fails with [`EmulatorError::IncompatibleSaveState`]. Restoring into a
//! machine of a different shape fails with
//! [`EmulatorError::SaveStateMismatch`].
//!
//! # Example
//!
//! ```no_run
//! use mipsmt::core::config::MachineConfig;
//! use mipsmt::core::save_state::SaveState;
//! use mipsmt::core::system::Machine;
//!
//! let mut machine = Machine::new(&MachineConfig::default()).unwrap();
//! machine.advance(1_000);
//!
//! SaveState::from_machine(&machine).save_to_file("machine.state").unwrap();
//!
//! // Later, on a machine built from the same configuration
//! let state = SaveState::load_from_file("machine.state").unwrap();
//! state.apply_to(&mut machine).unwrap();
//! ```

use super::cpu::CpuState;
use super::error::{EmulatorError, Result};
use super::gic::GicState;
use super::interrupt::InterruptLines;
use super::system::Machine;
use super::timing::Nanoseconds;
use bincode::{config, Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Save state version for compatibility checking
///
/// Incremented whenever the format changes in a way that breaks loading
/// older files.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Complete machine save state
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
#[bincode(encode_bounds = "", decode_bounds = "")]
pub struct SaveState {
    /// Version number for compatibility checking
    pub version: u32,

    pub metadata: SaveStateMetadata,

    /// One entry per CPU, indexed by VPE number
    #[bincode(with_serde)]
    pub cpus: Vec<CpuState>,

    #[bincode(with_serde)]
    pub gic: GicState,

    /// Virtual time at capture
    pub clock_ns: Nanoseconds,

    #[bincode(with_serde)]
    pub lines: InterruptLines,
}

/// When and from what the save state was captured
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
#[bincode(encode_bounds = "", decode_bounds = "")]
pub struct SaveStateMetadata {
    /// Timestamp when the save state was created
    #[bincode(with_serde)]
    pub timestamp: DateTime<Utc>,

    /// CPU model name
    pub model: String,

    pub num_cpus: u32,
}

impl SaveState {
    /// Capture the current state of `machine`
    pub fn from_machine(machine: &Machine) -> Self {
        let cpus: Vec<CpuState> = machine.cpus().iter().map(|cpu| cpu.snapshot()).collect();
        let state = Self {
            version: SAVE_STATE_VERSION,
            metadata: SaveStateMetadata {
                timestamp: Utc::now(),
                model: machine.model().name.to_string(),
                num_cpus: cpus.len() as u32,
            },
            cpus,
            gic: machine.gic().borrow().snapshot(),
            clock_ns: machine.now_ns(),
            lines: machine.lines().borrow().clone(),
        };
        log::debug!(
            "Captured save state: {} x {} at {}ns",
            state.metadata.num_cpus,
            state.metadata.model,
            state.clock_ns
        );
        state
    }

    /// Restore `machine` to this state
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::SaveStateMismatch`] if the machine was built
    /// with a different CPU count, CPU model, TC count or GIC size. The
    /// machine may be partially restored when this happens.
    pub fn apply_to(&self, machine: &mut Machine) -> Result<()> {
        if self.cpus.len() != machine.num_cpus()
            || self.lines.num_cpus() != machine.num_cpus()
        {
            return Err(EmulatorError::SaveStateMismatch(format!(
                "machine has {} CPUs, snapshot has {}",
                machine.num_cpus(),
                self.cpus.len()
            )));
        }

        machine.clock().restore(self.clock_ns);
        for (index, state) in self.cpus.iter().enumerate() {
            if let Some(cpu) = machine.cpu_mut(index) {
                cpu.restore(state)?;
            }
        }
        machine.gic().borrow_mut().restore(&self.gic)?;
        *machine.lines().borrow_mut() = self.lines.clone();

        log::info!(
            "Restored save state from {} ({}ns)",
            self.metadata.timestamp,
            self.clock_ns
        );
        Ok(())
    }

    /// Encode to the binary save state format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, config::standard())?)
    }

    /// Decode from the binary save state format, checking the version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (state, _): (SaveState, usize) = bincode::decode_from_slice(bytes, config::standard())?;

        if state.version != SAVE_STATE_VERSION {
            return Err(EmulatorError::IncompatibleSaveState {
                expected: SAVE_STATE_VERSION,
                got: state.version,
            });
        }
        Ok(state)
    }

    /// Save state to file
    ///
    /// # Arguments
    ///
    /// * `path` - Destination file, created or truncated
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = self.to_bytes()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&encoded)?;
        log::info!(
            "Saved state to {} ({} bytes)",
            path.as_ref().display(),
            encoded.len()
        );
        Ok(())
    }

    /// Load state from file
    ///
    /// # Errors
    ///
    /// I/O and decode failures, or [`EmulatorError::IncompatibleSaveState`]
    /// for a file written by another format version.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    /// Pretty-printed JSON dump
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MachineConfig;
    use crate::core::gic::registers::*;

    fn machine() -> Machine {
        Machine::new(&MachineConfig {
            cpus: 2,
            num_irq: 8,
            ..Default::default()
        })
        .unwrap()
    }

    /// Put the machine in a state that differs from reset everywhere
    fn dirty(machine: &mut Machine) {
        let base = machine.gic_base();
        machine.mmio_write(0, base + GIC_SH_CONFIG_OFS, 4, 0);
        machine.mmio_write(0, base + GIC_SH_MAP0_PIN_OFS, 4, (GIC_MAP_TO_PIN_MSK | 1) as u64);
        machine.mmio_write(0, base + GIC_SH_MAP0_VPE31_0_OFS, 4, 1);
        machine.mmio_write(0, base + GIC_SH_SMASK_31_0_OFS, 4, 1);
        machine.set_irq(0, true);

        let cpu0 = machine.cpu_mut(0).unwrap();
        cpu0.set_gpr(4, 0x1234);
        cpu0.switch_tc(1);
        cpu0.set_gpr(4, 0x5678);
        cpu0.store_compare(500);

        machine.advance(2_000);
    }

    #[test]
    fn test_save_state_version() {
        assert_eq!(SAVE_STATE_VERSION, 1);
    }

    #[test]
    fn test_capture_metadata() {
        let mut machine = machine();
        dirty(&mut machine);

        let state = SaveState::from_machine(&machine);
        assert_eq!(state.version, SAVE_STATE_VERSION);
        assert_eq!(state.metadata.model, "34Kf");
        assert_eq!(state.metadata.num_cpus, 2);
        assert_eq!(state.cpus.len(), 2);
        assert_eq!(state.clock_ns, 2_000);
        assert_eq!(state.lines.pending(0), 1 << 3);
    }

    #[test]
    fn test_restore_after_reset() {
        let mut machine = machine();
        dirty(&mut machine);
        let state = SaveState::from_machine(&machine);

        machine.reset();
        assert_eq!(machine.pending_lines(0), 0);

        state.apply_to(&mut machine).unwrap();
        assert_eq!(machine.now_ns(), 2_000);
        assert_eq!(machine.pending_lines(0), 1 << 3);
        assert_eq!(machine.gic().borrow().snapshot(), state.gic);

        let cpu0 = machine.cpu(0).unwrap();
        assert_eq!(cpu0.current_tc(), 1);
        assert_eq!(cpu0.gpr(4), 0x5678);
        assert_eq!(cpu0.tc(0).gpr[4], 0x1234);
        assert_eq!(cpu0.count_deadline(), state.cpus[0].count_timer.deadline());
    }

    #[test]
    fn test_binary_round_trip() {
        let mut machine = machine();
        dirty(&mut machine);
        let state = SaveState::from_machine(&machine);

        let bytes = state.to_bytes().unwrap();
        let decoded = SaveState::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.cpus, state.cpus);
        assert_eq!(decoded.gic, state.gic);
        assert_eq!(decoded.metadata.timestamp, state.metadata.timestamp);
    }

    #[test]
    fn test_save_load_file() {
        let mut machine = machine();
        dirty(&mut machine);
        let state = SaveState::from_machine(&machine);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.state");
        state.save_to_file(&path).unwrap();

        let loaded = SaveState::load_from_file(&path).unwrap();
        assert_eq!(loaded.clock_ns, 2_000);

        let mut fresh = self::machine();
        loaded.apply_to(&mut fresh).unwrap();
        assert_eq!(fresh.cpu(0).unwrap().gpr(4), 0x5678);
        assert_eq!(fresh.pending_lines(0), 1 << 3);
    }

    #[test]
    fn test_version_check() {
        let state = SaveState {
            version: 999,
            ..SaveState::from_machine(&machine())
        };
        let bytes = state.to_bytes().unwrap();

        let result = SaveState::from_bytes(&bytes);
        assert!(matches!(
            result,
            Err(EmulatorError::IncompatibleSaveState {
                expected: 1,
                got: 999
            })
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let state = SaveState::from_machine(&machine());
        let mut other = Machine::new(&MachineConfig {
            cpus: 3,
            num_irq: 8,
            ..Default::default()
        })
        .unwrap();

        assert!(matches!(
            state.apply_to(&mut other),
            Err(EmulatorError::SaveStateMismatch(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SaveState::load_from_file(dir.path().join("missing.state"));
        assert!(matches!(result, Err(EmulatorError::Io(_))));
    }

    #[test]
    fn test_json_dump() {
        let state = SaveState::from_machine(&machine());
        let json = state.to_json().unwrap();
        assert!(json.contains("\"model\": \"34Kf\""));
        assert!(json.contains("\"clock_ns\": 0"));
    }
}
