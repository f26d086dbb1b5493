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

/// Emulator error types
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Result type for guest instructions that may abort with an architectural exception
pub type CpuResult<T> = std::result::Result<T, Exception>;

/// Main error type for the emulator
///
/// These are host-side failures: bad configuration, I/O and save-state
/// problems. Guest-visible faults are [`Exception`]s instead.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Exceed maximum CPUs {got} (limit {max})")]
    TooManyCpus { got: usize, max: usize },

    #[error("Exceed maximum GIC IRQs {got} (limit {max})")]
    TooManyIrqs { got: usize, max: usize },

    #[error("At least one CPU is required")]
    NoCpus,

    #[error("Unable to initialize GIC - CPU #{0} not registered")]
    CpuNotRegistered(usize),

    #[error("Unknown CPU model: {0}")]
    UnknownCpuModel(String),

    #[error("Invalid thread context count: {0} (valid range: 1-8)")]
    InvalidThreadCount(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Save state encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Save state decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Incompatible save state version: {got} (expected {expected})")]
    IncompatibleSaveState { expected: u32, got: u32 },

    #[error("Save state does not match machine: {0}")]
    SaveStateMismatch(String),

    #[error("CPU exception: {0}")]
    CpuException(#[from] Exception),
}

/// Architectural exception kinds
///
/// Each kind except [`ExceptionKind::Halt`] carries the ExcCode that is
/// written into Cause when the exception is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionKind {
    Interrupt,
    TlbModified,
    TlbLoad,
    TlbStore,
    AddressErrorLoad,
    AddressErrorStore,
    InstructionBusError,
    DataBusError,
    Syscall,
    Breakpoint,
    ReservedInstruction,
    CoprocessorUnusable,
    Overflow,
    Trap,
    MsaFloatingPoint,
    FloatingPoint,
    Thread,
    /// Raised by WAIT to leave the execution loop; never delivered to the guest
    Halt,
}

impl ExceptionKind {
    /// Cause.ExcCode value for this exception
    pub fn code(self) -> Option<u32> {
        let code = match self {
            ExceptionKind::Interrupt => 0,
            ExceptionKind::TlbModified => 1,
            ExceptionKind::TlbLoad => 2,
            ExceptionKind::TlbStore => 3,
            ExceptionKind::AddressErrorLoad => 4,
            ExceptionKind::AddressErrorStore => 5,
            ExceptionKind::InstructionBusError => 6,
            ExceptionKind::DataBusError => 7,
            ExceptionKind::Syscall => 8,
            ExceptionKind::Breakpoint => 9,
            ExceptionKind::ReservedInstruction => 10,
            ExceptionKind::CoprocessorUnusable => 11,
            ExceptionKind::Overflow => 12,
            ExceptionKind::Trap => 13,
            ExceptionKind::MsaFloatingPoint => 14,
            ExceptionKind::FloatingPoint => 15,
            ExceptionKind::Thread => 25,
            ExceptionKind::Halt => return None,
        };
        Some(code)
    }
}

/// An architectural exception aborting the current instruction
///
/// Returned through [`CpuResult`] up to the dispatch loop, which hands it to
/// exception entry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind:?} exception (error code {error_code})")]
pub struct Exception {
    pub kind: ExceptionKind,
    pub error_code: i32,
}

impl Exception {
    pub fn new(kind: ExceptionKind) -> Self {
        Self {
            kind,
            error_code: 0,
        }
    }

    pub fn with_code(kind: ExceptionKind, error_code: i32) -> Self {
        Self { kind, error_code }
    }
}
