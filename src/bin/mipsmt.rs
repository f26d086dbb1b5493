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
//! Command line driver for the MIPS MT core
//!
//! Builds a machine from a TOML configuration (or the defaults), optionally
//! starts the GIC counter, raises shared sources, runs virtual time forward
//! and reports the interrupt lines of every CPU.

use clap::Parser;
use log::{error, info};
use mipsmt::core::config::MachineConfig;
use mipsmt::core::error::Result;
use mipsmt::core::gic::registers::*;
use mipsmt::core::save_state::SaveState;
use mipsmt::core::system::Machine;
use std::env;
use std::path::PathBuf;

/// Environment variable naming a config file when `--config` is absent
const CONFIG_ENV: &str = "MIPSMT_CONFIG";

/// MIPS multithreading core and GIC emulator
#[derive(Parser)]
#[command(name = "mipsmt")]
#[command(about = "MIPS MT CPU control core and GIC emulator", long_about = None)]
struct Args {
    /// Machine configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of VPEs, overriding the configuration
    #[arg(long)]
    cpus: Option<usize>,

    /// CPU model name (34Kf, MIPS64R2-generic), overriding the configuration
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Number of GIC shared interrupt sources, overriding the configuration
    #[arg(long)]
    irqs: Option<usize>,

    /// Start the GIC shared counter
    #[arg(long)]
    start_counter: bool,

    /// Raise shared source N, routed to pin 0 of VPE N % cpus (repeatable)
    #[arg(short = 'r', long = "raise", value_name = "N")]
    raise: Vec<usize>,

    /// Nanoseconds of virtual time to run
    #[arg(short = 'n', long, default_value = "0")]
    run_ns: u64,

    /// Write a save state to this file when done
    #[arg(short = 's', long, value_name = "PATH")]
    save: Option<PathBuf>,

    /// Print the final machine state as JSON
    #[arg(long)]
    dump_json: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<MachineConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => MachineConfig::load(path)?,
        None => MachineConfig::default(),
    };

    if let Some(cpus) = args.cpus {
        config.cpus = cpus;
    }
    if let Some(model) = &args.model {
        config.cpu_model = model.clone();
    }
    if let Some(irqs) = args.irqs {
        config.num_irq = irqs;
    }
    Ok(config)
}

/// Route shared source `n` to pin 0 of a VPE, enable it and raise it
fn raise_source(machine: &Machine, n: usize) {
    let vpe = n % machine.num_cpus();
    let base = machine.gic_base();
    let n64 = n as u64;

    machine.mmio_write(0, base + GIC_SH_MAP0_PIN_OFS + n64 * 4, 4, GIC_MAP_TO_PIN_MSK as u64);
    machine.mmio_write(
        0,
        base + GIC_SH_MAP0_VPE31_0_OFS + n64 * GIC_SH_MAP_VPE_STRIDE,
        4,
        1 << vpe,
    );
    machine.mmio_write(0, base + GIC_SH_SMASK_31_0_OFS + (n64 / 32) * 4, 4, 1 << (n64 % 32));
    machine.set_irq(n, true);
    info!("Raised GIC source {} -> VPE{} pin 0", n, vpe);
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let mut machine = Machine::new(&config)?;

    if args.start_counter {
        machine.mmio_write(0, machine.gic_base() + GIC_SH_CONFIG_OFS, 4, 0);
        info!("GIC shared counter started");
    }

    for &n in &args.raise {
        if n >= config.num_irq {
            error!("GIC source {} out of range (num_irq = {})", n, config.num_irq);
            continue;
        }
        raise_source(&machine, n);
    }

    if args.run_ns > 0 {
        let fired = machine.advance(args.run_ns);
        info!("Ran {}ns of virtual time, {} timer(s) fired", args.run_ns, fired);
    }
    let delivered = machine.service_interrupts();

    println!(
        "{} x {} at {}ns, {} interrupt(s) delivered",
        machine.num_cpus(),
        machine.model().name,
        machine.now_ns(),
        delivered
    );
    for cpu in machine.cpus() {
        println!(
            "  CPU{}: lines={:08b} halted={} pc=0x{:016X}",
            cpu.index(),
            machine.pending_lines(cpu.index()),
            cpu.is_halted(),
            cpu.pc()
        );
    }

    let state = SaveState::from_machine(&machine);
    if args.dump_json {
        println!("{}", state.to_json()?);
    }
    if let Some(path) = &args.save {
        state.save_to_file(path)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load .env file if present; a missing file is not an error
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    info!("mipsmt v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("{}", e);
        return Err(e);
    }
    Ok(())
}
