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
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mipsmt::core::config::MachineConfig;
use mipsmt::core::gic::registers::*;
use mipsmt::core::system::Machine;
use std::hint::black_box;

fn machine(cpus: usize, num_irq: usize) -> Machine {
    Machine::new(&MachineConfig {
        cpus,
        num_irq,
        ..Default::default()
    })
    .unwrap()
}

/// Route every source to pin 0 of VPE `n % cpus` and enable it
fn route_all(machine: &Machine, num_irq: usize) {
    let base = machine.gic_base();
    for n in 0..num_irq as u64 {
        let vpe = n % machine.num_cpus() as u64;
        machine.mmio_write(0, base + GIC_SH_MAP0_PIN_OFS + n * 4, 4, GIC_MAP_TO_PIN_MSK as u64);
        machine.mmio_write(0, base + GIC_SH_MAP0_VPE31_0_OFS + n * GIC_SH_MAP_VPE_STRIDE, 4, 1 << vpe);
    }
    for word in 0..(num_irq as u64).div_ceil(32) {
        machine.mmio_write(0, base + GIC_SH_SMASK_31_0_OFS + word * 4, 4, 0xFFFF_FFFF);
    }
}

fn gic_set_irq_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("gic_set_irq");

    // Lowering a pin scans every source that shares it
    for num_irq in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(num_irq), &num_irq, |b, &num_irq| {
            let machine = machine(4, num_irq);
            route_all(&machine, num_irq);
            b.iter(|| {
                machine.set_irq(black_box(0), true);
                machine.set_irq(black_box(0), false);
            });
        });
    }
    group.finish();
}

fn gic_mmio_benchmark(c: &mut Criterion) {
    c.bench_function("gic_read_pend", |b| {
        let machine = machine(2, 256);
        let addr = machine.gic_base() + GIC_SH_PEND_31_0_OFS;
        b.iter(|| black_box(machine.mmio_read(0, black_box(addr), 4)));
    });

    c.bench_function("gic_read_local_ident", |b| {
        let machine = machine(2, 256);
        let addr = machine.gic_base() + GIC_VPELOCAL_BASE_ADDR + GIC_VPE_IDENT_OFS;
        b.iter(|| black_box(machine.mmio_read(1, black_box(addr), 4)));
    });
}

fn translate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");

    group.bench_function("kseg0", |b| {
        let mut machine = machine(1, 8);
        let cpu = machine.cpu_mut(0).unwrap();
        b.iter(|| black_box(cpu.translate(black_box(0xFFFF_FFFF_8000_1000), false)));
    });

    group.bench_function("mapped", |b| {
        let mut machine = machine(1, 8);
        let cpu = machine.cpu_mut(0).unwrap();
        cpu.mtc0(12, 0, 0).unwrap();
        cpu.mtc0(10, 0, 0x0040_2000).unwrap();
        cpu.mtc0(2, 0, ((0x1000_0000u64 >> 12) << 6) | 0x6).unwrap();
        cpu.mtc0(3, 0, 0).unwrap();
        cpu.mtc0(5, 0, 0).unwrap();
        cpu.mtc0(0, 0, 0).unwrap();
        cpu.tlbwi().unwrap();
        b.iter(|| black_box(cpu.translate(black_box(0x0040_2010), false)));
    });

    group.finish();
}

fn cross_tc_benchmark(c: &mut Criterion) {
    c.bench_function("mttgpr_mftgpr", |b| {
        let mut machine = machine(2, 8);
        machine.cpu_mut(0).unwrap().mtc0(1, 1, 3).unwrap();
        b.iter(|| {
            machine.mttgpr(0, 4, black_box(0x1234)).unwrap();
            black_box(machine.mftgpr(0, 4).unwrap())
        });
    });
}

fn advance_benchmark(c: &mut Criterion) {
    c.bench_function("advance_1us", |b| {
        let mut machine = machine(4, 8);
        machine.mmio_write(0, machine.gic_base() + GIC_SH_CONFIG_OFS, 4, 0);
        b.iter(|| black_box(machine.advance(black_box(1_000))));
    });
}

criterion_group!(
    benches,
    gic_set_irq_benchmark,
    gic_mmio_benchmark,
    translate_benchmark,
    cross_tc_benchmark,
    advance_benchmark
);
criterion_main!(benches);
