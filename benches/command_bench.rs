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
use iqlite::core::command::Instruments;
use iqlite::core::executive::{InMemoryExecutive, QueryKind};
use iqlite::core::iqmeasure::SimulatedTester;
use iqlite::core::library::{TestLibrary, WIFI_TEST_ID};
use iqlite::core::measure::{average, evaluate_mask, AverageMode, MaskKind};
use iqlite::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};
use iqlite::core::vdut::VirtualDut;
use std::hint::black_box;

struct Station {
    exec: InMemoryExecutive,
    vdut: VirtualDut,
    tester: SimulatedTester,
    library: TestLibrary,
}

impl Station {
    fn new() -> Self {
        Self {
            exec: InMemoryExecutive::new(),
            vdut: VirtualDut::new(),
            tester: SimulatedTester::new(),
            library: TestLibrary::wifi(),
        }
    }

    fn invoke(&mut self, keyword: &str) -> i32 {
        let mut instruments = Instruments {
            executive: &mut self.exec,
            dut: &mut self.vdut,
            tester: &mut self.tester,
        };
        self.library.invoke(keyword, &mut instruments).code()
    }

    /// DUT inserted and initialized, tester connected
    fn ready() -> Self {
        let mut station = Self::new();
        assert_eq!(station.invoke("INSERT_DUT"), 0);
        assert_eq!(station.invoke("INITIALIZE_DUT"), 0);
        assert_eq!(station.invoke("CONNECT_IQ_TESTER"), 0);
        station
    }
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    // Introspection only: lookup, query check, description
    group.bench_function("query_input", |b| {
        let mut station = Station::new();
        station.exec.set_query(WIFI_TEST_ID, QueryKind::Input);

        b.iter(|| {
            black_box(station.invoke(black_box("TX_VERIFY_EVM")));
        });
    });

    group.bench_function("unknown_keyword", |b| {
        let mut station = Station::new();

        b.iter(|| {
            black_box(station.invoke(black_box("NOT_A_FUNCTION")));
        });
    });

    group.bench_function("get_serial_number", |b| {
        let mut station = Station::ready();

        b.iter(|| {
            black_box(station.invoke("GET_SERIAL_NUMBER"));
        });
    });

    group.finish();
}

fn measurement_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("measurement");

    // Full TX_VERIFY_EVM round against the simulated tester
    for average_count in [1, 3, 10].iter() {
        group.bench_with_input(
            BenchmarkId::new("tx_verify_evm", average_count),
            average_count,
            |b, &average_count| {
                let mut station = Station::ready();
                station.library.session_mut().settings.evm_average = average_count;

                b.iter(|| {
                    black_box(station.invoke("TX_VERIFY_EVM"));
                });
            },
        );
    }

    group.bench_function("rx_verify_per", |b| {
        let mut station = Station::ready();

        b.iter(|| {
            black_box(station.invoke("RX_VERIFY_PER"));
        });
    });

    group.finish();
}

fn parameter_benchmark(c: &mut Criterion) {
    const FREQ_MHZ: ParamKey<i32> = ParamKey::new("FREQ_MHZ");
    const POWER_DBM: ParamKey<f64> = ParamKey::new("POWER_DBM");

    let mut map = ParamMap::new()
        .with(Parameter::integer(FREQ_MHZ.name(), 2412, "MHz", "Frequency"))
        .with(Parameter::double(POWER_DBM.name(), 0.0, "dBm", "Power"));

    c.bench_function("param_get", |b| {
        b.iter(|| {
            black_box(map.get(black_box(FREQ_MHZ)).unwrap());
        });
    });

    c.bench_function("param_set_coerced", |b| {
        b.iter(|| {
            map.set(black_box("POWER_DBM"), ParamValue::Integer(15)).unwrap();
        });
    });
}

fn math_benchmark(c: &mut Criterion) {
    let evm: Vec<f64> = (0..100).map(|i| -30.0 - (i % 7) as f64 * 0.5).collect();
    c.bench_function("average_log20", |b| {
        b.iter(|| {
            black_box(average(black_box(&evm), AverageMode::Log20));
        });
    });

    // 100 kHz bins over +/-40 MHz, flat in band, rolling off outside
    let x: Vec<f64> = (-400..=400).map(|i| i as f64 * 100e3).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|f| if f.abs() <= 9e6 { -20.0 } else { -20.0 - f.abs() / 1e6 * 1.5 })
        .collect();
    c.bench_function("evaluate_mask_ofdm", |b| {
        b.iter(|| {
            black_box(evaluate_mask(black_box(&x), black_box(&y), MaskKind::Ofdm).unwrap());
        });
    });
}

criterion_group!(
    benches,
    dispatch_benchmark,
    measurement_benchmark,
    parameter_benchmark,
    math_benchmark
);
criterion_main!(benches);
