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

//! Test fixtures for common station scenarios

use std::path::{Path, PathBuf};

use iqlite::core::flow::{Flow, FlowReport, FlowRunner};
use iqlite::core::iqmeasure::SimulatedTester;
use iqlite::core::vdut::VirtualDut;

/// Route library logs through the test harness
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Flow runner with the template DUT and a simulated tester
#[allow(dead_code)]
pub fn create_station() -> FlowRunner<VirtualDut, SimulatedTester> {
    init_logger();
    FlowRunner::new(VirtualDut::new(), SimulatedTester::new())
}

/// Steps that insert the DUT and connect the tester for `technology`
#[allow(dead_code)]
pub fn bring_up(technology: &str) -> String {
    ["INSERT_DUT", "INITIALIZE_DUT", "CONNECT_IQ_TESTER"]
        .iter()
        .map(|function| step(technology, function, ""))
        .collect()
}

/// One `[[step]]` entry; `inputs` holds `KEY = value` lines
#[allow(dead_code)]
pub fn step(technology: &str, function: &str, inputs: &str) -> String {
    let mut text = format!(
        "\n[[step]]\ntechnology = \"{}\"\nfunction = \"{}\"\n",
        technology, function
    );
    if !inputs.is_empty() {
        text.push_str("[step.inputs]\n");
        text.push_str(inputs);
        text.push('\n');
    }
    text
}

/// Parse and run a flow script
#[allow(dead_code)]
pub fn run_flow(runner: &mut FlowRunner<VirtualDut, SimulatedTester>, text: &str) -> FlowReport {
    let flow = Flow::from_toml_str(text).expect("flow script parses");
    runner.run(&flow)
}

/// Write `contents` to `dir/name` and return the path
#[allow(dead_code)]
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write test file");
    path
}
