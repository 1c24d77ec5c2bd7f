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

//! Flow scripts and the flow runner
//!
//! A flow is a TOML list of steps, each naming a technology, a function
//! keyword and its inputs:
//!
//! ```toml
//! stop_on_error = true
//!
//! [[step]]
//! technology = "WiFi"
//! function = "TX_VERIFY_EVM"
//! [step.inputs]
//! FREQ_MHZ = 2437
//! DATA_RATE = "OFDM-54"
//! ```
//!
//! The [`FlowRunner`] plays the executive's role: it stages the inputs,
//! invokes the function through the technology's [`TestLibrary`] and
//! collects what the function published into a [`FlowReport`].

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::command::{Instruments, ReturnCode, ERROR_MESSAGE};
use super::error::Result;
use super::executive::InMemoryExecutive;
use super::iqmeasure::RfTester;
use super::library::TestLibrary;
use super::parameter::ParamValue;
use super::session::Technology;
use super::settings::GlobalSettings;
use super::vdut::DutControl;

/// Parsed flow script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Skip the remaining steps after the first failure
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One function invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub technology: Technology,
    pub function: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, ParamValue>,
}

impl Flow {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let flow = Self::from_toml_str(&text)?;
        log::info!("Loaded flow {} ({} steps)", path.display(), flow.steps.len());
        Ok(flow)
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub technology: Technology,
    pub function: String,
    pub code: ReturnCode,
    pub message: String,
    /// Published returns except `ERROR_MESSAGE`
    pub returns: BTreeMap<String, ParamValue>,
    pub elapsed_ms: f64,
}

impl StepReport {
    pub fn passed(&self) -> bool {
        self.code.is_ok()
    }
}

/// Outcome of a whole flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub started: DateTime<Local>,
    pub steps: Vec<StepReport>,
    /// Steps not run because an earlier step failed
    pub skipped: usize,
    pub passed: bool,
}

impl FlowReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.passed())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("Flow report written to {}", path.display());
        Ok(())
    }
}

/// Runs flows against one DUT layer and one tester
///
/// Both technology libraries share the collaborators, the way a station
/// shares one tester between its Wi-Fi and Bluetooth plugins.
pub struct FlowRunner<D: DutControl, T: RfTester> {
    executive: InMemoryExecutive,
    dut: D,
    tester: T,
    wifi: TestLibrary,
    bluetooth: TestLibrary,
}

impl<D: DutControl, T: RfTester> FlowRunner<D, T> {
    pub fn new(dut: D, tester: T) -> Self {
        Self {
            executive: InMemoryExecutive::new(),
            dut,
            tester,
            wifi: TestLibrary::wifi(),
            bluetooth: TestLibrary::bluetooth(),
        }
    }

    /// Start both libraries from `settings` instead of the defaults
    pub fn with_settings(mut self, settings: GlobalSettings) -> Self {
        self.wifi.apply_settings(settings.clone());
        self.bluetooth.apply_settings(settings);
        self
    }

    pub fn library(&self, technology: Technology) -> &TestLibrary {
        match technology {
            Technology::Wifi => &self.wifi,
            Technology::Bluetooth => &self.bluetooth,
        }
    }

    pub fn dut(&self) -> &D {
        &self.dut
    }

    pub fn tester(&self) -> &T {
        &self.tester
    }

    pub fn executive(&self) -> &InMemoryExecutive {
        &self.executive
    }

    /// Run every step of `flow` in order
    pub fn run(&mut self, flow: &Flow) -> FlowReport {
        let started = Local::now();
        let mut steps = Vec::with_capacity(flow.steps.len());

        for (index, step) in flow.steps.iter().enumerate() {
            let report = self.run_step(index, step);
            let failed = !report.passed();
            steps.push(report);

            if failed && flow.stop_on_error {
                log::warn!(
                    "Step {} ({}) failed, skipping the remaining {} steps",
                    index + 1,
                    step.function,
                    flow.steps.len() - index - 1
                );
                break;
            }
        }

        let skipped = flow.steps.len() - steps.len();
        let passed = skipped == 0 && steps.iter().all(StepReport::passed);
        log::info!(
            "Flow finished: {} of {} steps passed",
            steps.iter().filter(|s| s.passed()).count(),
            flow.steps.len()
        );

        FlowReport {
            started,
            steps,
            skipped,
            passed,
        }
    }

    fn run_step(&mut self, index: usize, step: &Step) -> StepReport {
        let library = match step.technology {
            Technology::Wifi => &mut self.wifi,
            Technology::Bluetooth => &mut self.bluetooth,
        };
        let test_id = library.test_id();

        self.executive.clear_inputs(test_id);
        for (name, value) in &step.inputs {
            self.executive.set_input(test_id, name, value.clone());
        }

        log::info!("[{}] Step {}: {}", step.technology, index + 1, step.function);
        let start = Instant::now();
        let code = {
            let mut instruments = Instruments {
                executive: &mut self.executive,
                dut: &mut self.dut,
                tester: &mut self.tester,
            };
            library.invoke(&step.function, &mut instruments)
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;

        let mut message = String::new();
        let mut returns = BTreeMap::new();
        for published in self.executive.returns(test_id) {
            if published.name == ERROR_MESSAGE.name() {
                message = published.value.as_str().unwrap_or_default().to_string();
            } else {
                returns.insert(published.name.clone(), published.value.clone());
            }
        }

        StepReport {
            index,
            technology: step.technology,
            function: step.function.clone(),
            code,
            message,
            returns,
            elapsed_ms,
        }
    }
}
