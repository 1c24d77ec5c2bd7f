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

//! Station fixture shared by the unit tests

use super::command::{Instruments, ReturnCode, TestCommand, TestFunction, COMPLETED_MESSAGE};
use super::common::{ConnectTester, InitializeDut, InsertDut};
use super::executive::{InMemoryExecutive, QueryKind};
use super::iqmeasure::SimulatedTester;
use super::parameter::ParamValue;
use super::session::{Technology, TestSession};
use super::vdut::{TemplateDut, VirtualDut, TEMPLATE_DUT_DLL};

pub(crate) const TEST_ID: i32 = 0;

/// Session plus simulated collaborators
pub(crate) struct Station {
    pub session: TestSession,
    pub exec: InMemoryExecutive,
    pub vdut: VirtualDut,
    pub tester: SimulatedTester,
}

impl Station {
    pub fn new(technology: Technology) -> Self {
        Self::with_dut(technology, TemplateDut::new())
    }

    /// Station whose `TemplateDut.DLL` is served by `dut`
    pub fn with_dut(technology: Technology, dut: TemplateDut) -> Self {
        Self {
            session: TestSession::new(technology, TEST_ID),
            exec: InMemoryExecutive::new(),
            vdut: VirtualDut::empty().with_driver(TEMPLATE_DUT_DLL, dut),
            tester: SimulatedTester::new(),
        }
    }

    pub fn set_input(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.exec.set_input(TEST_ID, name, value.into());
    }

    pub fn invoke(&mut self, function: &mut TestFunction) -> ReturnCode {
        let mut instruments = Instruments {
            executive: &mut self.exec,
            dut: &mut self.vdut,
            tester: &mut self.tester,
        };
        function.invoke(&mut self.session, &mut instruments)
    }

    /// Run a command once with the inputs currently set
    pub fn run(&mut self, command: impl TestCommand + 'static) -> ReturnCode {
        let mut function = TestFunction::new(Box::new(command));
        self.invoke(&mut function)
    }

    /// Run a command and clear the inputs afterwards
    pub fn run_clean(&mut self, command: impl TestCommand + 'static) -> ReturnCode {
        let code = self.run(command);
        self.exec.clear_inputs(TEST_ID);
        code
    }

    /// Insert the template DUT; panics on failure
    pub fn insert_dut(&mut self) -> &mut Self {
        assert_eq!(self.run_clean(InsertDut), ReturnCode::Ok, "{:?}", self.message());
        self
    }

    /// Initialize the inserted DUT; panics on failure
    pub fn initialize_dut(&mut self) -> &mut Self {
        assert_eq!(self.run_clean(InitializeDut), ReturnCode::Ok, "{:?}", self.message());
        self
    }

    /// Connect the simulated tester; panics on failure
    pub fn connect_tester(&mut self) -> &mut Self {
        assert_eq!(self.run_clean(ConnectTester), ReturnCode::Ok, "{:?}", self.message());
        self
    }

    /// Initialized DUT and connected tester, tester journal cleared
    pub fn ready(technology: Technology, dut: TemplateDut) -> Self {
        let mut station = Self::with_dut(technology, dut);
        station.insert_dut().initialize_dut().connect_tester();
        station.tester.clear_calls();
        station
    }

    pub fn query(&mut self, kind: QueryKind) {
        self.exec.set_query(TEST_ID, kind);
    }

    pub fn message(&self) -> &str {
        self.exec.error_message(TEST_ID).unwrap_or_default()
    }

    pub fn completed(&self) -> bool {
        self.message() == COMPLETED_MESSAGE
    }

    pub fn value(&self, name: &str) -> &ParamValue {
        self.exec
            .return_value(TEST_ID, name)
            .unwrap_or_else(|| panic!("no return named {}", name))
    }

    pub fn double(&self, name: &str) -> f64 {
        self.value(name)
            .as_f64()
            .unwrap_or_else(|| panic!("{} is not a number", name))
    }

    pub fn integer(&self, name: &str) -> i32 {
        self.value(name)
            .as_i32()
            .unwrap_or_else(|| panic!("{} is not an integer", name))
    }

    pub fn string(&self, name: &str) -> &str {
        self.value(name)
            .as_str()
            .unwrap_or_else(|| panic!("{} is not a string", name))
    }
}
