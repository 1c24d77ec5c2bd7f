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

//! Per-technology test libraries
//!
//! A [`TestLibrary`] owns the session of one technology and the ordered
//! registry of its test functions. The executive addresses functions by
//! keyword; the library looks the function up and invokes it.
//!
//! ```text
//! executive ──"TX_VERIFY_EVM"──► TestLibrary (WiFi)
//!                                  ├── TestSession
//!                                  └── [INSERT_DUT, ..., TX_VERIFY_EVM, ...]
//!                                                            │
//!                                          invoke(session, instruments)
//! ```

use super::bt;
use super::command::{FunctionDescription, Instruments, ReturnCode, TestFunction, ERROR_MESSAGE};
use super::error::{LibraryError, Result};
use super::parameter::ParamValue;
use super::session::{Technology, TestSession};
use super::settings::GlobalSettings;
use super::wifi;

/// Test id the Wi-Fi library registers with the executive
pub const WIFI_TEST_ID: i32 = 0;

/// Test id the Bluetooth library registers with the executive
pub const BT_TEST_ID: i32 = 1;

/// Session and function registry of one technology
pub struct TestLibrary {
    session: TestSession,
    functions: Vec<TestFunction>,
}

impl TestLibrary {
    /// Wi-Fi library with test id [`WIFI_TEST_ID`]
    pub fn wifi() -> Self {
        Self::with_test_id(Technology::Wifi, WIFI_TEST_ID)
    }

    /// Bluetooth library with test id [`BT_TEST_ID`]
    pub fn bluetooth() -> Self {
        Self::with_test_id(Technology::Bluetooth, BT_TEST_ID)
    }

    /// Library for `technology` with its default test id
    pub fn new(technology: Technology) -> Self {
        match technology {
            Technology::Wifi => Self::wifi(),
            Technology::Bluetooth => Self::bluetooth(),
        }
    }

    pub fn with_test_id(technology: Technology, test_id: i32) -> Self {
        let commands = match technology {
            Technology::Wifi => wifi::commands(),
            Technology::Bluetooth => bt::commands(),
        };
        let functions = commands.into_iter().map(TestFunction::new).collect();
        log::debug!("[{}] Test library created with test id {}", technology, test_id);

        Self {
            session: TestSession::new(technology, test_id),
            functions,
        }
    }

    pub fn technology(&self) -> Technology {
        self.session.technology()
    }

    pub fn test_id(&self) -> i32 {
        self.session.test_id
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TestSession {
        &mut self.session
    }

    /// Replace the session's global settings
    pub fn apply_settings(&mut self, settings: GlobalSettings) {
        self.session.settings = settings;
    }

    /// Function keywords in registry order
    pub fn keywords(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.iter().map(|f| f.keyword())
    }

    /// Look up a function; keywords match case-insensitively
    pub fn function(&self, keyword: &str) -> Option<&TestFunction> {
        self.position(keyword).map(|i| &self.functions[i])
    }

    pub fn describe(&self, keyword: &str) -> Result<FunctionDescription<'_>> {
        self.function(keyword)
            .map(TestFunction::describe)
            .ok_or_else(|| self.unknown(keyword))
    }

    /// Invoke the function named `keyword`
    ///
    /// An unknown keyword fails like any other function: `-1` with a
    /// published `ERROR_MESSAGE`.
    pub fn invoke(&mut self, keyword: &str, instruments: &mut Instruments<'_>) -> ReturnCode {
        let Some(index) = self.position(keyword) else {
            let error = self.unknown(keyword);
            let message = format!("[{}] {}.\n", self.technology().prefix(), error);
            log::error!("{}", message.trim_end());

            let test_id = self.test_id();
            instruments.executive.clear_returns(test_id);
            instruments.executive.publish_return(
                test_id,
                ERROR_MESSAGE.name(),
                &ParamValue::Str(message),
                "",
            );
            return ReturnCode::Failed;
        };

        log::debug!("[{}] Invoking {}", self.technology(), self.functions[index].keyword());
        self.functions[index].invoke(&mut self.session, instruments)
    }

    fn position(&self, keyword: &str) -> Option<usize> {
        let keyword = keyword.trim();
        self.functions
            .iter()
            .position(|f| f.keyword().eq_ignore_ascii_case(keyword))
    }

    fn unknown(&self, keyword: &str) -> LibraryError {
        LibraryError::UnknownFunction {
            technology: self.technology().to_string(),
            function: keyword.to_string(),
        }
    }
}
