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

//! Per-technology session state
//!
//! A [`TestSession`] holds everything the test functions of one technology
//! share between invocations: the executive's test id, the DUT handle
//! returned by DLL registration, the reload flag, whether a tester is
//! connected and the current global settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LibraryError;
use super::settings::GlobalSettings;

/// Radio technology a test library serves
///
/// Names parse case-insensitively (`BT`, `Bluetooth`, `WiFi`, `WLAN`) both
/// through [`FromStr`] and when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Technology {
    #[serde(rename = "BT")]
    Bluetooth,
    #[serde(rename = "WiFi")]
    Wifi,
}

impl Technology {
    /// Prefix used in messages and DUT registration (`BT`, `WiFi`)
    pub fn prefix(self) -> &'static str {
        match self {
            Technology::Bluetooth => "BT",
            Technology::Wifi => "WiFi",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.prefix())
    }
}

impl FromStr for Technology {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BT" | "BLUETOOTH" => Ok(Technology::Bluetooth),
            "WIFI" | "WLAN" => Ok(Technology::Wifi),
            _ => Err(LibraryError::UnknownTechnology(s.to_string())),
        }
    }
}

impl TryFrom<String> for Technology {
    type Error = LibraryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.trim().parse()
    }
}

/// Opaque DUT handle returned by DLL registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DutHandle(pub i32);

impl DutHandle {
    pub const INVALID: DutHandle = DutHandle(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for DutHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for DutHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State shared by the test functions of one technology
#[derive(Debug, Clone)]
pub struct TestSession {
    technology: Technology,
    /// Test id assigned by the executive
    pub test_id: i32,
    pub dut: DutHandle,
    /// Re-register the DUT DLL on every insertion
    pub reload_dut_dll: bool,
    pub tester_connected: bool,
    pub settings: GlobalSettings,
}

impl TestSession {
    pub fn new(technology: Technology, test_id: i32) -> Self {
        Self {
            technology,
            test_id,
            dut: DutHandle::INVALID,
            reload_dut_dll: true,
            tester_connected: false,
            settings: GlobalSettings::default(),
        }
    }

    pub fn technology(&self) -> Technology {
        self.technology
    }

    /// Forget the DUT handle after the DLL is unloaded
    pub fn invalidate_dut(&mut self) {
        self.dut = DutHandle::INVALID;
    }
}
