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

//! Core library components
//!
//! This module contains the test-command machinery and its collaborators:
//! - Parameter registry and the executive seam
//! - vDUT layer with the template DUT driver
//! - IQmeasure seam with the simulated tester
//! - Test-command wrapper and session state
//! - Common, Wi-Fi and Bluetooth test functions
//! - Test libraries and the flow runner

pub mod address;
pub mod bt;
pub mod command;
pub mod common;
pub mod error;
pub mod executive;
pub mod flow;
pub mod iqmeasure;
pub mod library;
pub mod measure;
pub mod parameter;
pub mod session;
pub mod settings;
pub mod vdut;
pub mod wifi;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use command::{Instruments, ReturnCode, TestCommand, TestFunction};
pub use error::{CommandError, LibraryError, Result};
pub use executive::{InMemoryExecutive, TestExecutive};
pub use flow::{Flow, FlowReport, FlowRunner};
pub use iqmeasure::{RfTester, SimulatedTester};
pub use library::TestLibrary;
pub use parameter::{ParamMap, ParamValue};
pub use session::{Technology, TestSession};
pub use settings::GlobalSettings;
pub use vdut::{DutControl, TemplateDut, VirtualDut};
