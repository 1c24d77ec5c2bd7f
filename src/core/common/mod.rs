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

//! Functions shared by every technology library
//!
//! DUT lifecycle (`INSERT_DUT`, `INITIALIZE_DUT`, `REMOVE_DUT`), identity
//! (`GET_SERIAL_NUMBER`, address read/write), tester connection, global
//! settings, raw register and EEPROM access, free-form DUT commands and
//! external programs.

mod address;
mod dut;
mod external;
mod global;
mod registers;
mod tester;

pub use address::{ReadAddress, WriteAddress};
pub use dut::{GetSerialNumber, InitializeDut, InsertDut, RemoveDut, RunDutCommand};
pub use external::RunExternalProgram;
pub use global::GlobalSettingsCommand;
pub use registers::{RegisterAccess, RegisterSpace};
pub use tester::{ConnectTester, DisconnectTester};

use super::command::TestCommand;
use super::session::Technology;

/// Every shared function for `technology`, in registry order
pub fn commands(technology: Technology) -> Vec<Box<dyn TestCommand>> {
    let mut commands: Vec<Box<dyn TestCommand>> = vec![
        Box::new(InsertDut),
        Box::new(InitializeDut),
        Box::new(RemoveDut),
        Box::new(GetSerialNumber),
        Box::new(RunDutCommand),
        Box::new(ConnectTester),
        Box::new(DisconnectTester),
        Box::new(GlobalSettingsCommand::new(technology)),
        Box::new(ReadAddress::new(technology)),
        Box::new(WriteAddress::new(technology)),
    ];
    for space in RegisterSpace::ALL {
        commands.push(Box::new(RegisterAccess::read(space)));
        commands.push(Box::new(RegisterAccess::write(space)));
    }
    commands.push(Box::new(RunExternalProgram));
    commands
}
