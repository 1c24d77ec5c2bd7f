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

//! Raw register and EEPROM access

use crate::core::command::{CommandContext, TestCommand};
use crate::core::error::{CommandError, CommandResult};
use crate::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};

const ADDRESS: ParamKey<i32> = ParamKey::new("ADDRESS");
const DATA: ParamKey<i32> = ParamKey::new("DATA");

/// Addressable storage on the DUT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterSpace {
    Baseband,
    Rf,
    Mac,
    Soc,
    Eeprom,
}

impl RegisterSpace {
    pub const ALL: [RegisterSpace; 5] = [
        RegisterSpace::Baseband,
        RegisterSpace::Rf,
        RegisterSpace::Mac,
        RegisterSpace::Soc,
        RegisterSpace::Eeprom,
    ];
}

/// `READ_/WRITE_{BB,RF,MAC,SOC}_REGISTER` and `READ_/WRITE_EEPROM`
pub struct RegisterAccess {
    space: RegisterSpace,
    write: bool,
}

impl RegisterAccess {
    pub fn read(space: RegisterSpace) -> Self {
        Self { space, write: false }
    }

    pub fn write(space: RegisterSpace) -> Self {
        Self { space, write: true }
    }
}

impl TestCommand for RegisterAccess {
    fn keyword(&self) -> &'static str {
        match (self.space, self.write) {
            (RegisterSpace::Baseband, false) => "READ_BB_REGISTER",
            (RegisterSpace::Baseband, true) => "WRITE_BB_REGISTER",
            (RegisterSpace::Rf, false) => "READ_RF_REGISTER",
            (RegisterSpace::Rf, true) => "WRITE_RF_REGISTER",
            (RegisterSpace::Mac, false) => "READ_MAC_REGISTER",
            (RegisterSpace::Mac, true) => "WRITE_MAC_REGISTER",
            (RegisterSpace::Soc, false) => "READ_SOC_REGISTER",
            (RegisterSpace::Soc, true) => "WRITE_SOC_REGISTER",
            (RegisterSpace::Eeprom, false) => "READ_EEPROM",
            (RegisterSpace::Eeprom, true) => "WRITE_EEPROM",
        }
    }

    fn inputs(&self) -> ParamMap {
        let map = ParamMap::new().with(Parameter::integer(ADDRESS.name(), 0, "", "Address to access"));
        if self.write {
            map.with(Parameter::integer(DATA.name(), 0, "", "Data to write"))
        } else {
            map
        }
    }

    fn returns(&self) -> ParamMap {
        if self.write {
            ParamMap::new()
        } else {
            ParamMap::new().with(Parameter::integer(DATA.name(), 0, "", "Data read"))
        }
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let address = inputs.get(ADDRESS)?;
        if address < 0 {
            return Err(CommandError::InvalidInput(format!(
                "ADDRESS {} is negative.",
                address
            )));
        }

        let mut params = vec![(ADDRESS.name(), ParamValue::Integer(address))];
        if self.write {
            params.push((DATA.name(), ParamValue::Integer(inputs.get(DATA)?)));
        }
        ctx.run_dut_with(self.keyword(), &params)?;

        if !self.write {
            returns.put(DATA, ctx.dut_integer(DATA.name())?)?;
        }
        Ok(())
    }
}
