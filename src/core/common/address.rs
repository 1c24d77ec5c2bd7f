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

//! Device address functions
//!
//! Wi-Fi reads and writes `MAC_ADDRESS`; Bluetooth uses `BD_ADDRESS`.

use crate::core::address::HardwareAddress;
use crate::core::command::{CommandContext, TestCommand};
use crate::core::error::{CommandError, CommandResult};
use crate::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};
use crate::core::session::Technology;

fn address_key(technology: Technology) -> ParamKey<String> {
    match technology {
        Technology::Wifi => ParamKey::new("MAC_ADDRESS"),
        Technology::Bluetooth => ParamKey::new("BD_ADDRESS"),
    }
}

/// `READ_MAC_ADDRESS` / `READ_BD_ADDRESS`
pub struct ReadAddress {
    technology: Technology,
}

impl ReadAddress {
    pub fn new(technology: Technology) -> Self {
        Self { technology }
    }
}

impl TestCommand for ReadAddress {
    fn keyword(&self) -> &'static str {
        match self.technology {
            Technology::Wifi => "READ_MAC_ADDRESS",
            Technology::Bluetooth => "READ_BD_ADDRESS",
        }
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new().with(Parameter::string(
            address_key(self.technology).name(),
            "",
            "",
            "Device address, AA:BB:CC:DD:EE:FF",
        ))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        _: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let key = address_key(self.technology);
        ctx.run_dut(self.keyword())?;

        let raw = ctx.dut_string(key.name()).ok_or_else(|| CommandError::DutCall {
            call: format!("vDUT_GetStringReturn({})", key.name()),
        })?;
        let address: HardwareAddress = raw
            .parse()
            .map_err(|e| CommandError::Measurement(format!("DUT reported {}", e)))?;
        returns.put(key, address.to_string())?;
        Ok(())
    }
}

/// `WRITE_MAC_ADDRESS` / `WRITE_BD_ADDRESS`
pub struct WriteAddress {
    technology: Technology,
}

impl WriteAddress {
    pub fn new(technology: Technology) -> Self {
        Self { technology }
    }
}

impl TestCommand for WriteAddress {
    fn keyword(&self) -> &'static str {
        match self.technology {
            Technology::Wifi => "WRITE_MAC_ADDRESS",
            Technology::Bluetooth => "WRITE_BD_ADDRESS",
        }
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new().with(Parameter::string(
            address_key(self.technology).name(),
            "",
            "",
            "Device address: AA:BB:CC:DD:EE:FF, AA-BB-CC-DD-EE-FF or AABBCCDDEEFF",
        ))
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        _: &mut ParamMap,
    ) -> CommandResult<()> {
        let key = address_key(self.technology);
        let address: HardwareAddress = inputs
            .get(key)?
            .parse()
            .map_err(CommandError::InvalidInput)?;

        ctx.run_dut_with(
            self.keyword(),
            &[(key.name(), ParamValue::Str(address.to_string()))],
        )
    }
}
