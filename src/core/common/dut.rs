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

//! DUT lifecycle and identity functions

use crate::core::command::{CommandContext, TestCommand};
use crate::core::error::{CommandError, CommandResult};
use crate::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};
use crate::core::vdut::TEMPLATE_DUT_DLL;

const DUT_DLL_FILENAME: ParamKey<String> = ParamKey::new("DUT_DLL_FILENAME");
const CONNECTION_NAME: ParamKey<String> = ParamKey::new("CONNECTION_NAME");
const RELOAD_DUT_DLL: ParamKey<i32> = ParamKey::new("RELOAD_DUT_DLL");
const VDUT_VERSION: ParamKey<String> = ParamKey::new("VDUT_VERSION");
const DUT_VERSION: ParamKey<String> = ParamKey::new("DUT_VERSION");
const SERIAL_NUMBER: ParamKey<String> = ParamKey::new("SERIAL_NUMBER");
const DUT_COMMAND: ParamKey<String> = ParamKey::new("DUT_COMMAND");

/// `DUT_VERSION` when the DUT does not report one
pub const UNKNOWN_DUT_VERSION: &str = "No Return, Unknown Dut Version.\n";

/// `INSERT_DUT`: register the control library and insert the device
///
/// The library is registered when `RELOAD_DUT_DLL` is set or no handle
/// exists yet. A `CONNECTION_NAME` of `UART` or `SOCKET` selects the
/// device type before insertion.
pub struct InsertDut;

impl TestCommand for InsertDut {
    fn keyword(&self) -> &'static str {
        "INSERT_DUT"
    }

    fn requires_dut(&self) -> bool {
        false
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::string(
                DUT_DLL_FILENAME.name(),
                TEMPLATE_DUT_DLL,
                "",
                "DUT control library filename",
            ))
            .with(Parameter::string(
                CONNECTION_NAME.name(),
                "",
                "",
                "Connection to the DUT, e.g. UART or SOCKET",
            ))
            .with(Parameter::integer(
                RELOAD_DUT_DLL.name(),
                1,
                "",
                "Reload the DUT library on every insertion (0: no, 1: yes)",
            ))
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::string(VDUT_VERSION.name(), "", "", "vDUT version"))
            .with(Parameter::string(DUT_VERSION.name(), "", "", "DUT version"))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let dll = inputs.get(DUT_DLL_FILENAME)?;
        let connection = inputs.get(CONNECTION_NAME)?;
        let reload = inputs.get(RELOAD_DUT_DLL)? != 0;

        if dll.trim().is_empty() {
            return Err(CommandError::InvalidInput(format!(
                "{} is not a valid DUT DLL name.",
                dll
            )));
        }

        ctx.session.reload_dut_dll = reload;
        if reload || !ctx.session.dut.is_valid() {
            let technology = ctx.session.technology();
            let handle = ctx
                .dut
                .register_dut_dll(technology, &dll)
                .map_err(|e| {
                    log::debug!("[{}] {}", technology, e);
                    CommandError::DutCall {
                        call: format!("vDUT_RegisterTechnologyDll({})", dll),
                    }
                })?;
            ctx.session.dut = handle;
        }

        ctx.stage(&[(CONNECTION_NAME.name(), ParamValue::Str(connection.clone()))])?;
        match connection.to_ascii_uppercase().as_str() {
            "UART" => ctx.run_dut("DEVICE_TYPE_UART")?,
            "SOCKET" => ctx.run_dut("DEVICE_TYPE_SOCKET")?,
            _ => {}
        }
        ctx.run_dut("INSERT_DUT").map_err(|e| match e {
            CommandError::DutCall { .. } => {
                CommandError::InvalidInput(format!("{} failed to run INSERT_DUT.", dll))
            }
            other => other,
        })?;

        let version = ctx
            .dut_string(DUT_VERSION.name())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_DUT_VERSION.to_string());
        returns.put(VDUT_VERSION, ctx.dut.version())?;
        returns.put(DUT_VERSION, version)?;
        Ok(())
    }
}

/// `INITIALIZE_DUT`
pub struct InitializeDut;

impl TestCommand for InitializeDut {
    fn keyword(&self) -> &'static str {
        "INITIALIZE_DUT"
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>, _: &ParamMap, _: &mut ParamMap) -> CommandResult<()> {
        ctx.run_dut("INITIALIZE_DUT")
    }
}

/// `REMOVE_DUT`: remove the device and, when reloading, unload its library
pub struct RemoveDut;

impl TestCommand for RemoveDut {
    fn keyword(&self) -> &'static str {
        "REMOVE_DUT"
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>, _: &ParamMap, _: &mut ParamMap) -> CommandResult<()> {
        ctx.run_dut("REMOVE_DUT")?;

        if ctx.session.reload_dut_dll {
            let dut = ctx.handle();
            ctx.dut.unregister_dut_dll(dut)?;
            ctx.session.invalidate_dut();
        }
        Ok(())
    }
}

/// `GET_SERIAL_NUMBER`
pub struct GetSerialNumber;

impl TestCommand for GetSerialNumber {
    fn keyword(&self) -> &'static str {
        "GET_SERIAL_NUMBER"
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new().with(Parameter::string(
            SERIAL_NUMBER.name(),
            "",
            "",
            "The serial number of the DUT",
        ))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        _: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        ctx.run_dut_with("GET_SERIAL_NUMBER", &[])?;
        // Not every DUT reports a serial number
        let serial = ctx.dut_string(SERIAL_NUMBER.name()).unwrap_or_default();
        returns.put(SERIAL_NUMBER, serial)?;
        Ok(())
    }
}

/// `RUN_DUT_COMMAND`: pass a keyword straight to the DUT
pub struct RunDutCommand;

impl TestCommand for RunDutCommand {
    fn keyword(&self) -> &'static str {
        "RUN_DUT_COMMAND"
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new().with(Parameter::string(
            DUT_COMMAND.name(),
            "",
            "",
            "Command keyword sent to the DUT",
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
        let command = inputs.get(DUT_COMMAND)?;
        let command = command.trim();
        if command.is_empty() {
            return Err(CommandError::InvalidInput("DUT_COMMAND is empty.".to_string()));
        }
        ctx.run_dut(command)
    }
}
