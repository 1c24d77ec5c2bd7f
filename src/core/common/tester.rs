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

//! Tester connection functions

use crate::core::command::{CommandContext, TestCommand, TesterResultExt};
use crate::core::error::{CommandError, CommandResult};
use crate::core::parameter::{ParamKey, ParamMap, Parameter};

const TESTER_IPS: [ParamKey<String>; 4] = [
    ParamKey::new("IQTESTER_IP01"),
    ParamKey::new("IQTESTER_IP02"),
    ParamKey::new("IQTESTER_IP03"),
    ParamKey::new("IQTESTER_IP04"),
];
const IQTESTER_RECONNECT: ParamKey<i32> = ParamKey::new("IQTESTER_RECONNECT");
const IQTESTER_INFO: ParamKey<String> = ParamKey::new("IQTESTER_INFO");

/// `CONNECT_IQ_TESTER`: connect to one to four tester units
pub struct ConnectTester;

impl TestCommand for ConnectTester {
    fn keyword(&self) -> &'static str {
        "CONNECT_IQ_TESTER"
    }

    fn requires_dut(&self) -> bool {
        false
    }

    fn inputs(&self) -> ParamMap {
        let mut map = ParamMap::new();
        for (i, key) in TESTER_IPS.iter().enumerate() {
            let default = if i == 0 { "127.0.0.1" } else { "" };
            map = map.with(Parameter::string(
                key.name(),
                default,
                "",
                &format!("IP address of tester {}", i + 1),
            ));
        }
        map.with(Parameter::integer(
            IQTESTER_RECONNECT.name(),
            0,
            "",
            "Reconnect even if already connected (0: no, 1: yes)",
        ))
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new().with(Parameter::string(
            IQTESTER_INFO.name(),
            "",
            "",
            "Version report of the tester",
        ))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let reconnect = inputs.get(IQTESTER_RECONNECT)? != 0;

        if ctx.session.tester_connected && ctx.tester.is_connected() && !reconnect {
            log::debug!("[{}] tester already connected", ctx.prefix());
        } else {
            let mut addresses = Vec::new();
            for key in TESTER_IPS {
                let address = inputs.get(key)?;
                let address = address.trim();
                if !address.is_empty() {
                    addresses.push(address.to_string());
                }
            }
            if addresses.is_empty() {
                return Err(CommandError::InvalidInput(
                    "No IQ tester IP address given.".to_string(),
                ));
            }

            ctx.session.tester_connected = false;
            if ctx.tester.is_connected() {
                ctx.tester
                    .con_close()
                    .context("Fail to close the IQ tester connection", "con_close")?;
            }
            ctx.tester
                .init()
                .context("Fail to initialize the measurement library", "init")?;
            ctx.tester
                .init_tester(&addresses)
                .context("Fail to connect to the IQ tester", "init_tester")?;
            ctx.session.tester_connected = true;
            log::info!("[{}] connected to IQ tester {:?}", ctx.prefix(), addresses);
        }

        let info = ctx
            .tester
            .version()
            .context("Fail to read the IQ tester version", "version")?;
        returns.put(IQTESTER_INFO, info)?;
        Ok(())
    }
}

/// `DISCONNECT_IQ_TESTER`
pub struct DisconnectTester;

impl TestCommand for DisconnectTester {
    fn keyword(&self) -> &'static str {
        "DISCONNECT_IQ_TESTER"
    }

    fn requires_dut(&self) -> bool {
        false
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>, _: &ParamMap, _: &mut ParamMap) -> CommandResult<()> {
        ctx.session.tester_connected = false;
        ctx.tester
            .con_close()
            .context("Fail to close the IQ tester connection", "con_close")?;
        ctx.tester
            .term()
            .context("Fail to release the measurement library", "term")?;
        Ok(())
    }
}
