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

use std::process::Command;

use crate::core::command::{CommandContext, TestCommand};
use crate::core::error::{CommandError, CommandResult};
use crate::core::parameter::{ParamKey, ParamMap, Parameter};

const EXTERNAL_PROGRAM: ParamKey<String> = ParamKey::new("EXTERNAL_PROGRAM");
const PARAMETERS: ParamKey<String> = ParamKey::new("PARAMETERS");
const WAIT_FOR_FINISH: ParamKey<i32> = ParamKey::new("WAIT_FOR_FINISH");
const EXIT_CODE: ParamKey<i32> = ParamKey::new("EXIT_CODE");

/// `RUN_EXTERNAL_PROGRAM`: spawn a helper program
///
/// `PARAMETERS` is split on whitespace. When waiting, a non-zero exit code
/// fails the function.
pub struct RunExternalProgram;

impl TestCommand for RunExternalProgram {
    fn keyword(&self) -> &'static str {
        "RUN_EXTERNAL_PROGRAM"
    }

    fn requires_dut(&self) -> bool {
        false
    }

    fn inputs(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::string(EXTERNAL_PROGRAM.name(), "", "", "Program to run"))
            .with(Parameter::string(PARAMETERS.name(), "", "", "Command line arguments"))
            .with(Parameter::integer(
                WAIT_FOR_FINISH.name(),
                1,
                "",
                "Wait for the program to exit (0: no, 1: yes)",
            ))
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new().with(Parameter::integer(
            EXIT_CODE.name(),
            0,
            "",
            "Exit code, 0 when not waited for",
        ))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let program = inputs.get(EXTERNAL_PROGRAM)?;
        let arguments = inputs.get(PARAMETERS)?;
        let wait = inputs.get(WAIT_FOR_FINISH)? != 0;

        if program.trim().is_empty() {
            return Err(CommandError::InvalidInput(
                "EXTERNAL_PROGRAM is empty.".to_string(),
            ));
        }

        log::info!("[{}] running {} {}", ctx.prefix(), program, arguments);
        let mut child = Command::new(program.trim())
            .args(arguments.split_whitespace())
            .spawn()
            .map_err(|e| {
                CommandError::ExternalProgram(format!("Fail to run {}: {}.", program, e))
            })?;

        if !wait {
            // Reap the child in the background
            std::thread::spawn(move || {
                let _ = child.wait();
            });
            returns.put(EXIT_CODE, 0)?;
            return Ok(());
        }

        let status = child.wait().map_err(|e| {
            CommandError::ExternalProgram(format!("Fail to wait for {}: {}.", program, e))
        })?;
        let code = status.code().unwrap_or(-1);
        returns.put(EXIT_CODE, code)?;
        if !status.success() {
            return Err(CommandError::ExternalProgram(format!(
                "{} exited with code {}.",
                program, code
            )));
        }
        Ok(())
    }
}
