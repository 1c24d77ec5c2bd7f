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

use crate::core::command::{CommandContext, TestCommand};
use crate::core::error::{CommandError, CommandResult};
use crate::core::parameter::ParamMap;
use crate::core::session::{TestSession, Technology};
use crate::core::settings::GlobalSettings;

/// `GLOBAL_SETTINGS`: update the session's settings
///
/// Inputs mirror the current settings, so values the executive does not
/// pass stay as they are.
pub struct GlobalSettingsCommand {
    technology: Technology,
}

impl GlobalSettingsCommand {
    pub fn new(technology: Technology) -> Self {
        Self { technology }
    }
}

impl TestCommand for GlobalSettingsCommand {
    fn keyword(&self) -> &'static str {
        "GLOBAL_SETTINGS"
    }

    fn requires_dut(&self) -> bool {
        false
    }

    fn inputs(&self) -> ParamMap {
        GlobalSettings::default().to_param_map(self.technology)
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
    }

    fn refresh_inputs(&self, session: &TestSession, inputs: &mut ParamMap) {
        let current = session.settings.to_param_map(self.technology);
        for param in current.iter() {
            if let Err(e) = inputs.set(&param.name, param.value.clone()) {
                log::warn!("{}", e);
            }
        }
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        _: &mut ParamMap,
    ) -> CommandResult<()> {
        let mut settings = ctx.session.settings.clone();
        settings.apply(inputs)?;
        settings.validate().map_err(CommandError::InvalidInput)?;
        ctx.session.settings = settings;
        log::debug!("[{}] global settings updated", ctx.prefix());
        Ok(())
    }
}
