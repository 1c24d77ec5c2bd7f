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

//! Test-command runner
//!
//! Every test function has the same outer shape, implemented once here by
//! [`TestFunction::invoke`]:
//!
//! 1. Clear the previous return values.
//! 2. If the executive sets `QUERY_INPUT`, describe the inputs and succeed.
//! 3. If the executive sets `QUERY_RETURN`, describe the returns and succeed.
//! 4. Clear the executive's returns, validate the session handles and fetch
//!    the inputs.
//! 5. Run the command body ([`TestCommand::execute`]).
//! 6. On success publish every return with
//!    `ERROR_MESSAGE = "[Info] Function completed.\n"`; on failure publish
//!    only `ERROR_MESSAGE`.
//!
//! Command bodies only contain the collaborator calls. They report failures
//! as [`CommandError`] values; a panic inside a collaborator is caught and
//! reported as [`CommandError::Unknown`].
//!
//! # Example
//!
//! ```
//! use iqlite::core::command::{CommandContext, Instruments, ReturnCode, TestCommand, TestFunction};
//! use iqlite::core::error::CommandResult;
//! use iqlite::core::executive::InMemoryExecutive;
//! use iqlite::core::iqmeasure::SimulatedTester;
//! use iqlite::core::parameter::{ParamKey, ParamMap, Parameter};
//! use iqlite::core::session::{TestSession, Technology};
//! use iqlite::core::vdut::VirtualDut;
//!
//! const COUNT: ParamKey<i32> = ParamKey::new("COUNT");
//!
//! struct Double;
//!
//! impl TestCommand for Double {
//!     fn keyword(&self) -> &'static str { "DOUBLE" }
//!     fn requires_dut(&self) -> bool { false }
//!     fn inputs(&self) -> ParamMap {
//!         ParamMap::new().with(Parameter::integer("COUNT", 2, "", "Value to double"))
//!     }
//!     fn returns(&self) -> ParamMap {
//!         ParamMap::new().with(Parameter::integer("COUNT", 0, "", "Doubled value"))
//!     }
//!     fn execute(&mut self, _: &mut CommandContext<'_>, inputs: &ParamMap, returns: &mut ParamMap) -> CommandResult<()> {
//!         returns.put(COUNT, inputs.get(COUNT)? * 2)?;
//!         Ok(())
//!     }
//! }
//!
//! let mut session = TestSession::new(Technology::Wifi, 0);
//! let mut function = TestFunction::new(Box::new(Double));
//! let (mut exec, mut vdut, mut tester) = (InMemoryExecutive::new(), VirtualDut::new(), SimulatedTester::new());
//! let mut instruments = Instruments { executive: &mut exec, dut: &mut vdut, tester: &mut tester };
//!
//! assert_eq!(function.invoke(&mut session, &mut instruments), ReturnCode::Ok);
//! assert_eq!(exec.error_message(0), Some("[Info] Function completed.\n"));
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chrono::Local;
use serde::Serialize;

use super::error::{CommandError, CommandResult, TesterError};
use super::executive::{QueryKind, TestExecutive};
use super::iqmeasure::{Analysis, CaptureConfig, ErrorCode, RfTester};
use super::parameter::{ParamKey, ParamMap, ParamValue, Parameter};
use super::session::{DutHandle, TestSession};
use super::vdut::DutControl;

/// Name of the message return every function declares
pub const ERROR_MESSAGE: ParamKey<String> = ParamKey::new("ERROR_MESSAGE");

/// `ERROR_MESSAGE` text of a successful invocation
pub const COMPLETED_MESSAGE: &str = "[Info] Function completed.\n";

/// Test function return code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i32")]
#[repr(i32)]
pub enum ReturnCode {
    Ok = 0,
    Failed = -1,
}

impl ReturnCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == ReturnCode::Ok
    }
}

impl From<ReturnCode> for i32 {
    fn from(code: ReturnCode) -> Self {
        code.code()
    }
}

/// Collaborators a test function talks to
pub struct Instruments<'a> {
    pub executive: &'a mut dyn TestExecutive,
    pub dut: &'a mut dyn DutControl,
    pub tester: &'a mut dyn RfTester,
}

/// What a command body sees while it runs
pub struct CommandContext<'a> {
    pub session: &'a mut TestSession,
    pub dut: &'a mut dyn DutControl,
    pub tester: &'a mut dyn RfTester,
}

impl CommandContext<'_> {
    /// Message prefix of the session's technology
    pub fn prefix(&self) -> &'static str {
        self.session.technology().prefix()
    }

    pub fn handle(&self) -> DutHandle {
        self.session.dut
    }

    /// Replace the staged DUT parameters
    pub fn stage(&mut self, params: &[(&str, ParamValue)]) -> CommandResult<()> {
        let dut = self.handle();
        self.dut.clear_parameters(dut)?;
        for (name, value) in params {
            self.dut.add_parameter(dut, name, value.clone())?;
        }
        Ok(())
    }

    /// Run a DUT command
    ///
    /// On failure the DUT's own `ERROR_MESSAGE` is reported when it set
    /// one; otherwise the failure names the command.
    pub fn run_dut(&mut self, command: &str) -> CommandResult<()> {
        let dut = self.handle();
        if self.dut.run(dut, command).is_ok() {
            return Ok(());
        }

        match self.dut.get_string_return(dut, "ERROR_MESSAGE") {
            Ok(message) if !message.is_empty() => Err(CommandError::DutReported(message)),
            _ => Err(CommandError::DutCall {
                call: format!("vDUT_Run({})", command),
            }),
        }
    }

    /// Stage parameters and run a DUT command
    pub fn run_dut_with(&mut self, command: &str, params: &[(&str, ParamValue)]) -> CommandResult<()> {
        self.stage(params)?;
        self.run_dut(command)
    }

    /// Optional string return of the last DUT command
    pub fn dut_string(&self, name: &str) -> Option<String> {
        self.dut.get_string_return(self.handle(), name).ok()
    }

    /// Required integer return of the last DUT command
    pub fn dut_integer(&self, name: &str) -> CommandResult<i32> {
        self.dut
            .get_integer_return(self.handle(), name)
            .map_err(|_| CommandError::DutCall {
                call: format!("vDUT_GetIntegerReturn({})", name),
            })
    }

    /// Run `TX_STOP` after a transmit measurement
    ///
    /// Skipped when `DUT_KEEP_TRANSMIT` is set. A measurement failure wins
    /// over a failure to stop.
    pub fn stop_transmit(&mut self, measured: CommandResult<()>) -> CommandResult<()> {
        if self.session.settings.dut_keep_transmit {
            return measured;
        }
        let stopped = self.run_dut("TX_STOP");
        match measured {
            Ok(()) => stopped,
            Err(e) => {
                if let Err(stop) = stopped {
                    log::warn!("[{}] {}", self.prefix(), stop);
                }
                Err(e)
            }
        }
    }

    /// Wait for the DUT to settle after starting TX or RX
    pub fn settle(&self, ms: i32) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
    }

    /// Run AGC and check the analyzer settled near `requested_dbm`
    ///
    /// Fails when the settled amplitude is further than
    /// `VSA_AMPLITUDE_TOLERANCE_DB` from the request.
    pub fn check_amplitude(&mut self, requested_dbm: f64) -> CommandResult<f64> {
        let settled = self.tester.agc().context("Fail to run AGC", "agc")?;
        let tolerance = self.session.settings.vsa_amplitude_tolerance_db;
        if (settled - requested_dbm).abs() > tolerance {
            return Err(CommandError::Measurement(format!(
                "VSA amplitude {:.1} dBm is outside {:.1} dB of the expected {:.1} dBm.",
                settled, tolerance, requested_dbm
            )));
        }
        Ok(settled)
    }

    /// Capture `sampling_time_us` of signal at `sample_freq_hz`
    pub fn capture(&mut self, sampling_time_us: f64, sample_freq_hz: f64) -> CommandResult<()> {
        let config = CaptureConfig::new(sampling_time_us * 1e-6).with_sample_freq(sample_freq_hz);
        self.tester
            .capture(&config)
            .context("Fail to capture signal", "capture")
    }

    /// Analyze the last capture, saving it when configured to
    ///
    /// `label` names the saved capture file.
    pub fn analyze(&mut self, analysis: &Analysis, label: &str) -> CommandResult<()> {
        let result = self
            .tester
            .analyze(analysis)
            .context(&format!("Fail to analyze {} signal", analysis.name()), "analyze");

        let settings = &self.session.settings;
        let save = settings.vsa_save_capture_always
            || (result.is_err() && settings.vsa_save_capture_on_failed);
        if save {
            let path = format!(
                "{}/{}_{}_{}.sig",
                settings.capture_directory.trim_end_matches(['/', '\\']),
                self.prefix(),
                label,
                Local::now().format("%Y%m%d_%H%M%S%3f")
            );
            match self.tester.save_capture(&path) {
                Ok(()) => log::info!("[{}] capture saved to {}", self.prefix(), path),
                Err(e) => log::warn!("[{}] fail to save capture {}: {}", self.prefix(), path, e),
            }
        }
        result
    }

    /// First value of a scalar measurement
    pub fn scalar(&mut self, name: &str) -> CommandResult<f64> {
        self.tester
            .scalar(name, 0)
            .context(&format!("Fail to read {}", name), "scalar")
    }

    /// Turn the generator on, wait until the frames are sent, turn it off
    ///
    /// RF is switched off again even when waiting fails.
    pub fn play_frames(&mut self, timeout: Duration) -> CommandResult<()> {
        self.tester
            .enable_vsg_rf(true)
            .context("Fail to turn on VSG RF", "enable_vsg_rf")?;
        let sent = self.wait_tx_done(timeout);
        let off = self
            .tester
            .enable_vsg_rf(false)
            .context("Fail to turn off VSG RF", "enable_vsg_rf");
        sent.and(off)
    }

    fn wait_tx_done(&mut self, timeout: Duration) -> CommandResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.tester.tx_done() {
                Ok(()) => return Ok(()),
                Err(e) if e.code == ErrorCode::TxNotDone && Instant::now() < deadline => {
                    std::thread::sleep(TX_DONE_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(e).context("VSG did not finish sending frames", "tx_done");
                }
            }
        }
    }
}

const TX_DONE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Attach call context to tester failures
pub trait TesterResultExt<T> {
    fn context(self, context: &str, call: &'static str) -> CommandResult<T>;
}

impl<T> TesterResultExt<T> for Result<T, TesterError> {
    fn context(self, context: &str, call: &'static str) -> CommandResult<T> {
        self.map_err(|source| CommandError::Tester {
            context: context.to_string(),
            call,
            source,
        })
    }
}

/// Body of one test function
pub trait TestCommand {
    /// Function keyword (`INSERT_DUT`, `TX_VERIFY_EVM`, ...)
    fn keyword(&self) -> &'static str;

    /// Input declarations with their defaults
    fn inputs(&self) -> ParamMap;

    /// Return declarations; `ERROR_MESSAGE` is added by [`TestFunction`]
    fn returns(&self) -> ParamMap;

    /// Whether a valid DUT handle is required
    fn requires_dut(&self) -> bool {
        true
    }

    /// Adjust input defaults from session state before fetching
    fn refresh_inputs(&self, _session: &TestSession, _inputs: &mut ParamMap) {}

    /// Perform the operation
    ///
    /// `inputs` hold the fetched values; write results into `returns`.
    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()>;
}

/// Description of a function's parameters
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDescription<'a> {
    pub function: &'static str,
    pub inputs: &'a ParamMap,
    pub returns: &'a ParamMap,
}

/// A test command with its parameter maps
pub struct TestFunction {
    command: Box<dyn TestCommand>,
    inputs: ParamMap,
    returns: ParamMap,
}

impl TestFunction {
    pub fn new(command: Box<dyn TestCommand>) -> Self {
        let inputs = command.inputs();
        let returns = command
            .returns()
            .with(Parameter::string(ERROR_MESSAGE.name(), "", "", "A string for error message"));
        Self {
            command,
            inputs,
            returns,
        }
    }

    pub fn keyword(&self) -> &'static str {
        self.command.keyword()
    }

    pub fn inputs(&self) -> &ParamMap {
        &self.inputs
    }

    /// Return values of the last invocation
    pub fn returns(&self) -> &ParamMap {
        &self.returns
    }

    pub fn describe(&self) -> FunctionDescription<'_> {
        FunctionDescription {
            function: self.keyword(),
            inputs: &self.inputs,
            returns: &self.returns,
        }
    }

    /// Run the function against the executive and collaborators
    ///
    /// # Returns
    ///
    /// `ReturnCode::Ok` on success and for introspection queries,
    /// `ReturnCode::Failed` otherwise. Failures never propagate further.
    pub fn invoke(&mut self, session: &mut TestSession, instruments: &mut Instruments<'_>) -> ReturnCode {
        let test_id = session.test_id;
        let prefix = session.technology().prefix();

        self.returns.clear_values();

        if instruments.executive.is_query(test_id, QueryKind::Input) {
            instruments.executive.describe_inputs(test_id, &self.inputs);
            return ReturnCode::Ok;
        }
        if instruments.executive.is_query(test_id, QueryKind::Return) {
            instruments.executive.describe_returns(test_id, &self.returns);
            return ReturnCode::Ok;
        }

        instruments.executive.clear_returns(test_id);

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run(session, instruments)))
            .unwrap_or_else(|payload| {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                log::error!("[{}] {} panicked: {}", prefix, self.keyword(), reason);
                Err(CommandError::Unknown)
            });

        match outcome {
            Ok(()) => {
                self.set_message(COMPLETED_MESSAGE.to_string());
                instruments.executive.publish_returns(test_id, &self.returns);
                log::info!("[{}] {} completed", prefix, self.keyword());
                ReturnCode::Ok
            }
            Err(e) => {
                let message = e.render(prefix);
                log::error!("{} ({})", message.trim_end(), self.keyword());
                self.returns.clear_values();
                self.set_message(message.clone());
                instruments.executive.publish_return(
                    test_id,
                    ERROR_MESSAGE.name(),
                    &ParamValue::Str(message),
                    "",
                );
                ReturnCode::Failed
            }
        }
    }

    fn set_message(&mut self, message: String) {
        if let Err(e) = self.returns.put(ERROR_MESSAGE, message) {
            log::warn!("{}", e);
        }
    }

    fn run(&mut self, session: &mut TestSession, instruments: &mut Instruments<'_>) -> CommandResult<()> {
        if session.test_id < 0 || (self.command.requires_dut() && !session.dut.is_valid()) {
            return Err(CommandError::InvalidHandle {
                test_id: session.test_id,
                dut: session.dut.0,
            });
        }

        self.fetch_inputs(&*instruments.executive, session)?;

        let mut ctx = CommandContext {
            session,
            dut: &mut *instruments.dut,
            tester: &mut *instruments.tester,
        };
        self.command.execute(&mut ctx, &self.inputs, &mut self.returns)
    }

    /// Reset inputs to their defaults and overlay what the executive holds
    fn fetch_inputs(&mut self, executive: &dyn TestExecutive, session: &TestSession) -> CommandResult<()> {
        self.inputs.reset_to_defaults();
        self.command.refresh_inputs(session, &mut self.inputs);

        let names: Vec<String> = self.inputs.names().map(str::to_string).collect();
        for name in names {
            if let Some(value) = executive.input(session.test_id, &name) {
                self.inputs.set(&name, value)?;
            }
        }
        Ok(())
    }
}
