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

/// Error types for test commands, collaborators and the flow runner
use thiserror::Error;

use super::iqmeasure::ErrorCode;
use super::parameter::ParamKind;

/// Result type for library-level operations (flows, settings, dispatch)
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Result type for a single test command invocation
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Failure of one test command
///
/// Every variant ends up as the text of the `ERROR_MESSAGE` return and a
/// `-1` return code. [`CommandError::render`] adds the technology prefix
/// for messages this crate synthesizes; messages reported by the DUT are
/// passed through verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Test_ID or Dut not valid. Test_ID = {test_id} and Dut = {dut}.")]
    InvalidHandle { test_id: i32, dut: i32 },

    #[error("Input parameters are not complete. {detail}")]
    IncompleteInput { detail: String },

    #[error("{0}")]
    InvalidInput(String),

    /// The DUT failed and reported its own `ERROR_MESSAGE`
    #[error("{0}")]
    DutReported(String),

    /// The DUT failed without an error string
    #[error("{call} return error.")]
    DutCall { call: String },

    /// A DUT-control call failed outside of running a command
    #[error("vDUT error: {0}")]
    Dut(#[from] DutError),

    #[error("{context}, {call}() return error: {source}")]
    Tester {
        context: String,
        call: &'static str,
        source: TesterError,
    },

    #[error("{0}")]
    Measurement(String),

    #[error("{0}")]
    ExternalProgram(String),

    #[error("Unknown Error!")]
    Unknown,
}

impl CommandError {
    /// Format the message stored in `ERROR_MESSAGE`
    pub fn render(&self, prefix: &str) -> String {
        match self {
            CommandError::DutReported(message) => {
                if message.ends_with('\n') {
                    message.clone()
                } else {
                    format!("{}\n", message)
                }
            }
            other => format!("[{}] {}\n", prefix, other),
        }
    }
}

impl From<ParamError> for CommandError {
    fn from(e: ParamError) -> Self {
        CommandError::IncompleteInput {
            detail: e.to_string(),
        }
    }
}

/// Failure reported by a DUT-control implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DutError {
    #[error("DUT control library not found: {0}")]
    LibraryNotFound(String),

    #[error("Invalid DUT handle: {0}")]
    InvalidHandle(i32),

    #[error("DUT command {command} failed")]
    CommandFailed { command: String },

    #[error("No DUT return named {0}")]
    NoSuchReturn(String),
}

/// Failure reported by an RF tester implementation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}{}", .detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default())]
pub struct TesterError {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl TesterError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

/// Parameter registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Duplicate parameter name: {0}")]
    Duplicate(String),

    #[error("Unknown parameter: {0}")]
    Unknown(String),

    #[error("Parameter {name} is {declared}, got {got}")]
    KindMismatch {
        name: String,
        declared: ParamKind,
        got: ParamKind,
    },
}

/// Main error type for library-level operations
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Unknown technology: {0}")]
    UnknownTechnology(String),

    #[error("Unknown test function {function} in {technology} library")]
    UnknownFunction { technology: String, function: String },

    #[error("Flow parse error: {0}")]
    FlowParse(#[from] toml::de::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Report encoding error: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
