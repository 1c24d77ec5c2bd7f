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

//! RF measurement seam
//!
//! Test commands never talk to an instrument directly. They go through the
//! [`RfTester`] trait, which mirrors the call surface of the IQmeasure
//! library: connection management, VSA (analyzer) and VSG (generator)
//! configuration, capture, analysis by standard and measurement lookup by
//! name.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  TX_VERIFY_* / RX_VERIFY_*   │
//! │        (TestCommand)         │
//! └──────────────┬───────────────┘
//!                │ &mut dyn RfTester
//!                ▼
//! ┌──────────────────────────────┐
//! │  set_vsa → capture → analyze │
//! │  scalar("evmAll", 0) ...     │
//! └──────────────┬───────────────┘
//!        ┌───────┴─────────┐
//!        ▼                 ▼
//!  SimulatedTester    (instrument
//!   (in-process)        bindings)
//! ```
//!
//! Every call returns a [`TesterResult`]. Failures carry an [`ErrorCode`]
//! from the instrument's code table so that commands can report them
//! uniformly.

use std::fmt;

use super::error::TesterError;

pub mod simulator;

pub use simulator::SimulatedTester;

/// Result type for RF tester calls
pub type TesterResult<T> = std::result::Result<T, TesterError>;

/// IQmeasure error codes
///
/// Discriminants follow the instrument's code table, starting at `ERR_OK = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    NoConnection,
    NotInitialized,
    SaveWaveFailed,
    LoadWaveFailed,
    SetTxFailed,
    SetWaveFailed,
    SetRxFailed,
    CaptureFailed,
    NoCaptureData,
    VsaNumOutOfRange,
    AnalysisFailed,
    NoValidAnalysis,
    VsgPortIsOff,
    NoModFileLoaded,
    NoContForMultiSegment,
    MeasurementNameNotFound,
    InvalidAnalysisType,
    NoAnalysisResultAvailable,
    NoMeasurementResult,
    InvalidIpAddress,
    GeneralErr,
    TxNotDone,
    SetPathNotDone,
    BufferOverflow,
}

impl ErrorCode {
    /// Numeric code as reported by the instrument library
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Symbolic name (`ERR_NO_CONNECTION`, ...)
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Ok => "ERR_OK",
            ErrorCode::NoConnection => "ERR_NO_CONNECTION",
            ErrorCode::NotInitialized => "ERR_NOT_INITIALIZED",
            ErrorCode::SaveWaveFailed => "ERR_SAVE_WAVE_FAILED",
            ErrorCode::LoadWaveFailed => "ERR_LOAD_WAVE_FAILED",
            ErrorCode::SetTxFailed => "ERR_SET_TX_FAILED",
            ErrorCode::SetWaveFailed => "ERR_SET_WAVE_FAILED",
            ErrorCode::SetRxFailed => "ERR_SET_RX_FAILED",
            ErrorCode::CaptureFailed => "ERR_CAPTURE_FAILED",
            ErrorCode::NoCaptureData => "ERR_NO_CAPTURE_DATA",
            ErrorCode::VsaNumOutOfRange => "ERR_VSA_NUM_OUT_OF_RANGE",
            ErrorCode::AnalysisFailed => "ERR_ANALYSIS_FAILED",
            ErrorCode::NoValidAnalysis => "ERR_NO_VALID_ANALYSIS",
            ErrorCode::VsgPortIsOff => "ERR_VSG_PORT_IS_OFF",
            ErrorCode::NoModFileLoaded => "ERR_NO_MOD_FILE_LOADED",
            ErrorCode::NoContForMultiSegment => "ERR_NO_CONT_FOR_MULTI_SEGMENT",
            ErrorCode::MeasurementNameNotFound => "ERR_MEASUREMENT_NAME_NOT_FOUND",
            ErrorCode::InvalidAnalysisType => "ERR_INVALID_ANALYSIS_TYPE",
            ErrorCode::NoAnalysisResultAvailable => "ERR_NO_ANALYSIS_RESULT_AVAILABLE",
            ErrorCode::NoMeasurementResult => "ERR_NO_MEASUREMENT_RESULT",
            ErrorCode::InvalidIpAddress => "ERR_INVALID_IP_ADDRESS",
            ErrorCode::GeneralErr => "ERR_GENERAL_ERR",
            ErrorCode::TxNotDone => "ERR_TX_NOT_DONE",
            ErrorCode::SetPathNotDone => "ERR_SET_PATH_NOT_DONE",
            ErrorCode::BufferOverflow => "ERR_BUFFER_OVERFLOW",
        }
    }

    fn description(self) -> &'static str {
        match self {
            ErrorCode::Ok => "no error",
            ErrorCode::NoConnection => "tester is not connected",
            ErrorCode::NotInitialized => "measurement library is not initialized",
            ErrorCode::SaveWaveFailed => "failed to save the captured waveform",
            ErrorCode::LoadWaveFailed => "failed to load the waveform file",
            ErrorCode::SetTxFailed => "failed to configure the VSG",
            ErrorCode::SetWaveFailed => "failed to load the modulation file",
            ErrorCode::SetRxFailed => "failed to configure the VSA",
            ErrorCode::CaptureFailed => "capture failed",
            ErrorCode::NoCaptureData => "no capture data available",
            ErrorCode::VsaNumOutOfRange => "VSA number out of range",
            ErrorCode::AnalysisFailed => "analysis failed",
            ErrorCode::NoValidAnalysis => "no valid analysis",
            ErrorCode::VsgPortIsOff => "VSG port is off",
            ErrorCode::NoModFileLoaded => "no modulation file loaded",
            ErrorCode::NoContForMultiSegment => "continuous mode not allowed for multi-segment waveform",
            ErrorCode::MeasurementNameNotFound => "measurement name not found",
            ErrorCode::InvalidAnalysisType => "invalid analysis type",
            ErrorCode::NoAnalysisResultAvailable => "no analysis result available",
            ErrorCode::NoMeasurementResult => "no measurement result",
            ErrorCode::InvalidIpAddress => "invalid IP address",
            ErrorCode::GeneralErr => "general error",
            ErrorCode::TxNotDone => "transmission not done",
            ErrorCode::SetPathNotDone => "signal path not set",
            ErrorCode::BufferOverflow => "buffer overflow",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.description())
    }
}

/// RF port selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Port {
    Off = 1,
    Left = 2,
    Right = 3,
    Baseband = 4,
}

impl Port {
    /// Parse the integer encoding used by settings (`2` = left, `3` = right)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Port::Off),
            2 => Some(Port::Left),
            3 => Some(Port::Right),
            4 => Some(Port::Baseband),
            _ => None,
        }
    }
}

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VsaConfig {
    pub freq_hz: f64,
    /// Expected peak input power
    pub ampl_dbm: f64,
    pub port: Port,
    pub ext_atten_db: f64,
    pub trigger_level_db: f64,
    pub pre_trigger_s: f64,
}

impl VsaConfig {
    /// Configuration with the instrument's default trigger settings
    pub fn new(freq_hz: f64, ampl_dbm: f64, port: Port) -> Self {
        Self {
            freq_hz,
            ampl_dbm,
            port,
            ext_atten_db: 0.0,
            trigger_level_db: -25.0,
            pre_trigger_s: 10e-6,
        }
    }
}

/// Generator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VsgConfig {
    pub freq_hz: f64,
    pub power_dbm: f64,
    pub port: Port,
}

/// Analyzer sample rate for signals up to 40 MHz wide
pub const DEFAULT_SAMPLE_FREQ_HZ: f64 = 80e6;

/// Capture request
///
/// Captures always use the IF power trigger without calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub sampling_time_s: f64,
    pub sample_freq_hz: f64,
}

impl CaptureConfig {
    pub fn new(sampling_time_s: f64) -> Self {
        Self {
            sampling_time_s,
            sample_freq_hz: DEFAULT_SAMPLE_FREQ_HZ,
        }
    }

    pub fn with_sample_freq(mut self, sample_freq_hz: f64) -> Self {
        self.sample_freq_hz = sample_freq_hz;
        self
    }
}

/// Analysis to run on the last capture
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// 802.11a/g OFDM
    Ofdm {
        phase_correction: bool,
        amplitude_tracking: bool,
    },
    /// 802.11b DSSS/CCK
    Dsss { equalizer_taps: u8, dc_remove: bool },
    /// 802.11n
    Mimo { greenfield: bool, ht40: bool },
    /// 802.11ac
    Vht {
        bandwidth_mhz: u32,
        streams: u32,
        phase_correction: bool,
        symbol_timing_correction: bool,
        amplitude_tracking: bool,
        full_packet_channel_estimation: bool,
    },
    Power,
    Fft { resolution_bw_hz: f64 },
    /// Bluetooth at 1, 2 or 3 Mbit/s
    Bluetooth { data_rate_mbps: f64 },
}

impl Analysis {
    /// Analysis type name as used by the instrument library
    pub fn name(&self) -> &'static str {
        match self {
            Analysis::Ofdm { .. } => "80211AG",
            Analysis::Dsss { .. } => "80211B",
            Analysis::Mimo { .. } => "MIMO",
            Analysis::Vht { .. } => "80211AC",
            Analysis::Power => "POWER",
            Analysis::Fft { .. } => "FFT",
            Analysis::Bluetooth { .. } => "BLUETOOTH",
        }
    }
}

/// Trait for RF test instruments
///
/// Mirrors the instrument library's call sequence. Implementations are not
/// required to be `Send`; the runner serializes all calls.
///
/// # Call Ordering
///
/// ```text
/// init → init_tester → set_vsa → agc → capture → analyze → scalar/vector
///                    → set_vsg → set_vsg_modulation → set_frame_count
///                             → enable_vsg_rf(true) → tx_done → enable_vsg_rf(false)
/// ```
///
/// Calls made out of order fail with the matching [`ErrorCode`].
pub trait RfTester {
    /// Initialize the measurement library
    fn init(&mut self) -> TesterResult<()>;

    /// Release the measurement library
    fn term(&mut self) -> TesterResult<()>;

    /// Connect to one to four tester units
    ///
    /// # Errors
    ///
    /// - `InvalidIpAddress` when an address cannot be parsed
    /// - `VsaNumOutOfRange` when zero or more than four addresses are given
    fn init_tester(&mut self, addresses: &[String]) -> TesterResult<()>;

    /// Close the tester connection
    fn con_close(&mut self) -> TesterResult<()>;

    fn is_connected(&self) -> bool;

    /// Version report of the library and connected hardware
    fn version(&mut self) -> TesterResult<String>;

    fn set_vsa(&mut self, config: &VsaConfig) -> TesterResult<()>;

    /// Analyzer setup tuned for Bluetooth bursts
    fn set_vsa_bluetooth(&mut self, config: &VsaConfig) -> TesterResult<()>;

    fn set_vsg(&mut self, config: &VsgConfig) -> TesterResult<()>;

    /// Load a modulation (`.mod`) file into the generator
    fn set_vsg_modulation(&mut self, path: &str) -> TesterResult<()>;

    /// Number of frames to play; `0` plays continuously
    fn set_frame_count(&mut self, frames: u32) -> TesterResult<()>;

    /// Check whether the requested frames have been transmitted
    ///
    /// # Errors
    ///
    /// `TxNotDone` while frames are still being played
    fn tx_done(&mut self) -> TesterResult<()>;

    fn enable_vsg_rf(&mut self, enabled: bool) -> TesterResult<()>;

    /// Automatic gain control; returns the settled amplitude in dBm
    fn agc(&mut self) -> TesterResult<f64>;

    fn capture(&mut self, config: &CaptureConfig) -> TesterResult<()>;

    fn save_capture(&mut self, path: &str) -> TesterResult<()>;

    fn analyze(&mut self, analysis: &Analysis) -> TesterResult<()>;

    /// Scalar measurement by name and index
    ///
    /// # Errors
    ///
    /// - `NoAnalysisResultAvailable` before any analysis
    /// - `MeasurementNameNotFound` for an unknown name
    /// - `NoMeasurementResult` when the index is out of range
    fn scalar(&mut self, name: &str, index: usize) -> TesterResult<f64>;

    fn vector(&mut self, name: &str) -> TesterResult<Vec<f64>>;
}
