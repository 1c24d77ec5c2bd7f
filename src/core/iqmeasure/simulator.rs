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

//! In-process RF tester
//!
//! [`SimulatedTester`] tracks the same state an instrument would
//! (connection, analyzer and generator setup, capture, last analysis) and
//! rejects out-of-order calls with the instrument's error codes. Measurement
//! results come from a table that callers can override, so commands can be
//! driven through pass and fail paths without hardware.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::{
    Analysis, CaptureConfig, ErrorCode, Port, RfTester, TesterResult, VsaConfig, VsgConfig,
};
use crate::core::error::TesterError;

const MAX_TESTERS: usize = 4;

/// Simulated IQmeasure instrument
#[derive(Debug, Clone)]
pub struct SimulatedTester {
    initialized: bool,
    connected: bool,
    addresses: Vec<String>,
    vsa: Option<VsaConfig>,
    vsg: Option<VsgConfig>,
    modulation: Option<String>,
    frame_count: u32,
    rf_enabled: bool,
    /// `tx_done` polls left before the frames count as sent
    pending_polls: u32,
    tx_done_polls: u32,
    captured: bool,
    analysis: Option<Analysis>,
    measurements: HashMap<String, Vec<f64>>,
    /// Difference between the settled and the requested amplitude
    agc_offset_db: f64,
    failures: HashMap<&'static str, ErrorCode>,
    panic_on: Option<&'static str>,
    saved_captures: Vec<String>,
    journal: Vec<&'static str>,
}

impl SimulatedTester {
    /// Create a tester preloaded with a plausible set of measurement results
    pub fn new() -> Self {
        let mut measurements = HashMap::new();
        let defaults: &[(&str, &[f64])] = &[
            ("evmAll", &[-32.0]),
            ("evmAvgAll", &[-32.0]),
            ("evmPk", &[-28.0]),
            ("freqErr", &[1500.0]),
            ("clockErr", &[2.5]),
            ("symClockErr", &[2.5]),
            ("rmsPower", &[14.0]),
            ("rmsPowerNoGap", &[14.0]),
            ("rxRmsPowerDb", &[14.0]),
            ("P_av_no_gap_all_dBm", &[14.0]),
            ("P_pk_each_burst", &[17.0]),
            ("P_av_each_burst", &[13.8, 14.0, 14.2]),
            ("P_av_each_burst_dBm", &[4.0]),
            ("P_pk_each_burst_dBm", &[6.5]),
            ("bandwidth20dB", &[930e3]),
            ("deltaF1Average", &[160e3]),
            ("deltaF2Max", &[140e3]),
            ("EdrEVMAv", &[0.05]),
            ("EdrEVMpk", &[0.12]),
        ];
        for (name, values) in defaults {
            measurements.insert(name.to_string(), values.to_vec());
        }

        let (x, y) = default_spectrum();
        measurements.insert("x".to_string(), x);
        measurements.insert("y".to_string(), y);

        Self {
            initialized: false,
            connected: false,
            addresses: Vec::new(),
            vsa: None,
            vsg: None,
            modulation: None,
            frame_count: 0,
            rf_enabled: false,
            pending_polls: 0,
            tx_done_polls: 0,
            captured: false,
            analysis: None,
            measurements,
            agc_offset_db: 0.0,
            failures: HashMap::new(),
            panic_on: None,
            saved_captures: Vec::new(),
            journal: Vec::new(),
        }
    }

    /// Override a measurement result
    pub fn with_measurement(mut self, name: &str, values: Vec<f64>) -> Self {
        self.set_measurement(name, values);
        self
    }

    pub fn set_measurement(&mut self, name: &str, values: Vec<f64>) {
        self.measurements.insert(name.to_string(), values);
    }

    /// Remove a measurement so lookups fail with `MeasurementNameNotFound`
    pub fn remove_measurement(&mut self, name: &str) {
        self.measurements.remove(name);
    }

    /// Make every call named `call` fail with `code`
    pub fn with_failure(mut self, call: &'static str, code: ErrorCode) -> Self {
        self.failures.insert(call, code);
        self
    }

    /// Panic inside the named call
    pub fn with_panic(mut self, call: &'static str) -> Self {
        self.panic_on = Some(call);
        self
    }

    /// Make `agc` settle `offset_db` away from the configured amplitude
    pub fn with_agc_offset(mut self, offset_db: f64) -> Self {
        self.agc_offset_db = offset_db;
        self
    }

    /// Number of `tx_done` polls that report `TxNotDone` before completion
    pub fn with_tx_done_polls(mut self, polls: u32) -> Self {
        self.tx_done_polls = polls;
        self
    }

    /// Names of every call made so far, in order
    pub fn calls(&self) -> &[&'static str] {
        &self.journal
    }

    pub fn clear_calls(&mut self) {
        self.journal.clear();
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn vsa(&self) -> Option<&VsaConfig> {
        self.vsa.as_ref()
    }

    pub fn vsg(&self) -> Option<&VsgConfig> {
        self.vsg.as_ref()
    }

    pub fn modulation(&self) -> Option<&str> {
        self.modulation.as_deref()
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn rf_enabled(&self) -> bool {
        self.rf_enabled
    }

    pub fn last_analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    pub fn saved_captures(&self) -> &[String] {
        &self.saved_captures
    }

    fn enter(&mut self, call: &'static str) -> TesterResult<()> {
        self.journal.push(call);
        log::trace!("tester call {}", call);

        if self.panic_on == Some(call) {
            panic!("simulated tester fault in {}", call);
        }
        match self.failures.get(call) {
            Some(&code) => Err(TesterError::with_detail(code, format!("injected in {}", call))),
            None => Ok(()),
        }
    }

    fn require_connection(&self) -> TesterResult<()> {
        if !self.initialized {
            return Err(TesterError::new(ErrorCode::NotInitialized));
        }
        if !self.connected {
            return Err(TesterError::new(ErrorCode::NoConnection));
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> TesterResult<&Vec<f64>> {
        if self.analysis.is_none() {
            return Err(TesterError::new(ErrorCode::NoAnalysisResultAvailable));
        }
        self.measurements
            .get(name)
            .ok_or_else(|| TesterError::with_detail(ErrorCode::MeasurementNameNotFound, name))
    }

    fn reset_signal_state(&mut self) {
        self.vsa = None;
        self.vsg = None;
        self.modulation = None;
        self.frame_count = 0;
        self.rf_enabled = false;
        self.pending_polls = 0;
        self.captured = false;
        self.analysis = None;
    }
}

impl Default for SimulatedTester {
    fn default() -> Self {
        Self::new()
    }
}

impl RfTester for SimulatedTester {
    fn init(&mut self) -> TesterResult<()> {
        self.enter("init")?;
        self.initialized = true;
        Ok(())
    }

    fn term(&mut self) -> TesterResult<()> {
        self.enter("term")?;
        self.initialized = false;
        self.connected = false;
        self.addresses.clear();
        self.reset_signal_state();
        Ok(())
    }

    fn init_tester(&mut self, addresses: &[String]) -> TesterResult<()> {
        self.enter("init_tester")?;
        if !self.initialized {
            return Err(TesterError::new(ErrorCode::NotInitialized));
        }
        if addresses.is_empty() || addresses.len() > MAX_TESTERS {
            return Err(TesterError::with_detail(
                ErrorCode::VsaNumOutOfRange,
                format!("{} tester addresses", addresses.len()),
            ));
        }
        for address in addresses {
            if address.parse::<Ipv4Addr>().is_err() {
                return Err(TesterError::with_detail(
                    ErrorCode::InvalidIpAddress,
                    address.clone(),
                ));
            }
        }

        self.addresses = addresses.to_vec();
        self.connected = true;
        self.reset_signal_state();
        log::debug!("simulated tester connected to {:?}", self.addresses);
        Ok(())
    }

    fn con_close(&mut self) -> TesterResult<()> {
        self.enter("con_close")?;
        self.connected = false;
        self.addresses.clear();
        self.reset_signal_state();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn version(&mut self) -> TesterResult<String> {
        self.enter("version")?;
        if !self.initialized {
            return Err(TesterError::new(ErrorCode::NotInitialized));
        }
        let mut report = format!("IQmeasure: simulator {}\n", env!("CARGO_PKG_VERSION"));
        for (i, address) in self.addresses.iter().enumerate() {
            report.push_str(&format!("Tester {}: {}\n", i + 1, address));
        }
        Ok(report)
    }

    fn set_vsa(&mut self, config: &VsaConfig) -> TesterResult<()> {
        self.enter("set_vsa")?;
        self.require_connection()?;
        if config.port == Port::Off || config.port == Port::Baseband {
            return Err(TesterError::with_detail(ErrorCode::SetRxFailed, "invalid VSA port"));
        }
        self.vsa = Some(config.clone());
        self.captured = false;
        self.analysis = None;
        Ok(())
    }

    fn set_vsa_bluetooth(&mut self, config: &VsaConfig) -> TesterResult<()> {
        self.enter("set_vsa_bluetooth")?;
        self.require_connection()?;
        if config.port == Port::Off || config.port == Port::Baseband {
            return Err(TesterError::with_detail(ErrorCode::SetRxFailed, "invalid VSA port"));
        }
        self.vsa = Some(config.clone());
        self.captured = false;
        self.analysis = None;
        Ok(())
    }

    fn set_vsg(&mut self, config: &VsgConfig) -> TesterResult<()> {
        self.enter("set_vsg")?;
        self.require_connection()?;
        self.vsg = Some(config.clone());
        Ok(())
    }

    fn set_vsg_modulation(&mut self, path: &str) -> TesterResult<()> {
        self.enter("set_vsg_modulation")?;
        self.require_connection()?;
        if path.is_empty() {
            return Err(TesterError::with_detail(ErrorCode::SetWaveFailed, "empty path"));
        }
        self.modulation = Some(path.to_string());
        Ok(())
    }

    fn set_frame_count(&mut self, frames: u32) -> TesterResult<()> {
        self.enter("set_frame_count")?;
        self.require_connection()?;
        if self.modulation.is_none() {
            return Err(TesterError::new(ErrorCode::NoModFileLoaded));
        }
        self.frame_count = frames;
        Ok(())
    }

    fn tx_done(&mut self) -> TesterResult<()> {
        self.enter("tx_done")?;
        self.require_connection()?;
        if !self.rf_enabled {
            return Err(TesterError::with_detail(ErrorCode::TxNotDone, "RF is off"));
        }
        if self.pending_polls > 0 {
            self.pending_polls -= 1;
            return Err(TesterError::new(ErrorCode::TxNotDone));
        }
        Ok(())
    }

    fn enable_vsg_rf(&mut self, enabled: bool) -> TesterResult<()> {
        self.enter("enable_vsg_rf")?;
        self.require_connection()?;
        if enabled {
            match &self.vsg {
                None => return Err(TesterError::new(ErrorCode::SetTxFailed)),
                Some(vsg) if vsg.port == Port::Off => {
                    return Err(TesterError::new(ErrorCode::VsgPortIsOff))
                }
                Some(_) => {}
            }
            self.pending_polls = self.tx_done_polls;
        }
        self.rf_enabled = enabled;
        Ok(())
    }

    fn agc(&mut self) -> TesterResult<f64> {
        self.enter("agc")?;
        self.require_connection()?;
        self.vsa
            .as_ref()
            .map(|vsa| vsa.ampl_dbm + self.agc_offset_db)
            .ok_or_else(|| TesterError::with_detail(ErrorCode::SetRxFailed, "VSA not configured"))
    }

    fn capture(&mut self, config: &CaptureConfig) -> TesterResult<()> {
        self.enter("capture")?;
        self.require_connection()?;
        if self.vsa.is_none() {
            return Err(TesterError::with_detail(
                ErrorCode::CaptureFailed,
                "VSA not configured",
            ));
        }
        if config.sampling_time_s <= 0.0 || config.sample_freq_hz <= 0.0 {
            return Err(TesterError::with_detail(
                ErrorCode::CaptureFailed,
                "non-positive sampling time or rate",
            ));
        }
        self.captured = true;
        self.analysis = None;
        Ok(())
    }

    fn save_capture(&mut self, path: &str) -> TesterResult<()> {
        self.enter("save_capture")?;
        if !self.captured {
            return Err(TesterError::new(ErrorCode::NoCaptureData));
        }
        self.saved_captures.push(path.to_string());
        Ok(())
    }

    fn analyze(&mut self, analysis: &Analysis) -> TesterResult<()> {
        self.enter("analyze")?;
        if !self.captured {
            return Err(TesterError::new(ErrorCode::NoCaptureData));
        }
        if let Analysis::Bluetooth { data_rate_mbps } = analysis {
            if ![1.0, 2.0, 3.0].contains(data_rate_mbps) {
                return Err(TesterError::with_detail(
                    ErrorCode::InvalidAnalysisType,
                    format!("Bluetooth data rate {}", data_rate_mbps),
                ));
            }
        }
        self.analysis = Some(analysis.clone());
        Ok(())
    }

    fn scalar(&mut self, name: &str, index: usize) -> TesterResult<f64> {
        self.enter("scalar")?;
        let values = self.lookup(name)?;
        values.get(index).copied().ok_or_else(|| {
            TesterError::with_detail(ErrorCode::NoMeasurementResult, format!("{}[{}]", name, index))
        })
    }

    fn vector(&mut self, name: &str) -> TesterResult<Vec<f64>> {
        self.enter("vector")?;
        let values = self.lookup(name)?;
        if values.is_empty() {
            return Err(TesterError::with_detail(ErrorCode::NoMeasurementResult, name));
        }
        Ok(values.clone())
    }
}

/// Spectrum of a well-behaved OFDM transmitter, 250 kHz bins over ±40 MHz
///
/// In-band level is -20 dBm; the skirts sit 24, 32 and 52 dB down.
fn default_spectrum() -> (Vec<f64>, Vec<f64>) {
    let x: Vec<f64> = (0..=320).map(|i| -40e6 + i as f64 * 250e3).collect();
    let y = x
        .iter()
        .map(|f| {
            let offset = f.abs();
            if offset <= 9e6 {
                -20.0
            } else if offset <= 11e6 {
                -44.0
            } else if offset <= 20e6 {
                -52.0
            } else {
                -72.0
            }
        })
        .collect();
    (x, y)
}
