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

//! Global test settings
//!
//! Settings are shared by every function of a test library. They can be
//! changed at run time through the `GLOBAL_SETTINGS` function or loaded
//! up front from a TOML file whose keys are the parameter names:
//!
//! ```toml
//! VSA_PORT = 3
//! EVM_AVERAGE = 5
//! PER_WAVEFORM_PATH = "/opt/waveforms"
//! ```
//!
//! Missing keys keep their defaults. On/off settings take `true`/`false`
//! or `1`/`0`.

use std::path::Path;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::error::{LibraryError, ParamError, Result};
use super::iqmeasure::Port;
use super::parameter::{ParamKey, ParamMap, ParamType, Parameter};
use super::session::Technology;

/// Which libraries expose a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Common,
    Wifi,
    Bt,
}

impl Scope {
    fn applies_to(self, technology: Technology) -> bool {
        matches!(
            (self, technology),
            (Scope::Common, _) | (Scope::Wifi, Technology::Wifi) | (Scope::Bt, Technology::Bluetooth)
        )
    }
}

/// Deserialization of one settings value
trait SettingValue: Sized {
    fn deserialize_setting<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error>;
}

macro_rules! plain_setting_value {
    ($($ty:ty),*) => {
        $(
            impl SettingValue for $ty {
                fn deserialize_setting<'de, D: Deserializer<'de>>(
                    deserializer: D,
                ) -> std::result::Result<Self, D::Error> {
                    <$ty>::deserialize(deserializer)
                }
            }
        )*
    };
}

plain_setting_value!(i32, f64, String);

/// On/off flag written as a boolean or as `0`/`1`
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl SettingValue for bool {
    fn deserialize_setting<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        match Flag::deserialize(deserializer)? {
            Flag::Bool(flag) => Ok(flag),
            Flag::Int(0) => Ok(false),
            Flag::Int(1) => Ok(true),
            Flag::Int(other) => Err(de::Error::custom(format!(
                "expected 0, 1, true or false, got {}",
                other
            ))),
        }
    }
}

macro_rules! global_settings {
    ($(
        $(#[doc = $doc:literal])*
        $field:ident: $ty:ty = $default:expr, $key:literal, $unit:literal, $scope:ident;
    )*) => {
        /// Settings shared by all functions of a test library
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct GlobalSettings {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $key, deserialize_with = "SettingValue::deserialize_setting")]
                pub $field: $ty,
            )*
        }

        impl Default for GlobalSettings {
            fn default() -> Self {
                Self {
                    $($field: $default,)*
                }
            }
        }

        impl GlobalSettings {
            /// Describe the settings of one technology as a parameter map
            ///
            /// Values are the current settings, so the map doubles as the
            /// input declaration of `GLOBAL_SETTINGS`.
            pub fn to_param_map(&self, technology: Technology) -> ParamMap {
                let mut map = ParamMap::new();
                $(
                    if Scope::$scope.applies_to(technology) {
                        map = map.with(Parameter::new(
                            $key,
                            self.$field.clone().into_value(),
                            $unit,
                            concat!($($doc),*).trim(),
                        ));
                    }
                )*
                map
            }

            /// Copy every value present in `map` into the settings
            pub fn apply(&mut self, map: &ParamMap) -> std::result::Result<(), ParamError> {
                $(
                    if map.contains($key) {
                        self.$field = map.get(ParamKey::<$ty>::new($key))?;
                    }
                )*
                Ok(())
            }
        }
    };
}

global_settings! {
    /// Analyzer port: 2 = left, 3 = right
    vsa_port: i32 = Port::Left as i32, "VSA_PORT", "", Common;
    /// Generator port: 2 = left, 3 = right
    vsg_port: i32 = Port::Left as i32, "VSG_PORT", "", Common;
    /// Analyzer trigger level
    vsa_trigger_level_db: f64 = -25.0, "VSA_TRIGGER_LEVEL_DB", "dB", Common;
    /// Analyzer pre-trigger time
    vsa_pre_trigger_time_us: f64 = 10.0, "VSA_PRE_TRIGGER_TIME_US", "us", Common;
    /// Allowed deviation between requested and settled analyzer amplitude
    vsa_amplitude_tolerance_db: f64 = 3.0, "VSA_AMPLITUDE_TOLERANCE_DB", "dB", Common;
    /// Save the capture when analysis fails (0: off, 1: on)
    vsa_save_capture_on_failed: bool = true, "VSA_SAVE_CAPTURE_ON_FAILED", "", Common;
    /// Save every capture (0: off, 1: on)
    vsa_save_capture_always: bool = false, "VSA_SAVE_CAPTURE_ALWAYS", "", Common;
    /// Directory for saved captures
    capture_directory: String = "log".to_string(), "CAPTURE_DIRECTORY", "", Common;
    /// Leave the DUT transmitting after a TX test (0: off, 1: on)
    dut_keep_transmit: bool = false, "DUT_KEEP_TRANSMIT", "", Common;
    /// Delay after starting DUT transmission
    dut_tx_settle_time_ms: i32 = 0, "DUT_TX_SETTLE_TIME_MS", "ms", Common;
    /// Delay after starting DUT reception
    dut_rx_settle_time_ms: i32 = 0, "DUT_RX_SETTLE_TIME_MS", "ms", Common;
    /// Seconds to wait for the generator to finish playing frames
    vsg_timeout_sec: i32 = 5, "VSG_TIMEOUT_SEC", "s", Common;

    /// Peak to average for 802.11b 1 Mbps
    p_to_a_11b_1m: i32 = 2, "IQ_P_TO_A_11B_1M", "dB", Wifi;
    /// Peak to average for 802.11b 2 Mbps
    p_to_a_11b_2m: i32 = 2, "IQ_P_TO_A_11B_2M", "dB", Wifi;
    /// Peak to average for 802.11b 5.5 Mbps
    p_to_a_11b_5_5m: i32 = 2, "IQ_P_TO_A_11B_5_5M", "dB", Wifi;
    /// Peak to average for 802.11b 11 Mbps
    p_to_a_11b_11m: i32 = 2, "IQ_P_TO_A_11B_11M", "dB", Wifi;
    /// Peak to average for 802.11a/g 6 Mbps
    p_to_a_11ag_6m: i32 = 10, "IQ_P_TO_A_11AG_6M", "dB", Wifi;
    /// Peak to average for 802.11a/g 9 Mbps
    p_to_a_11ag_9m: i32 = 10, "IQ_P_TO_A_11AG_9M", "dB", Wifi;
    /// Peak to average for 802.11a/g 12 Mbps
    p_to_a_11ag_12m: i32 = 10, "IQ_P_TO_A_11AG_12M", "dB", Wifi;
    /// Peak to average for 802.11a/g 18 Mbps
    p_to_a_11ag_18m: i32 = 10, "IQ_P_TO_A_11AG_18M", "dB", Wifi;
    /// Peak to average for 802.11a/g 24 Mbps
    p_to_a_11ag_24m: i32 = 10, "IQ_P_TO_A_11AG_24M", "dB", Wifi;
    /// Peak to average for 802.11a/g 36 Mbps
    p_to_a_11ag_36m: i32 = 10, "IQ_P_TO_A_11AG_36M", "dB", Wifi;
    /// Peak to average for 802.11a/g 48 Mbps
    p_to_a_11ag_48m: i32 = 10, "IQ_P_TO_A_11AG_48M", "dB", Wifi;
    /// Peak to average for 802.11a/g 54 Mbps
    p_to_a_11ag_54m: i32 = 10, "IQ_P_TO_A_11AG_54M", "dB", Wifi;
    /// Peak to average for 802.11n MCS0
    p_to_a_11n_mcs0: i32 = 10, "IQ_P_TO_A_11N_MCS0", "dB", Wifi;
    /// Peak to average for 802.11n MCS1
    p_to_a_11n_mcs1: i32 = 10, "IQ_P_TO_A_11N_MCS1", "dB", Wifi;
    /// Peak to average for 802.11n MCS2
    p_to_a_11n_mcs2: i32 = 10, "IQ_P_TO_A_11N_MCS2", "dB", Wifi;
    /// Peak to average for 802.11n MCS3
    p_to_a_11n_mcs3: i32 = 10, "IQ_P_TO_A_11N_MCS3", "dB", Wifi;
    /// Peak to average for 802.11n MCS4
    p_to_a_11n_mcs4: i32 = 10, "IQ_P_TO_A_11N_MCS4", "dB", Wifi;
    /// Peak to average for 802.11n MCS5
    p_to_a_11n_mcs5: i32 = 10, "IQ_P_TO_A_11N_MCS5", "dB", Wifi;
    /// Peak to average for 802.11n MCS6
    p_to_a_11n_mcs6: i32 = 10, "IQ_P_TO_A_11N_MCS6", "dB", Wifi;
    /// Peak to average for 802.11n MCS7
    p_to_a_11n_mcs7: i32 = 10, "IQ_P_TO_A_11N_MCS7", "dB", Wifi;
    /// Number of captures averaged for EVM
    evm_average: i32 = 3, "EVM_AVERAGE", "", Wifi;
    /// Capture time for 802.11b EVM with long preamble
    evm_capture_time_11b_l_us: i32 = 286, "EVM_CAPTURE_TIME_11B_L_US", "us", Wifi;
    /// Capture time for 802.11b EVM with short preamble
    evm_capture_time_11b_s_us: i32 = 190, "EVM_CAPTURE_TIME_11B_S_US", "us", Wifi;
    /// Capture time for 802.11a/g EVM
    evm_capture_time_11ag_us: i32 = 95, "EVM_CAPTURE_TIME_11AG_US", "us", Wifi;
    /// Capture time for 802.11n mixed format EVM
    evm_capture_time_11n_mixed_us: i32 = 123, "EVM_CAPTURE_TIME_11N_MIXED_US", "us", Wifi;
    /// Capture time for 802.11n greenfield EVM
    evm_capture_time_11n_greenfield_us: i32 = 115, "EVM_CAPTURE_TIME_11N_GREENFIELD_US", "us", Wifi;
    /// Capture time for 802.11ac VHT EVM
    evm_capture_time_11ac_vht_us: i32 = 150, "EVM_CAPTURE_TIME_11AC_VHT_US", "us", Wifi;
    /// Number of captures averaged for power
    pm_average: i32 = 3, "PM_AVERAGE", "", Wifi;
    /// Mask capture time for DSSS signals
    mask_smp_tm_dsss_us: i32 = 286, "MASK_SMP_TM_DSSS_US", "us", Wifi;
    /// Mask capture time for OFDM signals
    mask_smp_tm_ofdm_us: i32 = 95, "MASK_SMP_TM_OFDM_US", "us", Wifi;
    /// 802.11b equalizer taps (1, 5, 7 or 9)
    analysis_11b_eq_taps: i32 = 1, "ANALYSIS_11B_EQ_TAPS", "", Wifi;
    /// 802.11b DC removal (0: off, 1: on)
    analysis_11b_dc_remove: bool = false, "ANALYSIS_11B_DC_REMOVE_FLAG", "", Wifi;
    /// 802.11a/g phase correction (0: off, 1: on)
    analysis_11ag_ph_corr: bool = true, "ANALYSIS_11AG_PH_CORR", "", Wifi;
    /// 802.11a/g amplitude tracking (0: off, 1: on)
    analysis_11ag_ampl_track: bool = false, "ANALYSIS_11AG_AMPL_TRACK", "", Wifi;
    /// 802.11ac phase correction (0: off, 1: on)
    analysis_11ac_phase_corr: bool = true, "ANALYSIS_11AC_PHASE_CORR", "", Wifi;
    /// 802.11ac symbol timing correction (0: off, 1: on)
    analysis_11ac_sym_timing_corr: bool = true, "ANALYSIS_11AC_SYM_TIMING_CORR", "", Wifi;
    /// 802.11ac amplitude tracking (0: off, 1: on)
    analysis_11ac_amplitude_tracking: bool = false, "ANALYSIS_11AC_AMPLITUDE_TRACKING", "", Wifi;
    /// 802.11ac channel estimation over the full packet (0: off, 1: on)
    analysis_11ac_full_packet_channel_est: bool = false, "ANALYSIS_11AC_FULL_PACKET_CHANNEL_EST", "", Wifi;
    /// Directory holding the PER modulation files
    per_waveform_path: String = "../mod".to_string(), "PER_WAVEFORM_PATH", "", Wifi;
    /// Waveform name prefix for 802.11b
    per_waveform_prefix_11b: String = "WiFi_".to_string(), "PER_WAVEFORM_PREFIX_11B", "", Wifi;
    /// Waveform name prefix for 802.11a/g
    per_waveform_prefix_11ag: String = "WiFi_".to_string(), "PER_WAVEFORM_PREFIX_11AG", "", Wifi;
    /// Waveform name prefix for 802.11n HT20
    per_waveform_prefix_11n: String = "WiFi_HT20_".to_string(), "PER_WAVEFORM_PREFIX_11N", "", Wifi;
    /// Waveform name prefix for 802.11n HT40
    per_waveform_prefix_11n_ht40: String = "WiFi_HT40_".to_string(), "PER_WAVEFORM_PREFIX_11N_HT40", "", Wifi;
    /// Waveform name prefix for 802.11ac
    per_waveform_prefix_11ac: String = "WiFi_11AC_".to_string(), "PER_WAVEFORM_PREFIX_11AC", "", Wifi;
    /// Frames sent for 802.11b PER
    per_frame_count_11b: i32 = 1000, "PER_FRAME_COUNT_11B", "", Wifi;
    /// Frames sent for 802.11a/g PER
    per_frame_count_11ag: i32 = 1000, "PER_FRAME_COUNT_11AG", "", Wifi;
    /// Frames sent for 802.11n PER
    per_frame_count_11n: i32 = 1000, "PER_FRAME_COUNT_11N", "", Wifi;
    /// Frames sent for 802.11ac PER
    per_frame_count_11ac: i32 = 1000, "PER_FRAME_COUNT_11AC", "", Wifi;
    /// Highest generator output for 802.11b signals
    vsg_max_power_11b: f64 = 10.0, "VSG_MAX_POWER_11B", "dBm", Wifi;
    /// Highest generator output for 802.11a/g signals
    vsg_max_power_11g: f64 = 10.0, "VSG_MAX_POWER_11G", "dBm", Wifi;
    /// Highest generator output for 802.11n signals
    vsg_max_power_11n: f64 = 10.0, "VSG_MAX_POWER_11N", "dBm", Wifi;
    /// Highest generator output for 802.11ac signals
    vsg_max_power_11ac: f64 = 10.0, "VSG_MAX_POWER_11AC", "dBm", Wifi;

    /// Directory holding the Bluetooth modulation files
    bt_waveform_path: String = "../mod/BT".to_string(), "BT_WAVEFORM_PATH", "", Bt;
    /// Frames sent for Bluetooth BER
    bt_frame_count: i32 = 1000, "BT_FRAME_COUNT", "", Bt;
    /// Number of bursts averaged for Bluetooth power
    bt_power_average: i32 = 1, "BT_POWER_AVERAGE", "", Bt;
}

impl GlobalSettings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: GlobalSettings =
            toml::from_str(text).map_err(|e| LibraryError::Settings(e.to_string()))?;
        settings.validate().map_err(LibraryError::Settings)?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&text)?;
        log::info!("Loaded global settings from {}", path.display());
        Ok(settings)
    }

    /// Check value ranges
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (key, port) in [("VSA_PORT", self.vsa_port), ("VSG_PORT", self.vsg_port)] {
            match Port::from_code(port) {
                Some(Port::Left) | Some(Port::Right) => {}
                _ => return Err(format!("{} must be 2 (left) or 3 (right), got {}", key, port)),
            }
        }

        let counts = [
            ("EVM_AVERAGE", self.evm_average),
            ("PM_AVERAGE", self.pm_average),
            ("BT_POWER_AVERAGE", self.bt_power_average),
        ];
        for (key, count) in counts {
            if count < 1 {
                return Err(format!("{} must be at least 1, got {}", key, count));
            }
        }

        if ![1, 5, 7, 9].contains(&self.analysis_11b_eq_taps) {
            return Err(format!(
                "ANALYSIS_11B_EQ_TAPS must be 1, 5, 7 or 9, got {}",
                self.analysis_11b_eq_taps
            ));
        }
        if self.vsa_amplitude_tolerance_db < 0.0 {
            return Err(format!(
                "VSA_AMPLITUDE_TOLERANCE_DB must not be negative, got {}",
                self.vsa_amplitude_tolerance_db
            ));
        }
        if self.vsg_timeout_sec < 0 || self.dut_tx_settle_time_ms < 0 || self.dut_rx_settle_time_ms < 0 {
            return Err("timeouts and settle times must not be negative".to_string());
        }
        Ok(())
    }

    /// Analyzer port; falls back to the left port for unvalidated values
    pub fn vsa_port(&self) -> Port {
        Port::from_code(self.vsa_port).unwrap_or(Port::Left)
    }

    /// Generator port; falls back to the left port for unvalidated values
    pub fn vsg_port(&self) -> Port {
        Port::from_code(self.vsg_port).unwrap_or(Port::Left)
    }
}
