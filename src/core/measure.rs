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

//! Measurement helpers
//!
//! Rate and packet-type parsing, averaging of repeated measurements,
//! transmit spectral masks and the antenna selection mask.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use super::settings::GlobalSettings;

/// Domain in which repeated measurements are averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AverageMode {
    /// Plain arithmetic mean
    Linear = 1,
    /// Power quantities in dB (10·log10)
    Log10 = 10,
    /// Amplitude quantities in dB (20·log10)
    Log20 = 20,
}

/// Average, maximum and minimum of a measurement series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

/// Average a series in the given domain
///
/// Returns `None` for an empty series. `max` and `min` are taken on the
/// values as given.
pub fn average(values: &[f64], mode: AverageMode) -> Option<Stats> {
    if values.is_empty() {
        return None;
    }

    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let n = values.len() as f64;

    let average = match mode {
        AverageMode::Linear => values.iter().sum::<f64>() / n,
        AverageMode::Log10 | AverageMode::Log20 => {
            let scale = mode as i32 as f64;
            let linear: f64 = values.iter().map(|v| 10f64.powf(v / scale)).sum::<f64>() / n;
            scale * linear.log10()
        }
    };

    Some(Stats { average, max, min })
}

/// 802.11 PHY family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiStandard {
    /// 802.11b DSSS/CCK
    Dsss,
    /// 802.11a/g OFDM
    Ofdm,
    /// 802.11n HT
    Ht,
    /// 802.11ac VHT
    Vht,
}

impl WifiStandard {
    /// Whether the standard uses MCS indices
    pub fn is_mcs(self) -> bool {
        matches!(self, WifiStandard::Ht | WifiStandard::Vht)
    }
}

/// Wi-Fi data rate (`DSSS-1`, `CCK-11`, `OFDM-54`, `MCS7`, ...)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WifiRate {
    name: &'static str,
    pub standard: WifiStandard,
    /// PHY rate for legacy rates, MCS index for HT and VHT
    value: f64,
    streams: u32,
}

const LEGACY_RATES: [(&str, WifiStandard, f64); 12] = [
    ("DSSS-1", WifiStandard::Dsss, 1.0),
    ("DSSS-2", WifiStandard::Dsss, 2.0),
    ("CCK-5_5", WifiStandard::Dsss, 5.5),
    ("CCK-11", WifiStandard::Dsss, 11.0),
    ("OFDM-6", WifiStandard::Ofdm, 6.0),
    ("OFDM-9", WifiStandard::Ofdm, 9.0),
    ("OFDM-12", WifiStandard::Ofdm, 12.0),
    ("OFDM-18", WifiStandard::Ofdm, 18.0),
    ("OFDM-24", WifiStandard::Ofdm, 24.0),
    ("OFDM-36", WifiStandard::Ofdm, 36.0),
    ("OFDM-48", WifiStandard::Ofdm, 48.0),
    ("OFDM-54", WifiStandard::Ofdm, 54.0),
];

const MCS_NAMES: [&str; 24] = [
    "MCS0", "MCS1", "MCS2", "MCS3", "MCS4", "MCS5", "MCS6", "MCS7", "MCS8", "MCS9", "MCS10",
    "MCS11", "MCS12", "MCS13", "MCS14", "MCS15", "MCS16", "MCS17", "MCS18", "MCS19", "MCS20",
    "MCS21", "MCS22", "MCS23",
];

/// Highest VHT MCS index
const VHT_MAX_MCS: usize = 9;

/// Most spatial streams a test can drive
pub const MAX_STREAMS: u32 = 4;

impl WifiRate {
    /// VHT rate `MCS<mcs>` sent on `streams` spatial streams
    pub fn vht(mcs: usize, streams: u32) -> Result<Self, String> {
        if mcs > VHT_MAX_MCS {
            return Err(format!("VHT supports MCS0 to MCS{}, got MCS{}.", VHT_MAX_MCS, mcs));
        }
        if !(1..=MAX_STREAMS).contains(&streams) {
            return Err(format!(
                "NUM_STREAM_11AC must be 1 to {}, got {}.",
                MAX_STREAMS, streams
            ));
        }
        Ok(WifiRate {
            name: MCS_NAMES[mcs],
            standard: WifiStandard::Vht,
            value: mcs as f64,
            streams,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// MCS index; zero for legacy rates
    pub fn mcs(&self) -> usize {
        if self.standard.is_mcs() {
            self.value as usize
        } else {
            0
        }
    }

    /// Spatial streams needed by the rate
    pub fn streams(&self) -> u32 {
        self.streams
    }

    /// Whether 802.11ac defines this MCS and stream count at `bandwidth`
    ///
    /// Always true for non-VHT rates.
    pub fn vht_allowed(&self, bandwidth: Bandwidth) -> bool {
        if self.standard != WifiStandard::Vht {
            return true;
        }
        match (bandwidth.mhz(), self.mcs(), self.streams) {
            (20, 9, streams) => streams == 3,
            (80, 6, 3) => false,
            (160, 9, 3) => false,
            _ => true,
        }
    }

    /// Peak-to-average ratio used to set the analyzer amplitude
    ///
    /// HT rates use the single-stream MCS entry; VHT MCS8 and MCS9 share
    /// the MCS7 entry.
    pub fn peak_to_average_db(&self, settings: &GlobalSettings) -> f64 {
        let s = settings;
        let papr = match self.standard {
            WifiStandard::Dsss => match self.name {
                "DSSS-1" => s.p_to_a_11b_1m,
                "DSSS-2" => s.p_to_a_11b_2m,
                "CCK-5_5" => s.p_to_a_11b_5_5m,
                _ => s.p_to_a_11b_11m,
            },
            WifiStandard::Ofdm => match self.value as i32 {
                6 => s.p_to_a_11ag_6m,
                9 => s.p_to_a_11ag_9m,
                12 => s.p_to_a_11ag_12m,
                18 => s.p_to_a_11ag_18m,
                24 => s.p_to_a_11ag_24m,
                36 => s.p_to_a_11ag_36m,
                48 => s.p_to_a_11ag_48m,
                _ => s.p_to_a_11ag_54m,
            },
            WifiStandard::Ht | WifiStandard::Vht => {
                let mcs = [
                    s.p_to_a_11n_mcs0,
                    s.p_to_a_11n_mcs1,
                    s.p_to_a_11n_mcs2,
                    s.p_to_a_11n_mcs3,
                    s.p_to_a_11n_mcs4,
                    s.p_to_a_11n_mcs5,
                    s.p_to_a_11n_mcs6,
                    s.p_to_a_11n_mcs7,
                ];
                let index = match self.standard {
                    WifiStandard::Ht => self.mcs() % 8,
                    _ => self.mcs().min(7),
                };
                mcs[index]
            }
        };
        papr as f64
    }

    /// Capture length for EVM and power measurements
    pub fn capture_time_us(
        &self,
        preamble: Preamble,
        format: PacketFormat,
        settings: &GlobalSettings,
    ) -> f64 {
        let us = match (self.standard, preamble, format) {
            (WifiStandard::Dsss, Preamble::Long, _) => settings.evm_capture_time_11b_l_us,
            (WifiStandard::Dsss, Preamble::Short, _) => settings.evm_capture_time_11b_s_us,
            (WifiStandard::Ofdm, _, _) => settings.evm_capture_time_11ag_us,
            (WifiStandard::Ht, _, PacketFormat::Greenfield) => {
                settings.evm_capture_time_11n_greenfield_us
            }
            (WifiStandard::Ht, _, _) => settings.evm_capture_time_11n_mixed_us,
            (WifiStandard::Vht, _, _) => settings.evm_capture_time_11ac_vht_us,
        };
        us as f64
    }

    /// Modulation file used to test reception at this rate
    ///
    /// VHT waveforms are named `<prefix><BW>_S<streams>_<MCS>.mod`.
    pub fn per_waveform(&self, bandwidth: Bandwidth, settings: &GlobalSettings) -> String {
        let file = match self.standard {
            WifiStandard::Dsss => format!("{}{}", settings.per_waveform_prefix_11b, self.name),
            WifiStandard::Ofdm => format!("{}{}", settings.per_waveform_prefix_11ag, self.name),
            WifiStandard::Ht if bandwidth.mhz() > 20 => {
                format!("{}{}", settings.per_waveform_prefix_11n_ht40, self.name)
            }
            WifiStandard::Ht => format!("{}{}", settings.per_waveform_prefix_11n, self.name),
            WifiStandard::Vht => format!(
                "{}{}_S{}_{}",
                settings.per_waveform_prefix_11ac,
                bandwidth.keyword(),
                self.streams,
                self.name
            ),
        };
        format!(
            "{}/{}.mod",
            settings.per_waveform_path.trim_end_matches(['/', '\\']),
            file
        )
    }

    /// Frames the generator plays for a PER test
    pub fn per_frame_count(&self, settings: &GlobalSettings) -> i32 {
        match self.standard {
            WifiStandard::Dsss => settings.per_frame_count_11b,
            WifiStandard::Ofdm => settings.per_frame_count_11ag,
            WifiStandard::Ht => settings.per_frame_count_11n,
            WifiStandard::Vht => settings.per_frame_count_11ac,
        }
    }

    /// Highest generator output the waveform supports
    pub fn vsg_max_power_dbm(&self, settings: &GlobalSettings) -> f64 {
        match self.standard {
            WifiStandard::Dsss => settings.vsg_max_power_11b,
            WifiStandard::Ofdm => settings.vsg_max_power_11g,
            WifiStandard::Ht => settings.vsg_max_power_11n,
            WifiStandard::Vht => settings.vsg_max_power_11ac,
        }
    }
}

impl FromStr for WifiRate {
    type Err = String;

    /// Parse a legacy or HT rate; VHT rates come from [`WifiRate::vht`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        if let Some(&(name, standard, value)) = LEGACY_RATES.iter().find(|(n, _, _)| *n == upper) {
            return Ok(WifiRate {
                name,
                standard,
                value,
                streams: 1,
            });
        }
        if let Some(index) = MCS_NAMES.iter().position(|n| *n == upper) {
            return Ok(WifiRate {
                name: MCS_NAMES[index],
                standard: WifiStandard::Ht,
                value: index as f64,
                streams: index as u32 / 8 + 1,
            });
        }
        Err(format!("Unknown data rate {}.", s))
    }
}

impl fmt::Display for WifiRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])* $name:ident, $what:literal {
            $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn keyword(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(format!("Unknown {} {}.", $what, s)),
                }
            }
        }
    };
}

keyword_enum!(
    /// Channel bandwidth
    Bandwidth, "bandwidth" {
        Ht20 => "HT20",
        Ht40 => "HT40",
        Vht20 => "VHT20",
        Vht40 => "VHT40",
        Vht80 => "VHT80",
        Vht160 => "VHT160",
        Vht80_80 => "VHT80_80" | "VHT80+80",
    }
);

impl Bandwidth {
    /// Occupied bandwidth; 80+80 counts both segments
    pub fn mhz(self) -> u32 {
        match self {
            Bandwidth::Ht20 | Bandwidth::Vht20 => 20,
            Bandwidth::Ht40 | Bandwidth::Vht40 => 40,
            Bandwidth::Vht80 => 80,
            Bandwidth::Vht160 | Bandwidth::Vht80_80 => 160,
        }
    }

    pub fn is_vht(self) -> bool {
        !matches!(self, Bandwidth::Ht20 | Bandwidth::Ht40)
    }

    /// Analyzer sample rate wide enough for the channel
    pub fn sample_freq_hz(self) -> f64 {
        match self.mhz() {
            20 | 40 => 80e6,
            80 => 160e6,
            _ => 240e6,
        }
    }
}

keyword_enum!(
    /// 802.11b preamble
    Preamble, "preamble" { Long => "LONG", Short => "SHORT" }
);

keyword_enum!(
    /// Packet format for HT and VHT rates
    PacketFormat, "packet format" {
        Mixed => "MIXED" | "HT_MF",
        Greenfield => "GREENFIELD" | "HT_GF",
        Vht => "VHT",
        NonHt => "NON_HT",
    }
);

keyword_enum!(
    /// OFDM guard interval; the short one needs an HT or VHT rate
    GuardInterval, "guard interval" { Long => "LONG", Short => "SHORT" }
);

/// Bluetooth BDR/EDR packet type (`1DH1` .. `3DH5`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtPacketType {
    /// 1 (BDR), 2 or 3 (EDR) Mbit/s
    pub data_rate_mbps: u8,
    /// Slots occupied by the packet: 1, 3 or 5
    pub slots: u8,
}

/// Duration of one Bluetooth slot
const BT_SLOT_US: f64 = 625.0;

impl BtPacketType {
    pub fn is_edr(&self) -> bool {
        self.data_rate_mbps > 1
    }

    /// Capture length covering one packet plus margin
    pub fn capture_time_us(&self) -> f64 {
        self.slots as f64 * BT_SLOT_US + 125.0
    }
}

impl FromStr for BtPacketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bytes = upper.as_bytes();
        let parsed = match bytes {
            [rate @ b'1'..=b'3', b'D', b'H', slots @ (b'1' | b'3' | b'5')] => Some(BtPacketType {
                data_rate_mbps: rate - b'0',
                slots: slots - b'0',
            }),
            _ => None,
        };
        parsed.ok_or_else(|| format!("Unknown packet type {}.", s))
    }
}

impl fmt::Display for BtPacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}DH{}", self.data_rate_mbps, self.slots)
    }
}

/// Transmit spectral mask family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    /// 802.11b: 0 dBr to 11 MHz, -30 dBr to 22 MHz, -50 dBr beyond
    Dsss,
    /// 802.11a/g/n/ac 20 MHz: 0 / -20 / -28 / -40 dBr at 9 / 11 / 20 / 30 MHz
    Ofdm,
}

impl MaskKind {
    pub fn for_standard(standard: WifiStandard) -> Self {
        match standard {
            WifiStandard::Dsss => MaskKind::Dsss,
            WifiStandard::Ofdm | WifiStandard::Ht | WifiStandard::Vht => MaskKind::Ofdm,
        }
    }

    /// Half-width of the flat 0 dBr region
    fn in_band_hz(self) -> f64 {
        match self {
            MaskKind::Dsss => 11e6,
            MaskKind::Ofdm => 9e6,
        }
    }

    /// Mask limit in dBr at a frequency offset
    pub fn limit_dbr(self, offset_hz: f64) -> f64 {
        let offset = offset_hz.abs();
        match self {
            MaskKind::Dsss => {
                if offset <= 11e6 {
                    0.0
                } else if offset <= 22e6 {
                    -30.0
                } else {
                    -50.0
                }
            }
            MaskKind::Ofdm => {
                const CORNERS: [(f64, f64); 4] =
                    [(9e6, 0.0), (11e6, -20.0), (20e6, -28.0), (30e6, -40.0)];
                if offset <= CORNERS[0].0 {
                    return CORNERS[0].1;
                }
                for pair in CORNERS.windows(2) {
                    let ((f0, l0), (f1, l1)) = (pair[0], pair[1]);
                    if offset <= f1 {
                        return l0 + (l1 - l0) * (offset - f0) / (f1 - f0);
                    }
                }
                CORNERS[3].1
            }
        }
    }
}

/// Outcome of a mask check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskResult {
    /// Share of out-of-band points above the mask
    pub violation_percent: f64,
    /// Smallest distance below the mask; negative when violated
    pub margin_db: f64,
}

/// Check a spectrum (`x` offsets in Hz, `y` levels in dB) against a mask
///
/// Levels are taken relative to the in-band peak. Only points outside the
/// flat in-band region are checked.
pub fn evaluate_mask(x: &[f64], y: &[f64], mask: MaskKind) -> Result<MaskResult, String> {
    if x.len() != y.len() || x.is_empty() {
        return Err(format!(
            "Spectrum vectors do not match ({} frequencies, {} levels).",
            x.len(),
            y.len()
        ));
    }

    let in_band = mask.in_band_hz();
    let peak = x
        .iter()
        .zip(y)
        .filter(|(f, _)| f.abs() <= in_band)
        .map(|(_, level)| *level)
        .fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return Err("Spectrum has no in-band points.".to_string());
    }

    let mut checked = 0usize;
    let mut violations = 0usize;
    let mut margin = f64::INFINITY;
    for (f, level) in x.iter().zip(y) {
        if f.abs() <= in_band {
            continue;
        }
        checked += 1;
        let point_margin = mask.limit_dbr(*f) - (level - peak);
        if point_margin < 0.0 {
            violations += 1;
        }
        margin = margin.min(point_margin);
    }

    if checked == 0 {
        return Err("Spectrum has no out-of-band points.".to_string());
    }

    Ok(MaskResult {
        violation_percent: violations as f64 * 100.0 / checked as f64,
        margin_db: margin,
    })
}

bitflags! {
    /// DUT antennas enabled for a test
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AntennaMask: u8 {
        const ANT1 = 0b0001;
        const ANT2 = 0b0010;
        const ANT3 = 0b0100;
        const ANT4 = 0b1000;
    }
}

impl AntennaMask {
    /// Build the mask from the `ANT1`..`ANT4` input flags
    pub fn from_flags(flags: [i32; 4]) -> Self {
        let all = [Self::ANT1, Self::ANT2, Self::ANT3, Self::ANT4];
        flags
            .iter()
            .zip(all)
            .filter(|(flag, _)| **flag != 0)
            .fold(Self::empty(), |mask, (_, ant)| mask | ant)
    }

    /// Number of enabled antennas
    pub fn chains(self) -> u32 {
        self.bits().count_ones()
    }
}
