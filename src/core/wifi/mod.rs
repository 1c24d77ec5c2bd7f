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

//! Wi-Fi measurement functions
//!
//! Transmit tests share one setup sequence:
//!
//! ```text
//!  DUT                         Tester
//!  ───                         ──────
//!  TX_SET_BW
//!  TX_SET_DATA_RATE
//!  TX_SET_ANTENNA
//!  TX_PRE_TX
//!  TX_START ──── RF ─────────► set_vsa ─► capture ─► analyze ─► results
//!     ...                        (repeated per average)
//!  TX_STOP  (unless DUT_KEEP_TRANSMIT)
//! ```
//!
//! The receive test drives the generator instead and reads the packet
//! count back from the DUT.
//!
//! 802.11ac runs through the same functions: a `VHT` packet format with a
//! VHT bandwidth turns `MCS0`..`MCS9` into VHT rates on `NUM_STREAM_11AC`
//! spatial streams.

mod rx;
mod tx;

pub use rx::RxVerifyPer;
pub use tx::{TxVerifyEvm, TxVerifyMask, TxVerifyPower};

use crate::core::command::{CommandContext, TestCommand, TesterResultExt};
use crate::core::common;
use crate::core::error::{CommandError, CommandResult};
use crate::core::iqmeasure::VsaConfig;
use crate::core::measure::{
    average, AntennaMask, AverageMode, Bandwidth, GuardInterval, PacketFormat, Preamble, WifiRate,
    WifiStandard,
};
use crate::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};
use crate::core::session::Technology;

const FREQ_MHZ: ParamKey<i32> = ParamKey::new("FREQ_MHZ");
const DATA_RATE: ParamKey<String> = ParamKey::new("DATA_RATE");
const BANDWIDTH: ParamKey<String> = ParamKey::new("BANDWIDTH");
const PREAMBLE: ParamKey<String> = ParamKey::new("PREAMBLE");
const PACKET_FORMAT_11N: ParamKey<String> = ParamKey::new("PACKET_FORMAT_11N");
const GUARD_INTERVAL_11N: ParamKey<String> = ParamKey::new("GUARD_INTERVAL_11N");
const NUM_STREAM_11AC: ParamKey<i32> = ParamKey::new("NUM_STREAM_11AC");
const FREQ_MHZ_SECONDARY_80: ParamKey<i32> = ParamKey::new("FREQ_MHZ_SECONDARY_80");
const CABLE_LOSS_DB: ParamKey<Vec<f64>> = ParamKey::new("CABLE_LOSS_DB");
const ANTENNAS: [ParamKey<i32>; 4] = [
    ParamKey::new("ANT1"),
    ParamKey::new("ANT2"),
    ParamKey::new("ANT3"),
    ParamKey::new("ANT4"),
];
const ANTENNA_BITS: [AntennaMask; 4] = [
    AntennaMask::ANT1,
    AntennaMask::ANT2,
    AntennaMask::ANT3,
    AntennaMask::ANT4,
];

/// Every Wi-Fi function in registry order
pub fn commands() -> Vec<Box<dyn TestCommand>> {
    let mut commands = common::commands(Technology::Wifi);
    commands.push(Box::new(TxVerifyEvm));
    commands.push(Box::new(TxVerifyMask));
    commands.push(Box::new(TxVerifyPower));
    commands.push(Box::new(RxVerifyPer));
    commands
}

/// Inputs shared by the transmit and receive tests
fn link_inputs() -> ParamMap {
    let mut map = ParamMap::new()
        .with(Parameter::integer(FREQ_MHZ.name(), 2412, "MHz", "Channel center frequency"))
        .with(Parameter::integer(
            FREQ_MHZ_SECONDARY_80.name(),
            0,
            "MHz",
            "Center frequency of the second 80 MHz segment (VHT80_80 only)",
        ))
        .with(Parameter::string(
            DATA_RATE.name(),
            "OFDM-54",
            "",
            "Data rate: DSSS-1, DSSS-2, CCK-5_5, CCK-11, OFDM-6 ... OFDM-54, MCS0 ... MCS23",
        ))
        .with(Parameter::string(
            BANDWIDTH.name(),
            "HT20",
            "",
            "Channel bandwidth: HT20, HT40, VHT20, VHT40, VHT80, VHT160 or VHT80_80",
        ))
        .with(Parameter::string(PREAMBLE.name(), "LONG", "", "802.11b preamble: LONG or SHORT"))
        .with(Parameter::string(
            PACKET_FORMAT_11N.name(),
            "MIXED",
            "",
            "Packet format: MIXED, GREENFIELD, VHT or NON_HT",
        ))
        .with(Parameter::string(
            GUARD_INTERVAL_11N.name(),
            "LONG",
            "",
            "Guard interval for HT and VHT rates: LONG or SHORT",
        ))
        .with(Parameter::integer(
            NUM_STREAM_11AC.name(),
            1,
            "",
            "Spatial streams for VHT rates (1 to 4)",
        ))
        .with(Parameter::double_array(
            CABLE_LOSS_DB.name(),
            vec![1.0],
            "dB",
            "Cable loss between DUT and tester, one value or one per enabled antenna",
        ));
    for (i, ant) in ANTENNAS.iter().enumerate() {
        let default = if i == 0 { 1 } else { 0 };
        map = map.with(Parameter::integer(
            ant.name(),
            default,
            "",
            "Antenna enabled (0: off, 1: on)",
        ));
    }
    map
}

/// Validated link configuration
#[derive(Debug, Clone)]
struct Link {
    freq_mhz: i32,
    /// Second segment of a VHT80_80 channel
    freq_mhz_secondary: i32,
    rate: WifiRate,
    bandwidth: Bandwidth,
    preamble: Preamble,
    format: PacketFormat,
    guard_interval: GuardInterval,
    /// Loss of the combined signal over all enabled chains
    cable_loss_db: f64,
    antennas: AntennaMask,
}

fn invalid(message: String) -> CommandError {
    CommandError::InvalidInput(message)
}

impl Link {
    fn from_inputs(inputs: &ParamMap) -> CommandResult<Self> {
        let freq_mhz = inputs.get(FREQ_MHZ)?;
        if freq_mhz <= 0 {
            return Err(invalid(format!("FREQ_MHZ {} is not a valid channel.", freq_mhz)));
        }

        let rate: WifiRate = inputs.get(DATA_RATE)?.parse().map_err(CommandError::InvalidInput)?;
        let bandwidth: Bandwidth = inputs.get(BANDWIDTH)?.parse().map_err(CommandError::InvalidInput)?;
        let preamble: Preamble = inputs.get(PREAMBLE)?.parse().map_err(CommandError::InvalidInput)?;
        let format: PacketFormat = inputs
            .get(PACKET_FORMAT_11N)?
            .parse()
            .map_err(CommandError::InvalidInput)?;
        let guard_interval: GuardInterval = inputs
            .get(GUARD_INTERVAL_11N)?
            .parse()
            .map_err(CommandError::InvalidInput)?;

        let rate = Self::resolve_rate(rate, bandwidth, format, inputs.get(NUM_STREAM_11AC)?)?;
        if guard_interval == GuardInterval::Short && !rate.standard.is_mcs() {
            return Err(invalid(format!("{} does not support a short guard interval.", rate)));
        }

        let freq_mhz_secondary = inputs.get(FREQ_MHZ_SECONDARY_80)?;
        if bandwidth == Bandwidth::Vht80_80 && freq_mhz_secondary <= 0 {
            return Err(invalid(format!(
                "FREQ_MHZ_SECONDARY_80 {} is not a valid channel for VHT80_80.",
                freq_mhz_secondary
            )));
        }

        let mut flags = [0; 4];
        for (flag, ant) in flags.iter_mut().zip(ANTENNAS) {
            *flag = inputs.get(ant)?;
        }
        let antennas = AntennaMask::from_flags(flags);
        if antennas.is_empty() {
            return Err(invalid("No antenna is enabled.".to_string()));
        }
        if rate.streams() > antennas.chains() {
            return Err(invalid(format!(
                "{} needs {} streams but only {} antennas are enabled.",
                rate,
                rate.streams(),
                antennas.chains()
            )));
        }

        Ok(Self {
            freq_mhz,
            freq_mhz_secondary,
            rate,
            bandwidth,
            preamble,
            format,
            guard_interval,
            cable_loss_db: combined_cable_loss(&inputs.get(CABLE_LOSS_DB)?, antennas)?,
            antennas,
        })
    }

    /// Check the rate against bandwidth and format; VHT formats turn the
    /// MCS into a VHT rate
    fn resolve_rate(
        rate: WifiRate,
        bandwidth: Bandwidth,
        format: PacketFormat,
        streams: i32,
    ) -> CommandResult<WifiRate> {
        if format == PacketFormat::Vht {
            if !bandwidth.is_vht() {
                return Err(invalid(format!(
                    "VHT packets need a VHT bandwidth, got {}.",
                    bandwidth.keyword()
                )));
            }
            if rate.standard != WifiStandard::Ht {
                return Err(invalid(format!("{} is not a VHT rate.", rate)));
            }
            let vht = WifiRate::vht(rate.mcs(), streams.max(0) as u32).map_err(invalid)?;
            if !vht.vht_allowed(bandwidth) {
                return Err(invalid(format!(
                    "{} does not define {} with {} streams.",
                    bandwidth.keyword(),
                    vht,
                    vht.streams()
                )));
            }
            return Ok(vht);
        }

        if bandwidth.is_vht() {
            return Err(invalid(format!(
                "{} needs the VHT packet format.",
                bandwidth.keyword()
            )));
        }
        if format == PacketFormat::NonHt && rate.standard.is_mcs() {
            return Err(invalid(format!("{} cannot be sent as NON_HT.", rate)));
        }
        if bandwidth.mhz() > 20 && !rate.standard.is_mcs() {
            return Err(invalid(format!(
                "{} does not support {}.",
                rate,
                bandwidth.keyword()
            )));
        }
        Ok(rate)
    }

    fn freq_hz(&self) -> f64 {
        self.freq_mhz as f64 * 1e6
    }

    /// DUT parameters describing the link, plus `extra`
    fn dut_params(&self, extra: (&'static str, ParamValue)) -> Vec<(&'static str, ParamValue)> {
        let mut params = vec![
            (FREQ_MHZ.name(), ParamValue::Integer(self.freq_mhz)),
            (DATA_RATE.name(), ParamValue::Str(self.rate.name().to_string())),
            (BANDWIDTH.name(), ParamValue::Str(self.bandwidth.keyword().to_string())),
            (PREAMBLE.name(), ParamValue::Str(self.preamble.keyword().to_string())),
            (PACKET_FORMAT_11N.name(), ParamValue::Str(self.format.keyword().to_string())),
            (GUARD_INTERVAL_11N.name(), ParamValue::Str(self.guard_interval.keyword().to_string())),
            (NUM_STREAM_11AC.name(), ParamValue::Integer(self.rate.streams() as i32)),
            extra,
        ];
        if self.bandwidth == Bandwidth::Vht80_80 {
            params.push((FREQ_MHZ_SECONDARY_80.name(), ParamValue::Integer(self.freq_mhz_secondary)));
        }
        for (ant, bit) in ANTENNAS.iter().zip(ANTENNA_BITS) {
            params.push((ant.name(), ParamValue::from(self.antennas.contains(bit))));
        }
        params
    }

    /// Point the analyzer at the DUT's expected output and check the
    /// amplitude it settles on
    fn setup_vsa(&self, ctx: &mut CommandContext<'_>, tx_power_dbm: f64) -> CommandResult<()> {
        let settings = &ctx.session.settings;
        let mut config = VsaConfig::new(
            self.freq_hz(),
            tx_power_dbm - self.cable_loss_db + self.rate.peak_to_average_db(settings),
            settings.vsa_port(),
        );
        config.trigger_level_db = settings.vsa_trigger_level_db;
        config.pre_trigger_s = settings.vsa_pre_trigger_time_us * 1e-6;

        log::debug!(
            "[{}] VSA {} MHz, {:.1} dBm",
            ctx.prefix(),
            self.freq_mhz,
            config.ampl_dbm
        );
        ctx.tester.set_vsa(&config).context("Fail to setup VSA", "set_vsa")?;
        ctx.check_amplitude(config.ampl_dbm).map(|_| ())
    }

    fn sample_freq_hz(&self) -> f64 {
        self.bandwidth.sample_freq_hz()
    }

    /// Label for saved captures
    fn label(&self, keyword: &str) -> String {
        format!("{}_{}_{}MHz", keyword, self.rate, self.freq_mhz)
    }
}

/// Effective loss of the signal combined over the enabled chains
///
/// One value applies to every chain; otherwise there must be one value per
/// enabled antenna. The chains are combined in the linear power domain.
fn combined_cable_loss(losses: &[f64], antennas: AntennaMask) -> CommandResult<f64> {
    let chains = antennas.chains() as usize;
    match losses.len() {
        0 => Err(invalid("CABLE_LOSS_DB is empty.".to_string())),
        1 => Ok(losses[0]),
        n if n == chains => {
            let gains: Vec<f64> = losses.iter().map(|loss| -loss).collect();
            average(&gains, AverageMode::Log10)
                .map(|stats| -stats.average)
                .ok_or_else(|| invalid("CABLE_LOSS_DB is empty.".to_string()))
        }
        n => Err(invalid(format!(
            "CABLE_LOSS_DB has {} values for {} enabled antennas.",
            n, chains
        ))),
    }
}

#[cfg(test)]
mod tests;
