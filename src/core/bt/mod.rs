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

//! Bluetooth BDR/EDR measurement functions

use std::time::Duration;

use crate::core::command::{CommandContext, TestCommand, TesterResultExt};
use crate::core::common;
use crate::core::error::{CommandError, CommandResult};
use crate::core::iqmeasure::{Analysis, VsaConfig, VsgConfig, DEFAULT_SAMPLE_FREQ_HZ};
use crate::core::measure::{average, AverageMode, BtPacketType};
use crate::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};
use crate::core::session::Technology;

const FREQ_MHZ: ParamKey<i32> = ParamKey::new("FREQ_MHZ");
const PACKET_TYPE: ParamKey<String> = ParamKey::new("PACKET_TYPE");
const CABLE_LOSS_DB: ParamKey<f64> = ParamKey::new("CABLE_LOSS_DB");
const EXPECTED_POWER_DBM: ParamKey<f64> = ParamKey::new("EXPECTED_POWER_DBM");
const RX_POWER_DBM: ParamKey<f64> = ParamKey::new("RX_POWER_DBM");

const POWER_AVERAGE_DBM: ParamKey<f64> = ParamKey::new("POWER_AVERAGE_DBM");
const POWER_PEAK_DBM: ParamKey<f64> = ParamKey::new("POWER_PEAK_DBM");
const BANDWIDTH_20DB_HZ: ParamKey<f64> = ParamKey::new("BANDWIDTH_20DB_HZ");
const DELTA_F1_AVERAGE_HZ: ParamKey<f64> = ParamKey::new("DELTA_F1_AVERAGE_HZ");
const EDR_EVM_AVERAGE: ParamKey<f64> = ParamKey::new("EDR_EVM_AVERAGE");

const BER: ParamKey<f64> = ParamKey::new("BER");
const BIT_ERRORS: ParamKey<i32> = ParamKey::new("BIT_ERRORS");
const TOTAL_BITS: ParamKey<i32> = ParamKey::new("TOTAL_BITS");
const RX_POWER_LEVEL: ParamKey<f64> = ParamKey::new("RX_POWER_LEVEL");

/// Extra analyzer headroom for the PSK modulated EDR payload
const EDR_HEADROOM_DB: f64 = 3.0;

/// Every Bluetooth function in registry order
pub fn commands() -> Vec<Box<dyn TestCommand>> {
    let mut commands = common::commands(Technology::Bluetooth);
    commands.push(Box::new(TxVerifyPower));
    commands.push(Box::new(RxVerifyBer));
    commands
}

fn channel_inputs() -> ParamMap {
    ParamMap::new()
        .with(Parameter::integer(FREQ_MHZ.name(), 2402, "MHz", "Channel frequency"))
        .with(Parameter::string(
            PACKET_TYPE.name(),
            "1DH1",
            "",
            "Packet type: 1DH1, 1DH3, 1DH5, 2DH1 ... 3DH5",
        ))
        .with(Parameter::double(CABLE_LOSS_DB.name(), 1.0, "dB", "Cable loss between DUT and tester"))
}

/// Validated channel and packet type
struct Channel {
    freq_mhz: i32,
    packet: BtPacketType,
    cable_loss_db: f64,
}

impl Channel {
    fn from_inputs(inputs: &ParamMap) -> CommandResult<Self> {
        let freq_mhz = inputs.get(FREQ_MHZ)?;
        if !(2402..=2480).contains(&freq_mhz) {
            return Err(CommandError::InvalidInput(format!(
                "FREQ_MHZ {} is outside the 2402-2480 MHz band.",
                freq_mhz
            )));
        }
        let packet = inputs
            .get(PACKET_TYPE)?
            .parse()
            .map_err(CommandError::InvalidInput)?;
        Ok(Self {
            freq_mhz,
            packet,
            cable_loss_db: inputs.get(CABLE_LOSS_DB)?,
        })
    }

    fn dut_params(&self, extra: (&'static str, ParamValue)) -> [(&'static str, ParamValue); 3] {
        [
            (FREQ_MHZ.name(), ParamValue::Integer(self.freq_mhz)),
            (PACKET_TYPE.name(), ParamValue::Str(self.packet.to_string())),
            extra,
        ]
    }
}

/// `TX_VERIFY_POWER`: output power and modulation of a BDR/EDR transmitter
///
/// `EDR_EVM_AVERAGE` is only measured for EDR packets and is 0 otherwise.
pub struct TxVerifyPower;

impl TestCommand for TxVerifyPower {
    fn keyword(&self) -> &'static str {
        "TX_VERIFY_POWER"
    }

    fn inputs(&self) -> ParamMap {
        channel_inputs().with(Parameter::double(
            EXPECTED_POWER_DBM.name(),
            0.0,
            "dBm",
            "Expected DUT output power",
        ))
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::double(POWER_AVERAGE_DBM.name(), 0.0, "dBm", "Average burst power"))
            .with(Parameter::double(POWER_PEAK_DBM.name(), 0.0, "dBm", "Peak burst power"))
            .with(Parameter::double(BANDWIDTH_20DB_HZ.name(), 0.0, "Hz", "20 dB bandwidth"))
            .with(Parameter::double(
                DELTA_F1_AVERAGE_HZ.name(),
                0.0,
                "Hz",
                "Average frequency deviation",
            ))
            .with(Parameter::double(EDR_EVM_AVERAGE.name(), 0.0, "", "EDR RMS DEVM"))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let channel = Channel::from_inputs(inputs)?;
        let expected = inputs.get(EXPECTED_POWER_DBM)?;
        let packet = channel.packet;
        let label = format!("{}_{}_{}MHz", self.keyword(), packet, channel.freq_mhz);

        ctx.run_dut_with(
            "TX_START",
            &channel.dut_params((EXPECTED_POWER_DBM.name(), ParamValue::Double(expected))),
        )?;
        ctx.settle(ctx.session.settings.dut_tx_settle_time_ms);

        let mut bursts = Bursts::default();
        let measured = measure_bursts(ctx, &channel, expected, &label, &mut bursts);
        ctx.stop_transmit(measured)?;

        let power = average(&bursts.power, AverageMode::Log10)
            .ok_or_else(|| CommandError::Measurement("No burst power result.".to_string()))?;
        let peak = bursts.peak.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let linear = |values: &[f64]| average(values, AverageMode::Linear).map_or(0.0, |s| s.average);

        returns.put(POWER_AVERAGE_DBM, power.average + channel.cable_loss_db)?;
        returns.put(POWER_PEAK_DBM, peak + channel.cable_loss_db)?;
        returns.put(BANDWIDTH_20DB_HZ, linear(&bursts.bandwidth))?;
        returns.put(DELTA_F1_AVERAGE_HZ, linear(&bursts.delta_f1))?;
        returns.put(EDR_EVM_AVERAGE, linear(&bursts.edr_evm))?;
        log::info!(
            "[{}] {} at {} MHz: {:.2} dBm",
            ctx.prefix(),
            packet,
            channel.freq_mhz,
            power.average + channel.cable_loss_db
        );
        Ok(())
    }
}

/// Per-burst results of a power measurement
#[derive(Default)]
struct Bursts {
    power: Vec<f64>,
    peak: Vec<f64>,
    bandwidth: Vec<f64>,
    delta_f1: Vec<f64>,
    edr_evm: Vec<f64>,
}

fn measure_bursts(
    ctx: &mut CommandContext<'_>,
    channel: &Channel,
    expected_dbm: f64,
    label: &str,
    bursts: &mut Bursts,
) -> CommandResult<()> {
    let settings = &ctx.session.settings;
    let packet = channel.packet;
    let headroom = if packet.is_edr() { EDR_HEADROOM_DB } else { 0.0 };
    let mut config = VsaConfig::new(
        channel.freq_mhz as f64 * 1e6,
        expected_dbm - channel.cable_loss_db + headroom,
        settings.vsa_port(),
    );
    config.trigger_level_db = settings.vsa_trigger_level_db;
    config.pre_trigger_s = settings.vsa_pre_trigger_time_us * 1e-6;
    let count = settings.bt_power_average.max(1);

    ctx.tester
        .set_vsa_bluetooth(&config)
        .context("Fail to setup VSA", "set_vsa_bluetooth")?;
    ctx.check_amplitude(config.ampl_dbm)?;

    let analysis = Analysis::Bluetooth {
        data_rate_mbps: packet.data_rate_mbps as f64,
    };
    for _ in 0..count {
        ctx.capture(packet.capture_time_us(), DEFAULT_SAMPLE_FREQ_HZ)?;
        ctx.analyze(&analysis, label)?;
        bursts.power.push(ctx.scalar("P_av_each_burst_dBm")?);
        bursts.peak.push(ctx.scalar("P_pk_each_burst_dBm")?);
        bursts.bandwidth.push(ctx.scalar("bandwidth20dB")?);
        bursts.delta_f1.push(ctx.scalar("deltaF1Average")?);
        if packet.is_edr() {
            bursts.edr_evm.push(ctx.scalar("EdrEVMAv")?);
        }
    }
    Ok(())
}

/// `RX_VERIFY_BER`: bit error rate of the DUT receiver
pub struct RxVerifyBer;

impl TestCommand for RxVerifyBer {
    fn keyword(&self) -> &'static str {
        "RX_VERIFY_BER"
    }

    fn inputs(&self) -> ParamMap {
        channel_inputs().with(Parameter::double(
            RX_POWER_DBM.name(),
            -70.0,
            "dBm",
            "Signal level at the DUT",
        ))
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::double(BER.name(), 0.0, "%", "Bit error rate"))
            .with(Parameter::integer(BIT_ERRORS.name(), 0, "", "Bits received in error"))
            .with(Parameter::integer(TOTAL_BITS.name(), 0, "", "Bits received"))
            .with(Parameter::double(RX_POWER_LEVEL.name(), 0.0, "dBm", "Signal level at the DUT"))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let channel = Channel::from_inputs(inputs)?;
        let rx_power = inputs.get(RX_POWER_DBM)?;

        let settings = &ctx.session.settings;
        let frames = settings.bt_frame_count;
        if frames <= 0 {
            return Err(CommandError::InvalidInput(format!(
                "BT_FRAME_COUNT {} is not positive.",
                frames
            )));
        }
        let waveform = format!(
            "{}/{}.mod",
            settings.bt_waveform_path.trim_end_matches(['/', '\\']),
            channel.packet
        );
        let vsg = VsgConfig {
            freq_hz: channel.freq_mhz as f64 * 1e6,
            power_dbm: rx_power + channel.cable_loss_db,
            port: settings.vsg_port(),
        };
        let timeout = Duration::from_secs(settings.vsg_timeout_sec.max(0) as u64);
        let settle_ms = settings.dut_rx_settle_time_ms;

        ctx.run_dut_with(
            "RX_START",
            &channel.dut_params((RX_POWER_DBM.name(), ParamValue::Double(rx_power))),
        )?;
        ctx.settle(settle_ms);

        ctx.tester.set_vsg(&vsg).context("Fail to setup VSG", "set_vsg")?;
        ctx.tester
            .set_vsg_modulation(&waveform)
            .context(&format!("Fail to load {}", waveform), "set_vsg_modulation")?;
        ctx.tester
            .set_frame_count(frames as u32)
            .context("Fail to set frame count", "set_frame_count")?;
        ctx.play_frames(timeout)?;

        ctx.run_dut("RX_STOP")?;
        let total = ctx.dut_integer(TOTAL_BITS.name())?;
        if total <= 0 {
            return Err(CommandError::Measurement(
                "DUT reported no received bits.".to_string(),
            ));
        }
        let errors = ctx.dut_integer(BIT_ERRORS.name())?.clamp(0, total);
        let ber = errors as f64 * 100.0 / total as f64;

        returns.put(BER, ber)?;
        returns.put(BIT_ERRORS, errors)?;
        returns.put(TOTAL_BITS, total)?;
        returns.put(RX_POWER_LEVEL, rx_power)?;
        Ok(())
    }
}
