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

//! Transmit measurements: EVM, power and spectral mask

use super::{link_inputs, Link};
use crate::core::command::{CommandContext, TestCommand, TesterResultExt};
use crate::core::error::{CommandError, CommandResult};
use crate::core::iqmeasure::Analysis;
use crate::core::measure::{
    average, evaluate_mask, AverageMode, Bandwidth, MaskKind, PacketFormat, Stats, WifiStandard,
};
use crate::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};
use crate::core::settings::GlobalSettings;

const TX_POWER_DBM: ParamKey<f64> = ParamKey::new("TX_POWER_DBM");

const EVM_AVG_DB: ParamKey<f64> = ParamKey::new("EVM_AVG_DB");
const EVM_MAX_DB: ParamKey<f64> = ParamKey::new("EVM_MAX_DB");
const EVM_MIN_DB: ParamKey<f64> = ParamKey::new("EVM_MIN_DB");
const FREQ_ERROR_AVG: ParamKey<f64> = ParamKey::new("FREQ_ERROR_AVG");
const SYMBOL_CLK_ERR: ParamKey<f64> = ParamKey::new("SYMBOL_CLK_ERR");
const POWER_AVG_DBM: ParamKey<f64> = ParamKey::new("POWER_AVG_DBM");

const POWER_AVERAGE_DBM: ParamKey<f64> = ParamKey::new("POWER_AVERAGE_DBM");
const POWER_MAX_DBM: ParamKey<f64> = ParamKey::new("POWER_MAX_DBM");
const POWER_MIN_DBM: ParamKey<f64> = ParamKey::new("POWER_MIN_DBM");
const TARGET_POWER_DBM: ParamKey<f64> = ParamKey::new("TARGET_POWER_DBM");

const VIOLATION_PERCENT: ParamKey<f64> = ParamKey::new("VIOLATION_PERCENT");
const MARGIN_DB: ParamKey<f64> = ParamKey::new("MARGIN_DB");

/// FFT resolution bandwidth for mask measurements
const MASK_RBW_HZ: f64 = 100e3;

fn tx_inputs() -> ParamMap {
    link_inputs().with(Parameter::double(
        TX_POWER_DBM.name(),
        15.0,
        "dBm",
        "Expected DUT output power",
    ))
}

/// Start the DUT transmitting, measure, then stop the DUT
///
/// `TX_STOP` also runs when `measure` fails, unless the settings ask to
/// keep transmitting.
fn transmit<F>(ctx: &mut CommandContext<'_>, link: &Link, tx_power_dbm: f64, measure: F) -> CommandResult<()>
where
    F: FnOnce(&mut CommandContext<'_>) -> CommandResult<()>,
{
    ctx.stage(&link.dut_params((TX_POWER_DBM.name(), ParamValue::Double(tx_power_dbm))))?;
    for command in ["TX_SET_BW", "TX_SET_DATA_RATE", "TX_SET_ANTENNA", "TX_PRE_TX", "TX_START"] {
        ctx.run_dut(command)?;
    }
    ctx.settle(ctx.session.settings.dut_tx_settle_time_ms);

    let measured = link
        .setup_vsa(ctx, tx_power_dbm)
        .and_then(|()| measure(ctx));
    ctx.stop_transmit(measured)
}

fn stats(values: &[f64], mode: AverageMode, what: &str) -> CommandResult<Stats> {
    average(values, mode).ok_or_else(|| CommandError::Measurement(format!("No {} result.", what)))
}

/// Measurement names reported by each analysis
struct EvmResults {
    evm: &'static str,
    freq_error: &'static str,
    clock_error: &'static str,
    power: &'static str,
}

impl EvmResults {
    fn for_standard(standard: WifiStandard) -> Self {
        match standard {
            WifiStandard::Dsss => Self {
                evm: "evmAll",
                freq_error: "freqErr",
                clock_error: "clockErr",
                power: "rmsPowerNoGap",
            },
            WifiStandard::Ofdm => Self {
                evm: "evmAll",
                freq_error: "freqErr",
                clock_error: "symClockErr",
                power: "rmsPowerNoGap",
            },
            WifiStandard::Ht | WifiStandard::Vht => Self {
                evm: "evmAvgAll",
                freq_error: "freqErr",
                clock_error: "symClockErr",
                power: "rxRmsPowerDb",
            },
        }
    }
}

fn evm_analysis(link: &Link, settings: &GlobalSettings) -> Analysis {
    match link.rate.standard {
        WifiStandard::Dsss => Analysis::Dsss {
            equalizer_taps: settings.analysis_11b_eq_taps.clamp(1, 9) as u8,
            dc_remove: settings.analysis_11b_dc_remove,
        },
        WifiStandard::Ofdm => Analysis::Ofdm {
            phase_correction: settings.analysis_11ag_ph_corr,
            amplitude_tracking: settings.analysis_11ag_ampl_track,
        },
        WifiStandard::Ht => Analysis::Mimo {
            greenfield: link.format == PacketFormat::Greenfield,
            ht40: link.bandwidth == Bandwidth::Ht40,
        },
        WifiStandard::Vht => Analysis::Vht {
            bandwidth_mhz: link.bandwidth.mhz(),
            streams: link.rate.streams(),
            phase_correction: settings.analysis_11ac_phase_corr,
            symbol_timing_correction: settings.analysis_11ac_sym_timing_corr,
            amplitude_tracking: settings.analysis_11ac_amplitude_tracking,
            full_packet_channel_estimation: settings.analysis_11ac_full_packet_channel_est,
        },
    }
}

/// `TX_VERIFY_EVM`: modulation accuracy of the DUT transmitter
pub struct TxVerifyEvm;

impl TestCommand for TxVerifyEvm {
    fn keyword(&self) -> &'static str {
        "TX_VERIFY_EVM"
    }

    fn inputs(&self) -> ParamMap {
        tx_inputs()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::double(EVM_AVG_DB.name(), 0.0, "dB", "Average EVM"))
            .with(Parameter::double(EVM_MAX_DB.name(), 0.0, "dB", "Worst EVM"))
            .with(Parameter::double(EVM_MIN_DB.name(), 0.0, "dB", "Best EVM"))
            .with(Parameter::double(FREQ_ERROR_AVG.name(), 0.0, "Hz", "Average frequency error"))
            .with(Parameter::double(SYMBOL_CLK_ERR.name(), 0.0, "ppm", "Average symbol clock error"))
            .with(Parameter::double(POWER_AVG_DBM.name(), 0.0, "dBm", "Average power at the DUT"))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let link = Link::from_inputs(inputs)?;
        let tx_power = inputs.get(TX_POWER_DBM)?;
        let label = link.label(self.keyword());
        let names = EvmResults::for_standard(link.rate.standard);

        let (mut evm, mut freq, mut clock, mut power) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        transmit(ctx, &link, tx_power, |ctx| {
            let settings = &ctx.session.settings;
            let capture_us = link.rate.capture_time_us(link.preamble, link.format, settings);
            let analysis = evm_analysis(&link, settings);
            let count = settings.evm_average.max(1);

            for _ in 0..count {
                ctx.capture(capture_us, link.sample_freq_hz())?;
                ctx.analyze(&analysis, &label)?;
                evm.push(ctx.scalar(names.evm)?);
                freq.push(ctx.scalar(names.freq_error)?);
                clock.push(ctx.scalar(names.clock_error)?);
                power.push(ctx.scalar(names.power)?);
            }
            Ok(())
        })?;

        let evm = stats(&evm, AverageMode::Log20, "EVM")?;
        returns.put(EVM_AVG_DB, evm.average)?;
        returns.put(EVM_MAX_DB, evm.max)?;
        returns.put(EVM_MIN_DB, evm.min)?;
        returns.put(FREQ_ERROR_AVG, stats(&freq, AverageMode::Linear, "frequency error")?.average)?;
        returns.put(SYMBOL_CLK_ERR, stats(&clock, AverageMode::Linear, "clock error")?.average)?;
        returns.put(
            POWER_AVG_DBM,
            stats(&power, AverageMode::Log10, "power")?.average + link.cable_loss_db,
        )?;
        log::info!(
            "[{}] {} {} MHz EVM {:.2} dB",
            ctx.prefix(),
            link.rate,
            link.freq_mhz,
            evm.average
        );
        Ok(())
    }
}

/// `TX_VERIFY_POWER`: average output power of the DUT
pub struct TxVerifyPower;

impl TestCommand for TxVerifyPower {
    fn keyword(&self) -> &'static str {
        "TX_VERIFY_POWER"
    }

    fn inputs(&self) -> ParamMap {
        tx_inputs()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::double(POWER_AVERAGE_DBM.name(), 0.0, "dBm", "Average power"))
            .with(Parameter::double(POWER_MAX_DBM.name(), 0.0, "dBm", "Highest power"))
            .with(Parameter::double(POWER_MIN_DBM.name(), 0.0, "dBm", "Lowest power"))
            .with(Parameter::double(TARGET_POWER_DBM.name(), 0.0, "dBm", "Expected power"))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let link = Link::from_inputs(inputs)?;
        let tx_power = inputs.get(TX_POWER_DBM)?;
        let label = link.label(self.keyword());

        let mut power = Vec::new();
        transmit(ctx, &link, tx_power, |ctx| {
            let settings = &ctx.session.settings;
            let capture_us = link.rate.capture_time_us(link.preamble, link.format, settings);
            let count = settings.pm_average.max(1);

            for _ in 0..count {
                ctx.capture(capture_us, link.sample_freq_hz())?;
                ctx.analyze(&Analysis::Power, &label)?;
                power.push(ctx.scalar("P_av_no_gap_all_dBm")?);
            }
            Ok(())
        })?;

        let power = stats(&power, AverageMode::Log10, "power")?;
        returns.put(POWER_AVERAGE_DBM, power.average + link.cable_loss_db)?;
        returns.put(POWER_MAX_DBM, power.max + link.cable_loss_db)?;
        returns.put(POWER_MIN_DBM, power.min + link.cable_loss_db)?;
        returns.put(TARGET_POWER_DBM, tx_power)?;
        Ok(())
    }
}

/// `TX_VERIFY_MASK`: transmit spectrum against the 802.11 mask
///
/// Spectra wider than 20 MHz are checked against the 20 MHz mask scaled to
/// the channel width.
pub struct TxVerifyMask;

impl TestCommand for TxVerifyMask {
    fn keyword(&self) -> &'static str {
        "TX_VERIFY_MASK"
    }

    fn inputs(&self) -> ParamMap {
        tx_inputs()
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::double(
                VIOLATION_PERCENT.name(),
                0.0,
                "%",
                "Share of spectrum points above the mask",
            ))
            .with(Parameter::double(MARGIN_DB.name(), 0.0, "dB", "Worst margin to the mask"))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let link = Link::from_inputs(inputs)?;
        let tx_power = inputs.get(TX_POWER_DBM)?;
        let label = link.label(self.keyword());
        let scale = link.bandwidth.mhz() as f64 / 20.0;

        let mut spectrum = (Vec::new(), Vec::new());
        transmit(ctx, &link, tx_power, |ctx| {
            let settings = &ctx.session.settings;
            let capture_us = match link.rate.standard {
                WifiStandard::Dsss => settings.mask_smp_tm_dsss_us,
                WifiStandard::Ofdm | WifiStandard::Ht | WifiStandard::Vht => {
                    settings.mask_smp_tm_ofdm_us
                }
            };

            ctx.capture(capture_us as f64, link.sample_freq_hz())?;
            ctx.analyze(&Analysis::Fft { resolution_bw_hz: MASK_RBW_HZ }, &label)?;
            spectrum.0 = ctx.tester.vector("x").context("Fail to read spectrum", "vector")?;
            spectrum.1 = ctx.tester.vector("y").context("Fail to read spectrum", "vector")?;
            Ok(())
        })?;

        let (mut x, y) = spectrum;
        if scale > 1.0 {
            x.iter_mut().for_each(|f| *f /= scale);
        }
        let mask = evaluate_mask(&x, &y, MaskKind::for_standard(link.rate.standard))
            .map_err(CommandError::Measurement)?;
        returns.put(VIOLATION_PERCENT, mask.violation_percent)?;
        returns.put(MARGIN_DB, mask.margin_db)?;
        Ok(())
    }
}
