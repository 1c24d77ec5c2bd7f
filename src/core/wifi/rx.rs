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

use std::time::Duration;

use super::{link_inputs, Link};
use crate::core::command::{CommandContext, TestCommand, TesterResultExt};
use crate::core::error::{CommandError, CommandResult};
use crate::core::iqmeasure::VsgConfig;
use crate::core::parameter::{ParamKey, ParamMap, ParamValue, Parameter};

const RX_POWER_DBM: ParamKey<f64> = ParamKey::new("RX_POWER_DBM");

const PER: ParamKey<f64> = ParamKey::new("PER");
const GOOD_PACKETS: ParamKey<i32> = ParamKey::new("GOOD_PACKETS");
const TOTAL_PACKETS: ParamKey<i32> = ParamKey::new("TOTAL_PACKETS");
const RX_POWER_LEVEL: ParamKey<f64> = ParamKey::new("RX_POWER_LEVEL");

/// `RX_VERIFY_PER`: packet error rate of the DUT receiver
///
/// The generator plays the rate's PER waveform at `RX_POWER_DBM` (cable
/// loss compensated); the DUT counts the packets it received intact.
pub struct RxVerifyPer;

impl TestCommand for RxVerifyPer {
    fn keyword(&self) -> &'static str {
        "RX_VERIFY_PER"
    }

    fn inputs(&self) -> ParamMap {
        link_inputs().with(Parameter::double(
            RX_POWER_DBM.name(),
            -65.0,
            "dBm",
            "Signal level at the DUT",
        ))
    }

    fn returns(&self) -> ParamMap {
        ParamMap::new()
            .with(Parameter::double(PER.name(), 0.0, "%", "Packet error rate"))
            .with(Parameter::integer(GOOD_PACKETS.name(), 0, "", "Packets received intact"))
            .with(Parameter::integer(TOTAL_PACKETS.name(), 0, "", "Packets sent"))
            .with(Parameter::double(RX_POWER_LEVEL.name(), 0.0, "dBm", "Signal level at the DUT"))
    }

    fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        inputs: &ParamMap,
        returns: &mut ParamMap,
    ) -> CommandResult<()> {
        let link = Link::from_inputs(inputs)?;
        let rx_power = inputs.get(RX_POWER_DBM)?;

        let settings = &ctx.session.settings;
        let vsg_power = rx_power + link.cable_loss_db;
        let max_power = link.rate.vsg_max_power_dbm(settings);
        if vsg_power > max_power {
            return Err(CommandError::InvalidInput(format!(
                "VSG power {:.1} dBm exceeds the {:.1} dBm limit for {}.",
                vsg_power, max_power, link.rate
            )));
        }
        let frames = link.rate.per_frame_count(settings);
        if frames <= 0 {
            return Err(CommandError::InvalidInput(format!(
                "Frame count {} for {} is not positive.",
                frames, link.rate
            )));
        }
        let waveform = link.rate.per_waveform(link.bandwidth, settings);
        let vsg = VsgConfig {
            freq_hz: link.freq_hz(),
            power_dbm: vsg_power,
            port: settings.vsg_port(),
        };
        let timeout = Duration::from_secs(settings.vsg_timeout_sec.max(0) as u64);
        let settle_ms = settings.dut_rx_settle_time_ms;

        ctx.stage(&link.dut_params((RX_POWER_DBM.name(), ParamValue::Double(rx_power))))?;
        for command in [
            "RX_SET_BW",
            "RX_SET_DATA_RATE",
            "RX_SET_ANTENNA",
            "RX_PRE_RX",
            "RX_CLEAR_STATS",
            "RX_START",
        ] {
            ctx.run_dut(command)?;
        }
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
        let good = ctx.dut_integer(GOOD_PACKETS.name())?.clamp(0, frames);
        let per = (frames - good) as f64 * 100.0 / frames as f64;

        returns.put(PER, per)?;
        returns.put(GOOD_PACKETS, good)?;
        returns.put(TOTAL_PACKETS, frames)?;
        returns.put(RX_POWER_LEVEL, rx_power)?;
        log::info!(
            "[{}] {} {} MHz at {:.1} dBm: PER {:.2}%",
            ctx.prefix(),
            link.rate,
            link.freq_mhz,
            rx_power,
            per
        );
        Ok(())
    }
}
