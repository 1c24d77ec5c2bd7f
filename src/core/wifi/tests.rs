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

use super::*;
use crate::core::command::{ReturnCode, TestFunction};
use crate::core::executive::QueryKind;
use crate::core::iqmeasure::{Analysis, ErrorCode};
use crate::core::testing::{Station, TEST_ID};
use crate::core::vdut::TemplateDut;

fn station() -> Station {
    Station::ready(Technology::Wifi, TemplateDut::new())
}

fn count(station: &Station, call: &str) -> usize {
    station.tester.calls().iter().filter(|c| **c == call).count()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ========== Query handling ==========

#[test]
fn test_queries_touch_no_collaborator() {
    for kind in [QueryKind::Input, QueryKind::Return] {
        for command in commands() {
            let mut station = Station::new(Technology::Wifi);
            station.query(kind);
            let mut function = TestFunction::new(command);

            assert_eq!(station.invoke(&mut function), ReturnCode::Ok, "{}", function.keyword());
            assert!(station.vdut.journal().is_empty(), "{}", function.keyword());
            assert!(station.tester.calls().is_empty(), "{}", function.keyword());
        }
    }
}

#[test]
fn test_registry_keywords_are_unique() {
    let mut keywords: Vec<_> = commands().iter().map(|c| c.keyword()).collect();
    let total = keywords.len();
    keywords.sort_unstable();
    keywords.dedup();
    assert_eq!(keywords.len(), total);
}

// ========== TX_VERIFY_EVM ==========

#[test]
fn test_evm_ofdm_defaults() {
    let mut station = station();

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    assert!(station.completed());
    assert!(approx(station.double("EVM_AVG_DB"), -32.0));
    assert!(approx(station.double("EVM_MAX_DB"), -32.0));
    assert!(approx(station.double("FREQ_ERROR_AVG"), 1500.0));
    assert!(approx(station.double("SYMBOL_CLK_ERR"), 2.5));
    // 14 dBm at the tester plus 1 dB cable loss
    assert!(approx(station.double("POWER_AVG_DBM"), 15.0));

    // 15 dBm - 1 dB cable loss + 10 dB peak to average
    assert!(approx(station.tester.vsa().map(|v| v.ampl_dbm).unwrap_or_default(), 24.0));
    assert_eq!(count(&station, "capture"), 3);
    assert_eq!(
        station.tester.last_analysis(),
        Some(&Analysis::Ofdm {
            phase_correction: true,
            amplitude_tracking: false
        })
    );

    let commands = station.vdut.commands();
    let tail = &commands[commands.len() - 6..];
    assert_eq!(
        tail,
        ["TX_SET_BW", "TX_SET_DATA_RATE", "TX_SET_ANTENNA", "TX_PRE_TX", "TX_START", "TX_STOP"]
    );
}

#[test]
fn test_evm_passes_link_to_dut() {
    let mut station = station();
    station.set_input("FREQ_MHZ", 2437);
    station.set_input("DATA_RATE", "ofdm-24");

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    let start = station
        .vdut
        .journal()
        .iter()
        .find(|c| c.command == "TX_START")
        .expect("TX_START was run");
    assert_eq!(start.params.get("FREQ_MHZ"), Some(&ParamValue::Integer(2437)));
    assert_eq!(start.params.get("DATA_RATE"), Some(&ParamValue::Str("OFDM-24".into())));
    assert_eq!(start.params.get("ANT1"), Some(&ParamValue::Integer(1)));
    assert_eq!(start.params.get("ANT2"), Some(&ParamValue::Integer(0)));
    assert_eq!(start.params.get("TX_POWER_DBM"), Some(&ParamValue::Double(15.0)));
}

#[test]
fn test_evm_dsss_analysis() {
    let mut station = station();
    station.set_input("DATA_RATE", "CCK-11");
    station.session.settings.analysis_11b_eq_taps = 5;

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    assert_eq!(
        station.tester.last_analysis(),
        Some(&Analysis::Dsss {
            equalizer_taps: 5,
            dc_remove: false
        })
    );
    // 15 - 1 + 2 dB peak to average
    assert!(approx(station.tester.vsa().map(|v| v.ampl_dbm).unwrap_or_default(), 16.0));
}

#[test]
fn test_evm_mimo_needs_enough_antennas() {
    let mut station = station();
    station.set_input("DATA_RATE", "MCS15");

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
    assert!(station.message().contains("needs 2 streams"), "{}", station.message());
    assert!(!station.vdut.commands().contains(&"TX_START"));

    station.set_input("ANT2", 1);
    station.set_input("PACKET_FORMAT_11N", "GREENFIELD");
    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    assert_eq!(
        station.tester.last_analysis(),
        Some(&Analysis::Mimo {
            greenfield: true,
            ht40: false
        })
    );
}

#[test]
fn test_evm_rejects_bad_link() {
    let cases: [(&str, ParamValue, &str); 4] = [
        ("DATA_RATE", "OFDM-7".into(), "Unknown data rate OFDM-7."),
        ("BANDWIDTH", "HT40".into(), "OFDM-54 does not support HT40."),
        ("ANT1", ParamValue::Integer(0), "No antenna is enabled."),
        ("FREQ_MHZ", ParamValue::Integer(0), "FREQ_MHZ 0 is not a valid channel."),
    ];
    for (name, value, expected) in cases {
        let mut station = station();
        station.set_input(name, value);

        assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
        assert_eq!(station.message(), format!("[WiFi] {}\n", expected));
        assert!(station.tester.calls().is_empty());
    }
}

#[test]
fn test_evm_stops_dut_after_analysis_failure() {
    let mut station = station();
    station.tester = station.tester.clone().with_failure("analyze", ErrorCode::AnalysisFailed);

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
    assert!(station.message().starts_with("[WiFi] Fail to analyze 80211AG signal"));
    assert!(station.message().contains("analyze() return error"));
    assert_eq!(station.vdut.commands().last(), Some(&"TX_STOP"));

    // Only ERROR_MESSAGE is published on failure
    assert_eq!(station.exec.returns(TEST_ID).len(), 1);

    // Failed captures are saved by default
    assert_eq!(station.tester.saved_captures().len(), 1);
    assert!(station.tester.saved_captures()[0].starts_with("log/WiFi_TX_VERIFY_EVM_OFDM-54_2412MHz_"));
}

#[test]
fn test_evm_keep_transmit() {
    let mut station = station();
    station.session.settings.dut_keep_transmit = true;

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    assert!(!station.vdut.commands().contains(&"TX_STOP"));
}

#[test]
fn test_evm_save_capture_always() {
    let mut station = station();
    station.session.settings.vsa_save_capture_always = true;
    station.session.settings.evm_average = 2;

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    assert_eq!(station.tester.saved_captures().len(), 2);
}

#[test]
fn test_evm_amplitude_out_of_tolerance() {
    let mut station = station();
    station.tester = station.tester.clone().with_agc_offset(-4.0);

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
    assert_eq!(
        station.message(),
        "[WiFi] VSA amplitude 20.0 dBm is outside 3.0 dB of the expected 24.0 dBm.\n"
    );
    assert_eq!(count(&station, "capture"), 0);
    assert_eq!(station.vdut.commands().last(), Some(&"TX_STOP"));
}

#[test]
fn test_evm_amplitude_within_tolerance() {
    let mut station = station();
    station.tester = station.tester.clone().with_agc_offset(2.5);

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    assert_eq!(count(&station, "agc"), 1);
}

#[test]
fn test_evm_without_tester_connection() {
    let mut station = Station::new(Technology::Wifi);
    station.insert_dut().initialize_dut();

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
    assert!(station.message().starts_with("[WiFi] Fail to setup VSA, set_vsa() return error"));
    assert_eq!(station.vdut.commands().last(), Some(&"TX_STOP"));
}

#[test]
fn test_evm_dut_start_failure_uses_dut_message() {
    let dut = TemplateDut::new().with_failure("TX_START", Some("[TemplateDut] PA fault\n"));
    let mut station = Station::ready(Technology::Wifi, dut);

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
    assert_eq!(station.message(), "[TemplateDut] PA fault\n");
    assert!(station.tester.calls().is_empty());
}

#[test]
fn test_evm_requires_inserted_dut() {
    let mut station = Station::new(Technology::Wifi);
    station.connect_tester();

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
    assert_eq!(
        station.message(),
        "[WiFi] Test_ID or Dut not valid. Test_ID = 0 and Dut = -1.\n"
    );
}

// ========== 802.11ac ==========

fn vht_station(bandwidth: &str, rate: &str) -> Station {
    let mut station = station();
    station.set_input("FREQ_MHZ", 5210);
    station.set_input("BANDWIDTH", bandwidth);
    station.set_input("DATA_RATE", rate);
    station.set_input("PACKET_FORMAT_11N", "VHT");
    station
}

#[test]
fn test_evm_vht80() {
    let mut station = vht_station("VHT80", "MCS7");
    station.set_input("NUM_STREAM_11AC", 2);
    station.set_input("ANT2", 1);
    station.set_input("GUARD_INTERVAL_11N", "SHORT");

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Ok, "{}", station.message());
    assert_eq!(
        station.tester.last_analysis(),
        Some(&Analysis::Vht {
            bandwidth_mhz: 80,
            streams: 2,
            phase_correction: true,
            symbol_timing_correction: true,
            amplitude_tracking: false,
            full_packet_channel_estimation: false,
        })
    );
    assert!(approx(station.double("EVM_AVG_DB"), -32.0));

    let start = station
        .vdut
        .journal()
        .iter()
        .find(|c| c.command == "TX_START")
        .expect("TX_START was run");
    assert_eq!(start.params.get("BANDWIDTH"), Some(&ParamValue::Str("VHT80".into())));
    assert_eq!(start.params.get("NUM_STREAM_11AC"), Some(&ParamValue::Integer(2)));
    assert_eq!(start.params.get("GUARD_INTERVAL_11N"), Some(&ParamValue::Str("SHORT".into())));
    assert!(start.params.get("FREQ_MHZ_SECONDARY_80").is_none());
}

#[test]
fn test_vht_rejects_bad_link() {
    let cases: [(&str, &str, &[(&str, ParamValue)], &str); 7] = [
        ("HT20", "MCS7", &[], "VHT packets need a VHT bandwidth, got HT20."),
        ("VHT20", "OFDM-54", &[], "OFDM-54 is not a VHT rate."),
        ("VHT20", "MCS10", &[], "VHT supports MCS0 to MCS9, got MCS10."),
        ("VHT20", "MCS9", &[], "VHT20 does not define MCS9 with 1 streams."),
        (
            "VHT80",
            "MCS6",
            &[("NUM_STREAM_11AC", ParamValue::Integer(3)), ("ANT2", ParamValue::Integer(1)), ("ANT3", ParamValue::Integer(1))],
            "VHT80 does not define MCS6 with 3 streams.",
        ),
        (
            "VHT40",
            "MCS3",
            &[("NUM_STREAM_11AC", ParamValue::Integer(2))],
            "MCS3 needs 2 streams but only 1 antennas are enabled.",
        ),
        (
            "VHT80_80",
            "MCS3",
            &[],
            "FREQ_MHZ_SECONDARY_80 0 is not a valid channel for VHT80_80.",
        ),
    ];
    for (bandwidth, rate, extra, expected) in cases {
        let mut station = vht_station(bandwidth, rate);
        for (name, value) in extra {
            station.set_input(name, value.clone());
        }

        assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed, "{}", expected);
        assert_eq!(station.message(), format!("[WiFi] {}\n", expected));
        assert!(station.tester.calls().is_empty());
    }
}

#[test]
fn test_non_vht_format_rejects_vht_bandwidth() {
    let mut station = station();
    station.set_input("DATA_RATE", "MCS7");
    station.set_input("BANDWIDTH", "VHT40");

    assert_eq!(station.run(TxVerifyPower), ReturnCode::Failed);
    assert_eq!(station.message(), "[WiFi] VHT40 needs the VHT packet format.\n");

    station.set_input("BANDWIDTH", "HT20");
    station.set_input("PACKET_FORMAT_11N", "NON_HT");
    assert_eq!(station.run(TxVerifyPower), ReturnCode::Failed);
    assert_eq!(station.message(), "[WiFi] MCS7 cannot be sent as NON_HT.\n");

    station.set_input("DATA_RATE", "OFDM-6");
    station.set_input("GUARD_INTERVAL_11N", "SHORT");
    assert_eq!(station.run(TxVerifyPower), ReturnCode::Failed);
    assert_eq!(
        station.message(),
        "[WiFi] OFDM-6 does not support a short guard interval.\n"
    );
}

#[test]
fn test_vht80_80_passes_secondary_channel() {
    let mut station = vht_station("VHT80_80", "MCS4");
    station.set_input("FREQ_MHZ_SECONDARY_80", 5530);

    assert_eq!(station.run(TxVerifyPower), ReturnCode::Ok, "{}", station.message());
    let start = station
        .vdut
        .journal()
        .iter()
        .find(|c| c.command == "TX_START")
        .expect("TX_START was run");
    assert_eq!(start.params.get("FREQ_MHZ_SECONDARY_80"), Some(&ParamValue::Integer(5530)));
}

#[test]
fn test_mask_vht80_uses_wider_mask() {
    let mut station = vht_station("VHT80", "MCS9");

    assert_eq!(station.run(TxVerifyMask), ReturnCode::Ok, "{}", station.message());
    assert!(station.double("MARGIN_DB") > 20.0);
}

#[test]
fn test_per_vht_waveform() {
    let mut station = vht_station("VHT160", "MCS8");

    assert_eq!(station.run(RxVerifyPer), ReturnCode::Ok, "{}", station.message());
    assert_eq!(station.tester.modulation(), Some("../mod/WiFi_11AC_VHT160_S1_MCS8.mod"));
}

// ========== Cable loss ==========

#[test]
fn test_per_chain_cable_loss() {
    let mut station = station();
    station.set_input("DATA_RATE", "MCS9");
    station.set_input("ANT2", 1);
    station.set_input("CABLE_LOSS_DB", vec![1.0, 3.0]);

    assert_eq!(station.run(TxVerifyPower), ReturnCode::Ok, "{}", station.message());
    // Chains combine in linear power
    let combined = -10.0 * ((10f64.powf(-0.1) + 10f64.powf(-0.3)) / 2.0).log10();
    assert!(approx(station.double("POWER_AVERAGE_DBM"), 14.0 + combined));
    // 15 dBm - combined loss + 10 dB peak to average
    assert!(approx(
        station.tester.vsa().map(|v| v.ampl_dbm).unwrap_or_default(),
        25.0 - combined
    ));
}

#[test]
fn test_cable_loss_must_match_chains() {
    let mut station = station();
    station.set_input("ANT2", 1);
    station.set_input("DATA_RATE", "MCS3");
    station.set_input("CABLE_LOSS_DB", vec![1.0, 2.0, 3.0]);

    assert_eq!(station.run(TxVerifyEvm), ReturnCode::Failed);
    assert_eq!(
        station.message(),
        "[WiFi] CABLE_LOSS_DB has 3 values for 2 enabled antennas.\n"
    );

    station.set_input("CABLE_LOSS_DB", Vec::<f64>::new());
    assert_eq!(station.run(RxVerifyPer), ReturnCode::Failed);
    assert_eq!(station.message(), "[WiFi] CABLE_LOSS_DB is empty.\n");
    assert!(station.tester.calls().is_empty());
}

// ========== TX_VERIFY_POWER ==========

#[test]
fn test_power_adds_cable_loss() {
    let mut station = station();
    station.set_input("TX_POWER_DBM", 12.0);
    station.set_input("CABLE_LOSS_DB", 2.5);

    assert_eq!(station.run(TxVerifyPower), ReturnCode::Ok, "{}", station.message());
    assert!(approx(station.double("POWER_AVERAGE_DBM"), 16.5));
    assert!(approx(station.double("POWER_MAX_DBM"), 16.5));
    assert!(approx(station.double("POWER_MIN_DBM"), 16.5));
    assert!(approx(station.double("TARGET_POWER_DBM"), 12.0));
    assert_eq!(station.tester.last_analysis(), Some(&Analysis::Power));
    assert_eq!(count(&station, "capture"), 3);
}

#[test]
fn test_power_missing_measurement() {
    let mut station = station();
    station.tester.remove_measurement("P_av_no_gap_all_dBm");

    assert_eq!(station.run(TxVerifyPower), ReturnCode::Failed);
    assert!(station.message().contains("Fail to read P_av_no_gap_all_dBm"));
    assert_eq!(station.vdut.commands().last(), Some(&"TX_STOP"));
}

// ========== TX_VERIFY_MASK ==========

#[test]
fn test_mask_ofdm_margin() {
    let mut station = station();

    assert_eq!(station.run(TxVerifyMask), ReturnCode::Ok, "{}", station.message());
    assert!(approx(station.double("VIOLATION_PERCENT"), 0.0));
    assert!(approx(station.double("MARGIN_DB"), 4.0));
}

#[test]
fn test_mask_dsss_margin() {
    let mut station = station();
    station.set_input("DATA_RATE", "DSSS-1");

    assert_eq!(station.run(TxVerifyMask), ReturnCode::Ok, "{}", station.message());
    assert!(approx(station.double("MARGIN_DB"), 2.0));
}

#[test]
fn test_mask_ht40_uses_wider_mask() {
    let mut station = station();
    station.set_input("DATA_RATE", "MCS7");
    station.set_input("BANDWIDTH", "HT40");

    assert_eq!(station.run(TxVerifyMask), ReturnCode::Ok, "{}", station.message());
    assert!(station.double("MARGIN_DB") > 20.0);
}

#[test]
fn test_mask_violation() {
    let mut station = station();
    let x: Vec<f64> = (-20..=20).map(|i| i as f64 * 1e6).collect();
    let y: Vec<f64> = x.iter().map(|f| if f.abs() <= 9e6 { -20.0 } else { -30.0 }).collect();
    station.tester.set_measurement("x", x);
    station.tester.set_measurement("y", y);

    assert_eq!(station.run(TxVerifyMask), ReturnCode::Ok, "{}", station.message());
    assert!(station.double("VIOLATION_PERCENT") > 0.0);
    assert!(station.double("MARGIN_DB") < 0.0);
}

// ========== RX_VERIFY_PER ==========

#[test]
fn test_per_defaults() {
    let mut station = station();

    assert_eq!(station.run(RxVerifyPer), ReturnCode::Ok, "{}", station.message());
    assert!(approx(station.double("PER"), 0.5));
    assert_eq!(station.integer("GOOD_PACKETS"), 995);
    assert_eq!(station.integer("TOTAL_PACKETS"), 1000);
    assert!(approx(station.double("RX_POWER_LEVEL"), -65.0));

    let vsg = station.tester.vsg().cloned().expect("VSG configured");
    assert!(approx(vsg.power_dbm, -64.0));
    assert!(approx(vsg.freq_hz, 2412e6));
    assert_eq!(station.tester.modulation(), Some("../mod/WiFi_OFDM-54.mod"));
    assert_eq!(station.tester.frame_count(), 1000);
    assert!(!station.tester.rf_enabled());

    let commands = station.vdut.commands();
    assert!(commands.contains(&"RX_CLEAR_STATS"));
    assert_eq!(commands.last(), Some(&"RX_STOP"));
}

#[test]
fn test_per_ht40_waveform() {
    let mut station = station();
    station.set_input("DATA_RATE", "MCS7");
    station.set_input("BANDWIDTH", "HT40");

    assert_eq!(station.run(RxVerifyPer), ReturnCode::Ok, "{}", station.message());
    assert_eq!(station.tester.modulation(), Some("../mod/WiFi_HT40_MCS7.mod"));
}

#[test]
fn test_per_clamps_good_packets() {
    let mut station = Station::ready(Technology::Wifi, TemplateDut::new().with_good_packets(1200));

    assert_eq!(station.run(RxVerifyPer), ReturnCode::Ok, "{}", station.message());
    assert!(approx(station.double("PER"), 0.0));
    assert_eq!(station.integer("GOOD_PACKETS"), 1000);
}

#[test]
fn test_per_rejects_excess_vsg_power() {
    let mut station = station();
    station.set_input("RX_POWER_DBM", 10.0);

    assert_eq!(station.run(RxVerifyPer), ReturnCode::Failed);
    assert!(station.message().contains("exceeds the 10.0 dBm limit"), "{}", station.message());
    assert!(station.tester.calls().is_empty());
}

#[test]
fn test_per_waits_for_frames() {
    let mut station = station();
    station.tester = station.tester.clone().with_tx_done_polls(3);

    assert_eq!(station.run(RxVerifyPer), ReturnCode::Ok, "{}", station.message());
    assert_eq!(count(&station, "tx_done"), 4);
}

#[test]
fn test_per_timeout_turns_rf_off() {
    let mut station = station();
    station.tester = station.tester.clone().with_tx_done_polls(1_000);
    station.session.settings.vsg_timeout_sec = 0;

    assert_eq!(station.run(RxVerifyPer), ReturnCode::Failed);
    assert!(station.message().contains("tx_done() return error"));
    assert!(!station.tester.rf_enabled());
    assert!(!station.vdut.commands().contains(&"RX_STOP"));
}
