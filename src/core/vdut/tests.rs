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

fn inserted(vdut: &mut VirtualDut) -> DutHandle {
    let dut = vdut
        .register_dut_dll(Technology::Wifi, TEMPLATE_DUT_DLL)
        .unwrap();
    vdut.run(dut, "INSERT_DUT").unwrap();
    dut
}

fn initialized(vdut: &mut VirtualDut) -> DutHandle {
    let dut = inserted(vdut);
    vdut.run(dut, "INITIALIZE_DUT").unwrap();
    dut
}

#[test]
fn test_register_is_case_insensitive() {
    let mut vdut = VirtualDut::new();
    let dut = vdut
        .register_dut_dll(Technology::Bluetooth, "templatedut.dll")
        .unwrap();
    assert!(dut.is_valid());
    assert_eq!(
        vdut.describe(dut),
        Some((Technology::Bluetooth, "templatedut.dll"))
    );
}

#[test]
fn test_unknown_library() {
    let mut vdut = VirtualDut::new();
    assert_eq!(
        vdut.register_dut_dll(Technology::Wifi, "Missing.DLL"),
        Err(DutError::LibraryNotFound("Missing.DLL".to_string()))
    );
    assert_eq!(vdut.registrations(), 0);
}

#[test]
fn test_reregister_replaces_device_of_same_technology() {
    let mut vdut = VirtualDut::new();
    let first = vdut
        .register_dut_dll(Technology::Wifi, TEMPLATE_DUT_DLL)
        .unwrap();
    let bt = vdut
        .register_dut_dll(Technology::Bluetooth, TEMPLATE_DUT_DLL)
        .unwrap();
    let second = vdut
        .register_dut_dll(Technology::Wifi, TEMPLATE_DUT_DLL)
        .unwrap();

    assert_ne!(first, bt);
    assert!(vdut.describe(second).is_some());
    assert!(vdut.describe(bt).is_some());
    assert_eq!(vdut.registrations(), 3);
}

#[test]
fn test_unregister_invalidates_handle() {
    let mut vdut = VirtualDut::new();
    let dut = inserted(&mut vdut);
    vdut.unregister_dut_dll(dut).unwrap();
    assert_eq!(
        vdut.run(dut, "GET_SERIAL_NUMBER"),
        Err(DutError::InvalidHandle(dut.0))
    );
    assert_eq!(
        vdut.unregister_dut_dll(DutHandle::INVALID),
        Err(DutError::InvalidHandle(-1))
    );
}

#[test]
fn test_insert_reports_version() {
    let mut vdut = VirtualDut::new();
    let dut = inserted(&mut vdut);
    assert_eq!(
        vdut.get_string_return(dut, "DUT_VERSION").unwrap(),
        "TemplateDut 1.0.0"
    );
}

#[test]
fn test_commands_require_insertion() {
    let mut vdut = VirtualDut::new();
    let dut = vdut
        .register_dut_dll(Technology::Wifi, TEMPLATE_DUT_DLL)
        .unwrap();
    assert!(vdut.run(dut, "GET_SERIAL_NUMBER").is_err());
    let message = vdut.get_string_return(dut, "ERROR_MESSAGE").unwrap();
    assert_eq!(message, "[TemplateDut] DUT is not inserted.\n");
}

#[test]
fn test_returns_cleared_between_commands() {
    let mut vdut = VirtualDut::new();
    let dut = inserted(&mut vdut);
    vdut.run(dut, "GET_SERIAL_NUMBER").unwrap();
    assert!(vdut.get_return(dut, "SERIAL_NUMBER").is_ok());
    vdut.run(dut, "INITIALIZE_DUT").unwrap();
    assert_eq!(
        vdut.get_return(dut, "SERIAL_NUMBER"),
        Err(DutError::NoSuchReturn("SERIAL_NUMBER".to_string()))
    );
}

#[test]
fn test_register_write_then_read() {
    let mut vdut = VirtualDut::new();
    let dut = inserted(&mut vdut);

    vdut.clear_parameters(dut).unwrap();
    vdut.add_parameter(dut, "ADDRESS", ParamValue::Integer(0x40))
        .unwrap();
    vdut.add_parameter(dut, "DATA", ParamValue::Integer(0x1234))
        .unwrap();
    vdut.run(dut, "WRITE_RF_REGISTER").unwrap();

    vdut.clear_parameters(dut).unwrap();
    vdut.add_parameter(dut, "ADDRESS", ParamValue::Integer(0x40))
        .unwrap();
    vdut.run(dut, "READ_RF_REGISTER").unwrap();
    assert_eq!(vdut.get_integer_return(dut, "DATA").unwrap(), 0x1234);

    // Spaces are independent
    vdut.run(dut, "READ_BB_REGISTER").unwrap();
    assert_eq!(vdut.get_integer_return(dut, "DATA").unwrap(), 0);
}

#[test]
fn test_register_read_needs_address() {
    let mut vdut = VirtualDut::new();
    let dut = inserted(&mut vdut);
    vdut.clear_parameters(dut).unwrap();
    assert!(vdut.run(dut, "READ_EEPROM").is_err());
}

#[test]
fn test_unknown_command_reports_message() {
    let mut vdut = VirtualDut::new();
    let dut = inserted(&mut vdut);
    assert_eq!(
        vdut.run(dut, "SELF_DESTRUCT"),
        Err(DutError::CommandFailed {
            command: "SELF_DESTRUCT".to_string()
        })
    );
    assert!(vdut
        .get_string_return(dut, "ERROR_MESSAGE")
        .unwrap()
        .contains("Unknown command SELF_DESTRUCT"));
}

#[test]
fn test_injected_failure_without_message() {
    let template = TemplateDut::new().with_failure("TX_START", None);
    let mut vdut = VirtualDut::empty().with_driver(TEMPLATE_DUT_DLL, template);
    let dut = inserted(&mut vdut);

    assert!(vdut.run(dut, "TX_START").is_err());
    assert!(vdut.get_return(dut, "ERROR_MESSAGE").is_err());
}

#[test]
fn test_rx_stop_reports_counters() {
    let template = TemplateDut::new()
        .with_good_packets(900)
        .with_bit_errors(5, 1000);
    let mut vdut = VirtualDut::empty().with_driver(TEMPLATE_DUT_DLL, template);
    let dut = initialized(&mut vdut);

    assert!(vdut.run(dut, "RX_STOP").is_err());
    vdut.run(dut, "RX_START").unwrap();
    vdut.run(dut, "RX_STOP").unwrap();
    assert_eq!(vdut.get_integer_return(dut, "GOOD_PACKETS").unwrap(), 900);
    assert_eq!(vdut.get_integer_return(dut, "BIT_ERRORS").unwrap(), 5);
    assert_eq!(vdut.get_integer_return(dut, "TOTAL_BITS").unwrap(), 1000);
}

#[test]
fn test_journal_records_params() {
    let mut vdut = VirtualDut::new();
    let dut = initialized(&mut vdut);
    vdut.clear_parameters(dut).unwrap();
    vdut.add_parameter(dut, "DATA_RATE", ParamValue::from("OFDM-54"))
        .unwrap();
    vdut.run(dut, "TX_SET_DATA_RATE").unwrap();

    assert_eq!(
        vdut.commands(),
        vec!["INSERT_DUT", "INITIALIZE_DUT", "TX_SET_DATA_RATE"]
    );
    let last = vdut.journal().last().unwrap();
    assert_eq!(
        last.params.get("DATA_RATE"),
        Some(&ParamValue::from("OFDM-54"))
    );
    assert!(last.succeeded);
}

#[test]
fn test_custom_driver() {
    #[derive(Clone)]
    struct Echo;

    impl DutDriver for Echo {
        fn run(&mut self, command: &str, _: &DutValues, returns: &mut DutValues) -> DutResult<()> {
            returns.insert("ECHO".to_string(), ParamValue::from(command));
            Ok(())
        }
    }

    let mut vdut = VirtualDut::new().with_driver("Echo.dll", Echo);
    let dut = vdut.register_dut_dll(Technology::Wifi, "ECHO.DLL").unwrap();
    vdut.run(dut, "PING").unwrap();
    assert_eq!(vdut.get_string_return(dut, "ECHO").unwrap(), "PING");
}

#[test]
fn test_radio_commands_need_initialization() {
    let mut vdut = VirtualDut::new();
    let dut = inserted(&mut vdut);

    for command in ["TX_SET_BW", "TX_START", "RX_START"] {
        assert!(vdut.run(dut, command).is_err(), "{}", command);
        assert_eq!(
            vdut.get_string_return(dut, "ERROR_MESSAGE").unwrap(),
            "[TemplateDut] DUT is not initialized.\n"
        );
    }

    vdut.run(dut, "INITIALIZE_DUT").unwrap();
    vdut.run(dut, "TX_SET_BW").unwrap();
}

#[test]
fn test_tx_stop_needs_running_transmitter() {
    let mut vdut = VirtualDut::new();
    let dut = initialized(&mut vdut);

    assert!(vdut.run(dut, "TX_STOP").is_err());
    assert_eq!(
        vdut.get_string_return(dut, "ERROR_MESSAGE").unwrap(),
        "[TemplateDut] Transmitter is not running.\n"
    );

    vdut.run(dut, "TX_START").unwrap();
    vdut.run(dut, "TX_STOP").unwrap();
    assert!(vdut.run(dut, "TX_STOP").is_err());
}

#[test]
fn test_remove_dut_resets_radio_state() {
    let mut vdut = VirtualDut::new();
    let dut = initialized(&mut vdut);
    vdut.run(dut, "TX_START").unwrap();

    vdut.run(dut, "REMOVE_DUT").unwrap();
    vdut.run(dut, "INSERT_DUT").unwrap();
    assert!(vdut.run(dut, "TX_STOP").is_err());
    assert_eq!(
        vdut.get_string_return(dut, "ERROR_MESSAGE").unwrap(),
        "[TemplateDut] DUT is not initialized.\n"
    );
}
