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

//! Template DUT driver
//!
//! A simulated radio served as `TemplateDut.DLL`. It understands the
//! lifecycle, identity, register, EEPROM, TX and RX command keywords and
//! rejects anything else with an `ERROR_MESSAGE`.
//!
//! TX and RX keywords need `INITIALIZE_DUT` after insertion; `TX_STOP`
//! and `RX_STOP` need a running transmitter or receiver.

use std::collections::HashMap;

use super::{DutDriver, DutResult, DutValues};
use crate::core::error::DutError;
use crate::core::parameter::ParamValue;

/// Register spaces addressed by `READ_<SPACE>_REGISTER` / `WRITE_<SPACE>_REGISTER`
const REGISTER_SPACES: [&str; 4] = ["BB", "RF", "MAC", "SOC"];

/// Simulated device behind `TemplateDut.DLL`
#[derive(Debug, Clone)]
pub struct TemplateDut {
    inserted: bool,
    initialized: bool,
    serial_number: String,
    version: Option<String>,
    mac_address: String,
    bd_address: String,
    /// (space, address) → data
    registers: HashMap<(String, i32), i32>,
    tx_active: bool,
    rx_active: bool,
    good_packets: i32,
    bit_errors: i32,
    total_bits: i32,
    /// command → optional ERROR_MESSAGE text
    failures: HashMap<String, Option<String>>,
    panic_on: Option<String>,
}

impl TemplateDut {
    pub fn new() -> Self {
        Self {
            inserted: false,
            initialized: false,
            serial_number: "TPL-000001".to_string(),
            version: Some("TemplateDut 1.0.0".to_string()),
            mac_address: "00:11:22:33:44:55".to_string(),
            bd_address: "00:11:22:AA:BB:CC".to_string(),
            registers: HashMap::new(),
            tx_active: false,
            rx_active: false,
            good_packets: 995,
            bit_errors: 12,
            total_bits: 1_000_000,
            failures: HashMap::new(),
            panic_on: None,
        }
    }

    pub fn with_serial_number(mut self, serial: &str) -> Self {
        self.serial_number = serial.to_string();
        self
    }

    /// Do not report `DUT_VERSION` on insertion
    pub fn without_version(mut self) -> Self {
        self.version = None;
        self
    }

    /// Packets the receiver reports as good on `RX_STOP`
    pub fn with_good_packets(mut self, good: i32) -> Self {
        self.good_packets = good;
        self
    }

    /// Bit error counts reported on `RX_STOP`
    pub fn with_bit_errors(mut self, errors: i32, total: i32) -> Self {
        self.bit_errors = errors;
        self.total_bits = total;
        self
    }

    /// Make `command` fail, optionally with an `ERROR_MESSAGE`
    pub fn with_failure(mut self, command: &str, message: Option<&str>) -> Self {
        self.failures
            .insert(command.to_string(), message.map(str::to_string));
        self
    }

    /// Panic while running `command`
    pub fn with_panic(mut self, command: &str) -> Self {
        self.panic_on = Some(command.to_string());
        self
    }

    fn fail(returns: &mut DutValues, command: &str, message: String) -> DutResult<()> {
        returns.insert(
            "ERROR_MESSAGE".to_string(),
            ParamValue::Str(format!("[TemplateDut] {}\n", message)),
        );
        Err(DutError::CommandFailed {
            command: command.to_string(),
        })
    }

    fn integer(params: &DutValues, name: &str) -> Option<i32> {
        params.get(name).and_then(ParamValue::as_i32)
    }

    fn register_access(
        &mut self,
        command: &str,
        params: &DutValues,
        returns: &mut DutValues,
    ) -> Option<DutResult<()>> {
        let (write, rest) = if let Some(rest) = command.strip_prefix("READ_") {
            (false, rest)
        } else if let Some(rest) = command.strip_prefix("WRITE_") {
            (true, rest)
        } else {
            return None;
        };

        let space = if rest == "EEPROM" {
            rest
        } else {
            let space = rest.strip_suffix("_REGISTER")?;
            if !REGISTER_SPACES.contains(&space) {
                return None;
            }
            space
        };

        let Some(address) = Self::integer(params, "ADDRESS") else {
            return Some(Self::fail(returns, command, "ADDRESS is missing.".to_string()));
        };
        if address < 0 {
            return Some(Self::fail(
                returns,
                command,
                format!("Invalid address {}.", address),
            ));
        }

        let key = (space.to_string(), address);
        if write {
            let Some(data) = Self::integer(params, "DATA") else {
                return Some(Self::fail(returns, command, "DATA is missing.".to_string()));
            };
            self.registers.insert(key, data);
        } else {
            let data = self.registers.get(&key).copied().unwrap_or(0);
            returns.insert("DATA".to_string(), ParamValue::Integer(data));
        }
        Some(Ok(()))
    }
}

impl Default for TemplateDut {
    fn default() -> Self {
        Self::new()
    }
}

impl DutDriver for TemplateDut {
    fn run(&mut self, command: &str, params: &DutValues, returns: &mut DutValues) -> DutResult<()> {
        if self.panic_on.as_deref() == Some(command) {
            panic!("TemplateDut fault in {}", command);
        }
        if let Some(message) = self.failures.get(command) {
            if let Some(message) = message {
                returns.insert("ERROR_MESSAGE".to_string(), ParamValue::Str(message.clone()));
            }
            return Err(DutError::CommandFailed {
                command: command.to_string(),
            });
        }

        match command {
            "DEVICE_TYPE_UART" | "DEVICE_TYPE_SOCKET" => return Ok(()),
            "INSERT_DUT" => {
                self.inserted = true;
                if let Some(version) = &self.version {
                    returns.insert("DUT_VERSION".to_string(), ParamValue::Str(version.clone()));
                }
                return Ok(());
            }
            _ => {}
        }

        if !self.inserted {
            return Self::fail(returns, command, "DUT is not inserted.".to_string());
        }

        if let Some(result) = self.register_access(command, params, returns) {
            return result;
        }

        if (command.starts_with("TX_") || command.starts_with("RX_")) && !self.initialized {
            return Self::fail(returns, command, "DUT is not initialized.".to_string());
        }

        match command {
            "INITIALIZE_DUT" => self.initialized = true,
            "REMOVE_DUT" => {
                self.inserted = false;
                self.initialized = false;
                self.tx_active = false;
                self.rx_active = false;
            }
            "GET_SERIAL_NUMBER" => {
                returns.insert(
                    "SERIAL_NUMBER".to_string(),
                    ParamValue::Str(self.serial_number.clone()),
                );
            }
            "READ_MAC_ADDRESS" => {
                returns.insert(
                    "MAC_ADDRESS".to_string(),
                    ParamValue::Str(self.mac_address.clone()),
                );
            }
            "WRITE_MAC_ADDRESS" => match params.get("MAC_ADDRESS").and_then(ParamValue::as_str) {
                Some(mac) => self.mac_address = mac.to_string(),
                None => return Self::fail(returns, command, "MAC_ADDRESS is missing.".to_string()),
            },
            "READ_BD_ADDRESS" => {
                returns.insert(
                    "BD_ADDRESS".to_string(),
                    ParamValue::Str(self.bd_address.clone()),
                );
            }
            "WRITE_BD_ADDRESS" => match params.get("BD_ADDRESS").and_then(ParamValue::as_str) {
                Some(addr) => self.bd_address = addr.to_string(),
                None => return Self::fail(returns, command, "BD_ADDRESS is missing.".to_string()),
            },
            "TX_SET_BW" | "TX_SET_DATA_RATE" | "TX_SET_ANTENNA" | "TX_PRE_TX" => {}
            "TX_START" => self.tx_active = true,
            "TX_STOP" => {
                if !self.tx_active {
                    return Self::fail(returns, command, "Transmitter is not running.".to_string());
                }
                self.tx_active = false;
            }
            "RX_SET_BW" | "RX_SET_DATA_RATE" | "RX_SET_ANTENNA" | "RX_PRE_RX" => {}
            "RX_CLEAR_STATS" => {}
            "RX_START" => self.rx_active = true,
            "RX_STOP" => {
                if !self.rx_active {
                    return Self::fail(returns, command, "Receiver is not running.".to_string());
                }
                self.rx_active = false;
                returns.insert("GOOD_PACKETS".to_string(), ParamValue::Integer(self.good_packets));
                returns.insert("BIT_ERRORS".to_string(), ParamValue::Integer(self.bit_errors));
                returns.insert("TOTAL_BITS".to_string(), ParamValue::Integer(self.total_bits));
            }
            other => {
                return Self::fail(returns, command, format!("Unknown command {}.", other));
            }
        }
        Ok(())
    }
}
