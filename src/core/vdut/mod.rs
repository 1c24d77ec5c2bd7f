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

//! Virtual DUT control
//!
//! Test functions drive the device under test through the [`DutControl`]
//! trait: register a control library for a technology, stage named
//! parameters, run a command keyword and read back named returns.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                VirtualDut                   │
//! ├─────────────────────────────────────────────┤
//! │  drivers: "TEMPLATEDUT.DLL" → factory       │
//! │  devices: handle → Device {                 │
//! │      driver: Box<dyn DutDriver>,            │
//! │      params, returns                        │
//! │  }                                          │
//! │                                             │
//! │  run(handle, cmd) {                         │
//! │    device.returns.clear()                   │
//! │    device.driver.run(cmd, params, returns)  │
//! │  }                                          │
//! └─────────────────────────────────────────────┘
//!                      ▲
//!                      │
//!               ┌──────┴──────┐
//!               │ TemplateDut │
//!               │ (DutDriver) │
//!               └─────────────┘
//! ```
//!
//! A failing driver may leave an `ERROR_MESSAGE` string in its returns;
//! callers prefer that text over a generic message.
//!
//! # Example
//!
//! ```
//! use iqlite::core::session::Technology;
//! use iqlite::core::vdut::{DutControl, VirtualDut};
//!
//! let mut vdut = VirtualDut::new();
//! let dut = vdut.register_dut_dll(Technology::Wifi, "TemplateDut.DLL").unwrap();
//! vdut.run(dut, "INSERT_DUT").unwrap();
//! vdut.run(dut, "GET_SERIAL_NUMBER").unwrap();
//! assert!(!vdut.get_string_return(dut, "SERIAL_NUMBER").unwrap().is_empty());
//! ```

use std::collections::{BTreeMap, HashMap};

use super::error::DutError;
use super::parameter::ParamValue;
use super::session::{DutHandle, Technology};

pub mod template;

pub use template::TemplateDut;

/// Result type for DUT-control calls
pub type DutResult<T> = std::result::Result<T, DutError>;

/// Named values exchanged with a DUT driver
pub type DutValues = BTreeMap<String, ParamValue>;

/// Trait for the DUT-control interface
pub trait DutControl {
    /// Load a control library for a technology and return its handle
    ///
    /// # Errors
    ///
    /// `LibraryNotFound` when no driver is known under `dll`
    fn register_dut_dll(&mut self, technology: Technology, dll: &str) -> DutResult<DutHandle>;

    /// Unload the library behind `dut`
    fn unregister_dut_dll(&mut self, dut: DutHandle) -> DutResult<()>;

    /// Drop every staged parameter
    fn clear_parameters(&mut self, dut: DutHandle) -> DutResult<()>;

    /// Stage a parameter for the next command
    fn add_parameter(&mut self, dut: DutHandle, name: &str, value: ParamValue) -> DutResult<()>;

    /// Run a command keyword with the staged parameters
    ///
    /// # Errors
    ///
    /// `CommandFailed` when the device rejects the command. The device's
    /// own explanation, if any, is available as the `ERROR_MESSAGE` return.
    fn run(&mut self, dut: DutHandle, command: &str) -> DutResult<()>;

    /// Return value of the last command
    fn get_return(&self, dut: DutHandle, name: &str) -> DutResult<ParamValue>;

    fn get_string_return(&self, dut: DutHandle, name: &str) -> DutResult<String> {
        match self.get_return(dut, name)? {
            ParamValue::Str(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    fn get_integer_return(&self, dut: DutHandle, name: &str) -> DutResult<i32> {
        self.get_return(dut, name)?
            .as_i32()
            .ok_or_else(|| DutError::NoSuchReturn(name.to_string()))
    }

    /// Version string of the DUT-control layer
    fn version(&self) -> String;
}

/// A device behind a control library
///
/// `returns` is empty when `run` is called. A driver signals failure by
/// returning `Err`; it may set `ERROR_MESSAGE` in `returns` first.
pub trait DutDriver {
    fn run(&mut self, command: &str, params: &DutValues, returns: &mut DutValues) -> DutResult<()>;
}

type DriverFactory = Box<dyn Fn() -> Box<dyn DutDriver>>;

struct Device {
    technology: Technology,
    dll: String,
    driver: Box<dyn DutDriver>,
    params: DutValues,
    returns: DutValues,
}

/// Record of one command run through [`VirtualDut`]
#[derive(Debug, Clone, PartialEq)]
pub struct DutCall {
    pub dut: DutHandle,
    pub command: String,
    pub params: DutValues,
    pub succeeded: bool,
}

/// In-process DUT-control layer hosting drivers by library filename
pub struct VirtualDut {
    drivers: HashMap<String, DriverFactory>,
    devices: Vec<Option<Device>>,
    journal: Vec<DutCall>,
    registrations: usize,
}

/// Default control library served by [`VirtualDut::new`]
pub const TEMPLATE_DUT_DLL: &str = "TemplateDut.DLL";

impl VirtualDut {
    /// Create a layer that serves [`TemplateDut`] as `TemplateDut.DLL`
    pub fn new() -> Self {
        Self::empty().with_driver(TEMPLATE_DUT_DLL, TemplateDut::new())
    }

    /// Create a layer with no drivers
    pub fn empty() -> Self {
        Self {
            drivers: HashMap::new(),
            devices: Vec::new(),
            journal: Vec::new(),
            registrations: 0,
        }
    }

    /// Serve clones of `driver` under the library name `dll`
    pub fn with_driver<D>(mut self, dll: &str, driver: D) -> Self
    where
        D: DutDriver + Clone + 'static,
    {
        self.register_driver(dll, move || Box::new(driver.clone()));
        self
    }

    /// Serve drivers built by `factory` under the library name `dll`
    ///
    /// Library names are matched case-insensitively.
    pub fn register_driver<F>(&mut self, dll: &str, factory: F)
    where
        F: Fn() -> Box<dyn DutDriver> + 'static,
    {
        self.drivers.insert(dll.to_ascii_uppercase(), Box::new(factory));
    }

    /// Commands run so far, oldest first
    pub fn journal(&self) -> &[DutCall] {
        &self.journal
    }

    /// Command keywords run so far
    pub fn commands(&self) -> Vec<&str> {
        self.journal.iter().map(|c| c.command.as_str()).collect()
    }

    /// Number of successful library registrations
    pub fn registrations(&self) -> usize {
        self.registrations
    }

    /// Library name and technology behind a handle
    pub fn describe(&self, dut: DutHandle) -> Option<(Technology, &str)> {
        self.device(dut).ok().map(|d| (d.technology, d.dll.as_str()))
    }

    fn device(&self, dut: DutHandle) -> DutResult<&Device> {
        usize::try_from(dut.0)
            .ok()
            .and_then(|index| self.devices.get(index))
            .and_then(Option::as_ref)
            .ok_or(DutError::InvalidHandle(dut.0))
    }

    fn device_mut(&mut self, dut: DutHandle) -> DutResult<&mut Device> {
        usize::try_from(dut.0)
            .ok()
            .and_then(|index| self.devices.get_mut(index))
            .and_then(Option::as_mut)
            .ok_or(DutError::InvalidHandle(dut.0))
    }
}

impl Default for VirtualDut {
    fn default() -> Self {
        Self::new()
    }
}

impl DutControl for VirtualDut {
    fn register_dut_dll(&mut self, technology: Technology, dll: &str) -> DutResult<DutHandle> {
        let factory = self
            .drivers
            .get(&dll.to_ascii_uppercase())
            .ok_or_else(|| DutError::LibraryNotFound(dll.to_string()))?;

        let device = Device {
            technology,
            dll: dll.to_string(),
            driver: factory(),
            params: DutValues::new(),
            returns: DutValues::new(),
        };

        // A technology has at most one library loaded at a time
        for slot in self.devices.iter_mut() {
            if slot.as_ref().is_some_and(|d| d.technology == technology) {
                *slot = None;
            }
        }

        let index = match self.devices.iter().position(Option::is_none) {
            Some(index) => {
                self.devices[index] = Some(device);
                index
            }
            None => {
                self.devices.push(Some(device));
                self.devices.len() - 1
            }
        };
        self.registrations += 1;

        let handle = DutHandle(index as i32);
        log::debug!("[{}] registered {} as DUT {}", technology, dll, handle);
        Ok(handle)
    }

    fn unregister_dut_dll(&mut self, dut: DutHandle) -> DutResult<()> {
        self.device(dut)?;
        if let Some(slot) = usize::try_from(dut.0).ok().and_then(|i| self.devices.get_mut(i)) {
            *slot = None;
        }
        log::debug!("unregistered DUT {}", dut);
        Ok(())
    }

    fn clear_parameters(&mut self, dut: DutHandle) -> DutResult<()> {
        self.device_mut(dut)?.params.clear();
        Ok(())
    }

    fn add_parameter(&mut self, dut: DutHandle, name: &str, value: ParamValue) -> DutResult<()> {
        self.device_mut(dut)?.params.insert(name.to_string(), value);
        Ok(())
    }

    fn run(&mut self, dut: DutHandle, command: &str) -> DutResult<()> {
        let device = self.device_mut(dut)?;
        device.returns.clear();
        let result = device
            .driver
            .run(command, &device.params, &mut device.returns);
        let params = device.params.clone();

        self.journal.push(DutCall {
            dut,
            command: command.to_string(),
            params,
            succeeded: result.is_ok(),
        });

        result.map_err(|e| {
            log::debug!("DUT {} command {} failed: {}", dut, command, e);
            DutError::CommandFailed {
                command: command.to_string(),
            }
        })
    }

    fn get_return(&self, dut: DutHandle, name: &str) -> DutResult<ParamValue> {
        self.device(dut)?
            .returns
            .get(name)
            .cloned()
            .ok_or_else(|| DutError::NoSuchReturn(name.to_string()))
    }

    fn version(&self) -> String {
        format!("vDUT {}", env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests;
