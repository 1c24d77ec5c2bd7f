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

//! IQlite test-command library
//!
//! Test functions for Wi-Fi and Bluetooth RF test stations. Each function
//! answers the executive's introspection queries, fetches typed inputs,
//! drives a DUT through the vDUT layer and an RF tester through the
//! measurement API, and publishes its results with an `ERROR_MESSAGE`.
//!
//! # Example
//!
//! ```
//! use iqlite::core::flow::{Flow, FlowRunner};
//! use iqlite::core::iqmeasure::SimulatedTester;
//! use iqlite::core::vdut::VirtualDut;
//!
//! let flow = Flow::from_toml_str(r#"
//!     [[step]]
//!     technology = "WiFi"
//!     function = "INSERT_DUT"
//! "#).unwrap();
//!
//! let mut runner = FlowRunner::new(VirtualDut::new(), SimulatedTester::new());
//! let report = runner.run(&flow);
//! assert!(report.passed);
//! ```

pub mod core;
