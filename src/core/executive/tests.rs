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
use crate::core::parameter::Parameter;

#[test]
fn test_query_requires_integer_value() {
    let mut exec = InMemoryExecutive::new();
    assert!(!exec.is_query(0, QueryKind::Input));

    exec.set_input(0, "QUERY_INPUT", ParamValue::from("yes"));
    assert!(!exec.is_query(0, QueryKind::Input));

    exec.set_input(0, "QUERY_INPUT", ParamValue::Integer(0));
    assert!(exec.is_query(0, QueryKind::Input));
}

#[test]
fn test_slots_are_per_test_id() {
    let mut exec = InMemoryExecutive::new();
    exec.set_input(1, "A", ParamValue::Integer(5));
    assert_eq!(exec.input(1, "A"), Some(ParamValue::Integer(5)));
    assert_eq!(exec.input(2, "A"), None);

    exec.publish_return(2, "X", &ParamValue::Double(1.5), "dB");
    assert!(exec.returns(1).is_empty());
    assert_eq!(exec.returns(2).len(), 1);
}

#[test]
fn test_publish_overwrites_same_name() {
    let mut exec = InMemoryExecutive::new();
    exec.publish_return(0, "ERROR_MESSAGE", &ParamValue::from("first"), "");
    exec.publish_return(0, "ERROR_MESSAGE", &ParamValue::from("second"), "");
    assert_eq!(exec.returns(0).len(), 1);
    assert_eq!(exec.error_message(0), Some("second"));
}

#[test]
fn test_publish_returns_in_order() {
    let mut exec = InMemoryExecutive::new();
    let map = ParamMap::new()
        .with(Parameter::double("B", 2.0, "dBm", ""))
        .with(Parameter::string("A", "x", "", ""));
    exec.publish_returns(0, &map);

    let names: Vec<&str> = exec.returns(0).iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
    assert_eq!(exec.returns(0)[0].unit, "dBm");
}

#[test]
fn test_clear_returns_drops_descriptions() {
    let mut exec = InMemoryExecutive::new();
    let map = ParamMap::new().with(Parameter::integer("N", 1, "", "count"));
    exec.describe_inputs(0, &map);
    exec.describe_returns(0, &map);
    exec.publish_return(0, "N", &ParamValue::Integer(1), "");

    exec.clear_returns(0);
    assert!(exec.returns(0).is_empty());
    assert!(exec.input_description(0).is_none());
    assert!(exec.return_description(0).is_none());
}

#[test]
fn test_clear_inputs() {
    let mut exec = InMemoryExecutive::new();
    exec.set_query(0, QueryKind::Return);
    exec.set_input(0, "A", ParamValue::Integer(1));
    exec.clear_inputs(0);
    assert!(!exec.is_query(0, QueryKind::Return));
    assert_eq!(exec.input(0, "A"), None);
}
