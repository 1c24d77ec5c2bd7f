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

//! Test Executive seam
//!
//! The Test Executive owns the values a test function reads and the results
//! it publishes. Every exchange is keyed by the executive's test id.
//!
//! # Introspection
//!
//! The executive asks a function to describe itself by passing an integer
//! `QUERY_INPUT` or `QUERY_RETURN` input. The default [`TestExecutive::is_query`]
//! implements exactly that check on top of [`TestExecutive::input`].
//!
//! # Example
//!
//! ```
//! use iqlite::core::executive::{InMemoryExecutive, QueryKind, TestExecutive};
//! use iqlite::core::parameter::ParamValue;
//!
//! let mut exec = InMemoryExecutive::new();
//! exec.set_input(0, "FREQ_MHZ", ParamValue::Integer(2412));
//! exec.set_query(0, QueryKind::Input);
//!
//! assert!(exec.is_query(0, QueryKind::Input));
//! assert!(!exec.is_query(0, QueryKind::Return));
//! assert_eq!(exec.input(0, "FREQ_MHZ"), Some(ParamValue::Integer(2412)));
//! ```

use std::collections::HashMap;

use serde::Serialize;

use super::parameter::{ParamMap, ParamValue};

/// Introspection request kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Input,
    Return,
}

impl QueryKind {
    /// Input name the executive sets to request the description
    pub fn keyword(self) -> &'static str {
        match self {
            QueryKind::Input => "QUERY_INPUT",
            QueryKind::Return => "QUERY_RETURN",
        }
    }
}

/// Interface to the hosting Test Executive
///
/// Calls are serialized by the caller; implementations need no locking.
pub trait TestExecutive {
    /// Value of an input, or `None` when the executive has none
    fn input(&self, test_id: i32, name: &str) -> Option<ParamValue>;

    /// Whether the executive requests an introspection answer
    fn is_query(&self, test_id: i32, kind: QueryKind) -> bool {
        matches!(
            self.input(test_id, kind.keyword()),
            Some(ParamValue::Integer(_))
        )
    }

    /// Drop every result published so far for `test_id`
    fn clear_returns(&mut self, test_id: i32);

    /// Publish one result
    fn publish_return(&mut self, test_id: i32, name: &str, value: &ParamValue, unit: &str);

    /// Publish every slot of a return map in declaration order
    fn publish_returns(&mut self, test_id: i32, returns: &ParamMap) {
        for param in returns.iter() {
            self.publish_return(test_id, &param.name, &param.value, &param.unit);
        }
    }

    /// Answer a `QUERY_INPUT` request
    fn describe_inputs(&mut self, test_id: i32, inputs: &ParamMap);

    /// Answer a `QUERY_RETURN` request
    fn describe_returns(&mut self, test_id: i32, returns: &ParamMap);
}

/// One published result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedReturn {
    pub name: String,
    pub value: ParamValue,
    pub unit: String,
}

#[derive(Debug, Default, Clone)]
struct TestSlot {
    inputs: HashMap<String, ParamValue>,
    returns: Vec<PublishedReturn>,
    input_description: Option<ParamMap>,
    return_description: Option<ParamMap>,
}

/// Executive stand-in that keeps everything in memory
///
/// Used by the flow runner and by tests. Inputs persist until cleared so a
/// caller can stage them before an invocation.
#[derive(Debug, Default, Clone)]
pub struct InMemoryExecutive {
    slots: HashMap<i32, TestSlot>,
}

impl InMemoryExecutive {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, test_id: i32) -> &mut TestSlot {
        self.slots.entry(test_id).or_default()
    }

    pub fn set_input(&mut self, test_id: i32, name: &str, value: ParamValue) {
        self.slot_mut(test_id).inputs.insert(name.to_string(), value);
    }

    pub fn remove_input(&mut self, test_id: i32, name: &str) {
        self.slot_mut(test_id).inputs.remove(name);
    }

    /// Drop all staged inputs, including query requests
    pub fn clear_inputs(&mut self, test_id: i32) {
        self.slot_mut(test_id).inputs.clear();
    }

    /// Stage a `QUERY_INPUT` / `QUERY_RETURN` request
    pub fn set_query(&mut self, test_id: i32, kind: QueryKind) {
        self.set_input(test_id, kind.keyword(), ParamValue::Integer(1));
    }

    pub fn returns(&self, test_id: i32) -> &[PublishedReturn] {
        self.slots
            .get(&test_id)
            .map(|slot| slot.returns.as_slice())
            .unwrap_or(&[])
    }

    pub fn return_value(&self, test_id: i32, name: &str) -> Option<&ParamValue> {
        self.returns(test_id)
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.value)
    }

    /// Published `ERROR_MESSAGE`, if any
    pub fn error_message(&self, test_id: i32) -> Option<&str> {
        self.return_value(test_id, "ERROR_MESSAGE")
            .and_then(ParamValue::as_str)
    }

    pub fn input_description(&self, test_id: i32) -> Option<&ParamMap> {
        self.slots
            .get(&test_id)
            .and_then(|slot| slot.input_description.as_ref())
    }

    pub fn return_description(&self, test_id: i32) -> Option<&ParamMap> {
        self.slots
            .get(&test_id)
            .and_then(|slot| slot.return_description.as_ref())
    }
}

impl TestExecutive for InMemoryExecutive {
    fn input(&self, test_id: i32, name: &str) -> Option<ParamValue> {
        self.slots
            .get(&test_id)
            .and_then(|slot| slot.inputs.get(name))
            .cloned()
    }

    fn clear_returns(&mut self, test_id: i32) {
        let slot = self.slot_mut(test_id);
        slot.returns.clear();
        slot.input_description = None;
        slot.return_description = None;
    }

    fn publish_return(&mut self, test_id: i32, name: &str, value: &ParamValue, unit: &str) {
        let returns = &mut self.slot_mut(test_id).returns;
        let published = PublishedReturn {
            name: name.to_string(),
            value: value.clone(),
            unit: unit.to_string(),
        };
        match returns.iter_mut().find(|r| r.name == name) {
            Some(existing) => *existing = published,
            None => returns.push(published),
        }
    }

    fn describe_inputs(&mut self, test_id: i32, inputs: &ParamMap) {
        self.slot_mut(test_id).input_description = Some(inputs.clone());
    }

    fn describe_returns(&mut self, test_id: i32, returns: &ParamMap) {
        self.slot_mut(test_id).return_description = Some(returns.clone());
    }
}

#[cfg(test)]
mod tests;
