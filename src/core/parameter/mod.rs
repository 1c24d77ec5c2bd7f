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

//! Typed parameter registry
//!
//! Every test function declares two parameter maps: the inputs it reads from
//! the Test Executive and the returns it publishes back. A map is an
//! insertion-ordered list of [`Parameter`] descriptors keyed by a unique
//! name. Values are tagged ([`ParamValue`]) so a slot can never be read as
//! the wrong type.
//!
//! # Typed keys
//!
//! Commands declare their parameter names as [`ParamKey`] constants. The
//! key carries the Rust type of the slot, so reads and writes through the
//! key are checked at compile time:
//!
//! ```
//! use iqlite::core::parameter::{ParamKey, ParamMap, Parameter};
//!
//! const FREQ_MHZ: ParamKey<i32> = ParamKey::new("FREQ_MHZ");
//!
//! let mut map = ParamMap::new().with(Parameter::integer("FREQ_MHZ", 2412, "MHz", "Channel"));
//! assert_eq!(map.get(FREQ_MHZ).unwrap(), 2412);
//! map.put(FREQ_MHZ, 5180).unwrap();
//! assert_eq!(map.get(FREQ_MHZ).unwrap(), 5180);
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::error::ParamError;

/// Declared type of a parameter slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Integer,
    Double,
    String,
    DoubleArray,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Integer => "integer",
            ParamKind::Double => "double",
            ParamKind::String => "string",
            ParamKind::DoubleArray => "double array",
        };
        f.write_str(name)
    }
}

/// Tagged parameter value
///
/// Deserializes untagged so flow scripts can write plain TOML values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i32),
    Double(f64),
    Str(String),
    DoubleArray(Vec<f64>),
}

impl ParamValue {
    /// Kind of this value
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Integer(_) => ParamKind::Integer,
            ParamValue::Double(_) => ParamKind::Double,
            ParamValue::Str(_) => ParamKind::String,
            ParamValue::DoubleArray(_) => ParamKind::DoubleArray,
        }
    }

    /// Empty value of a kind, used when clearing returns
    pub fn empty(kind: ParamKind) -> Self {
        match kind {
            ParamKind::Integer => ParamValue::Integer(0),
            ParamKind::Double => ParamValue::Double(0.0),
            ParamKind::String => ParamValue::Str(String::new()),
            ParamKind::DoubleArray => ParamValue::DoubleArray(Vec::new()),
        }
    }

    /// Convert to `kind` if the conversion is lossless
    ///
    /// Identity conversions always succeed. An integer widens to a double
    /// and a scalar double widens to a one-element array.
    pub fn coerce(self, kind: ParamKind) -> Option<Self> {
        match (self, kind) {
            (v, k) if v.kind() == k => Some(v),
            (ParamValue::Integer(i), ParamKind::Double) => Some(ParamValue::Double(i as f64)),
            (ParamValue::Integer(i), ParamKind::DoubleArray) => {
                Some(ParamValue::DoubleArray(vec![i as f64]))
            }
            (ParamValue::Double(d), ParamKind::DoubleArray) => {
                Some(ParamValue::DoubleArray(vec![d]))
            }
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Double(d) => Some(*d),
            ParamValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(i) => write!(f, "{}", i),
            ParamValue::Double(d) => write!(f, "{}", d),
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::DoubleArray(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Integer(value as i32)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Double(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(value: Vec<f64>) -> Self {
        ParamValue::DoubleArray(value)
    }
}

/// Rust types that can live in a parameter slot
pub trait ParamType: Sized {
    const KIND: ParamKind;

    fn from_value(value: &ParamValue) -> Option<Self>;

    fn into_value(self) -> ParamValue;
}

impl ParamType for i32 {
    const KIND: ParamKind = ParamKind::Integer;

    fn from_value(value: &ParamValue) -> Option<Self> {
        value.as_i32()
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Integer(self)
    }
}

/// Flags travel as integers; any non-zero value reads as `true`
impl ParamType for bool {
    const KIND: ParamKind = ParamKind::Integer;

    fn from_value(value: &ParamValue) -> Option<Self> {
        value.as_i32().map(|v| v != 0)
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Integer(self as i32)
    }
}

impl ParamType for f64 {
    const KIND: ParamKind = ParamKind::Double;

    fn from_value(value: &ParamValue) -> Option<Self> {
        value.as_f64()
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Double(self)
    }
}

impl ParamType for String {
    const KIND: ParamKind = ParamKind::String;

    fn from_value(value: &ParamValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Str(self)
    }
}

impl ParamType for Vec<f64> {
    const KIND: ParamKind = ParamKind::DoubleArray;

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::DoubleArray(values) => Some(values.clone()),
            _ => None,
        }
    }

    fn into_value(self) -> ParamValue {
        ParamValue::DoubleArray(self)
    }
}

/// Name of a parameter together with the Rust type stored in it
pub struct ParamKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParamKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ParamKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ParamKey<T> {}

impl<T> fmt::Debug for ParamKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamKey({})", self.name)
    }
}

/// One parameter descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub value: ParamValue,
    #[serde(skip)]
    default: ParamValue,
    pub unit: String,
    pub help: String,
}

impl Parameter {
    /// Descriptor whose kind and default come from `value`
    pub fn new(name: &str, value: ParamValue, unit: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: value.kind(),
            default: value.clone(),
            value,
            unit: unit.to_string(),
            help: help.to_string(),
        }
    }

    pub fn integer(name: &str, default: i32, unit: &str, help: &str) -> Self {
        Self::new(name, ParamValue::Integer(default), unit, help)
    }

    pub fn double(name: &str, default: f64, unit: &str, help: &str) -> Self {
        Self::new(name, ParamValue::Double(default), unit, help)
    }

    pub fn string(name: &str, default: &str, unit: &str, help: &str) -> Self {
        Self::new(name, ParamValue::Str(default.to_string()), unit, help)
    }

    pub fn double_array(name: &str, default: Vec<f64>, unit: &str, help: &str) -> Self {
        Self::new(name, ParamValue::DoubleArray(default), unit, help)
    }

    /// Declared default value
    pub fn default_value(&self) -> &ParamValue {
        &self.default
    }
}

/// Insertion-ordered map of parameter descriptors with unique names
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParamMap {
    params: Vec<Parameter>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Builder-style insert
    ///
    /// Parameter tables are static declarations, so a duplicate name is a
    /// programming error: it is logged and the first declaration wins.
    pub fn with(mut self, param: Parameter) -> Self {
        if let Err(e) = self.insert(param) {
            debug_assert!(false, "{}", e);
            log::error!("{}", e);
        }
        self
    }

    /// Insert a descriptor, rejecting duplicate names
    pub fn insert(&mut self, param: Parameter) -> Result<(), ParamError> {
        if self.contains(&param.name) {
            return Err(ParamError::Duplicate(param.name));
        }
        self.params.push(param);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.param(name).map(|p| &p.value)
    }

    /// Store a value into an existing slot, widening where lossless
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        let param = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ParamError::Unknown(name.to_string()))?;

        let got = value.kind();
        match value.coerce(param.kind) {
            Some(v) => {
                param.value = v;
                Ok(())
            }
            None => Err(ParamError::KindMismatch {
                name: name.to_string(),
                declared: param.kind,
                got,
            }),
        }
    }

    /// Typed read through a key
    pub fn get<T: ParamType>(&self, key: ParamKey<T>) -> Result<T, ParamError> {
        let param = self
            .param(key.name())
            .ok_or_else(|| ParamError::Unknown(key.name().to_string()))?;
        T::from_value(&param.value).ok_or_else(|| ParamError::KindMismatch {
            name: key.name().to_string(),
            declared: T::KIND,
            got: param.kind,
        })
    }

    /// Typed write through a key
    pub fn put<T: ParamType>(&mut self, key: ParamKey<T>, value: T) -> Result<(), ParamError> {
        self.set(key.name(), value.into_value())
    }

    /// Restore every slot to its declared default
    pub fn reset_to_defaults(&mut self) {
        for param in &mut self.params {
            param.value = param.default.clone();
        }
    }

    /// Empty every slot (zero, empty string, empty array)
    pub fn clear_values(&mut self) {
        for param in &mut self.params {
            param.value = ParamValue::empty(param.kind);
        }
    }
}
