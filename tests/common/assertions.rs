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

//! Custom assertions for flow reports

use iqlite::core::flow::{FlowReport, StepReport};

/// Assert every step ran and passed
#[allow(dead_code)]
pub fn assert_flow_passed(report: &FlowReport) {
    let failures: Vec<_> = report
        .failures()
        .map(|s| format!("{} {}: {}", s.technology, s.function, s.message.trim_end()))
        .collect();
    assert!(report.passed, "Flow failed: {:?}", failures);
    assert_eq!(report.skipped, 0);
}

/// Find the step running `function`; panics when absent
#[allow(dead_code)]
pub fn find_step<'a>(report: &'a FlowReport, function: &str) -> &'a StepReport {
    report
        .steps
        .iter()
        .find(|s| s.function == function)
        .unwrap_or_else(|| panic!("No step ran {}", function))
}

/// Assert a numeric return is within `tolerance` of `expected`
#[allow(dead_code)]
pub fn assert_return_close(step: &StepReport, name: &str, expected: f64, tolerance: f64) {
    let actual = step
        .returns
        .get(name)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("{} returned no number named {}", step.function, name));
    assert!(
        (actual - expected).abs() <= tolerance,
        "{} {} mismatch: expected {}, got {}",
        step.function,
        name,
        expected,
        actual
    );
}

/// Assert a string return
#[allow(dead_code)]
pub fn assert_return_str(step: &StepReport, name: &str, expected: &str) {
    let actual = step.returns.get(name).and_then(|v| v.as_str());
    assert_eq!(
        actual,
        Some(expected),
        "{} {} mismatch",
        step.function,
        name
    );
}
