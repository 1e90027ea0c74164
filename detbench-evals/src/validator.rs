// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::expectations::{ExpectedMetrics, MetricExpectations};
use crate::tolerance::compare;
use crate::ValidationError;
use detbench_core::{resolve, Bundle, ResultStore};
use std::sync::Arc;

/// Finds the expected metrics of one test.
///
/// `expected` is `None` when no expected-metrics file was loaded; that is an
/// error only once a gated test actually asks for its expectations.
#[derive(Debug, Clone)]
pub struct ExpectationLookup {
    expected: Option<Arc<ExpectedMetrics>>,
    test_id: String,
}

impl ExpectationLookup {
    pub fn new(expected: Option<Arc<ExpectedMetrics>>, test_id: impl Into<String>) -> Self {
        Self {
            expected,
            test_id: test_id.into(),
        }
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn fetch(&self) -> Result<&MetricExpectations, ValidationError> {
        let expected = self.expected.as_deref().ok_or_else(|| {
            ValidationError::MissingExpectation(format!(
                "the expected metrics file was not loaded, although it is required for validation in the test \"{}\"",
                self.test_id
            ))
        })?;
        expected.get(&self.test_id).ok_or_else(|| {
            ValidationError::MissingExpectation(format!(
                "the test id {} is not inside the expected metrics",
                self.test_id
            ))
        })
    }
}

/// Checks a stage result against expected metrics.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    lookup: Option<ExpectationLookup>,
}

impl Validator {
    /// A validator without a lookup accepts every result.
    pub fn new(lookup: Option<ExpectationLookup>) -> Self {
        Self { lookup }
    }

    pub fn is_gated(&self) -> bool {
        self.lookup.is_some()
    }

    /// Check every expected metric of the test, then fail once with all
    /// reasons if any metric is out of range.
    pub fn validate(&self, result: &Bundle, store: &ResultStore) -> Result<(), ValidationError> {
        let Some(lookup) = &self.lookup else {
            tracing::info!("Validation: skipped, not a quality-gated run");
            return Ok(());
        };

        tracing::info!("Validation: begin");
        let expectations = lookup.fetch()?;

        let mut reasons = Vec::new();
        for (address, requirement) in expectations {
            tracing::info!("Validation: begin check {}", address);

            let node = resolve(result, address).map_err(|e| ValidationError::MetricNotFound {
                address: address.clone(),
                reason: e.to_string(),
            })?;
            let observed = node.as_f64().ok_or_else(|| ValidationError::MetricNotFound {
                address: address.clone(),
                reason: format!("value of kind {} is not numeric", node.kind()),
            })?;
            tracing::debug!("Validation: {} = {}", address, observed);

            let bounds = requirement.bounds(store)?;
            let comparison = compare(observed, address, &bounds);
            if let Some(reason) = comparison.reason {
                reasons.push(reason);
            }

            tracing::info!("Validation: end check {}", address);
        }

        tracing::info!("Validation: end, result={}", reasons.is_empty());
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Failed { reasons })
        }
    }
}
