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

//! Expected metrics file
//!
//! ```yaml
//! 'ACTION-training_evaluation,model-gen3_mobilenetV2_ATSS,dataset-bbcd,num_iters-KEEP_CONFIG_FIELD_VALUE,batch-KEEP_CONFIG_FIELD_VALUE,usecase-reallife':
//!   'metrics.accuracy.f-measure':
//!     'target_value': 0.81
//!     'max_diff': 0.005
//! ```

use crate::tolerance::MetricRequirement;
use crate::ValidationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metric address to requirement, in file order.
pub type MetricExpectations = IndexMap<String, MetricRequirement>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedMetrics {
    tests: IndexMap<String, MetricExpectations>,
}

/// A requirement whose shape is invalid.
#[derive(Debug)]
pub struct LintIssue {
    pub test_id: String,
    pub address: String,
    pub error: ValidationError,
}

impl ExpectedMetrics {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ValidationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let expected = Self::from_yaml_str(&content)?;
        tracing::info!(
            "Loaded expected metrics for {} tests from {:?}",
            expected.len(),
            path
        );
        Ok(expected)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ValidationError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn get(&self, test_id: &str) -> Option<&MetricExpectations> {
        self.tests.get(test_id)
    }

    pub fn test_ids(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Check the static shape of every requirement.
    ///
    /// `base` addresses are not resolved: they point into results that only
    /// exist while the tests run.
    pub fn lint(&self) -> Vec<LintIssue> {
        let mut issues = Vec::new();
        for (test_id, metrics) in &self.tests {
            for (address, requirement) in metrics {
                if let Err(error) = requirement.check_shape() {
                    issues.push(LintIssue {
                        test_id: test_id.clone(),
                        address: address.clone(),
                        error,
                    });
                }
            }
        }
        issues
    }
}
